extern crate assert_cmd;
extern crate predicates;
extern crate tempfile;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn renders_and_filters_a_small_image() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("small.pnm");
    Command::cargo_bin("mandelblur")
        .unwrap()
        .args(&[
            "--output",
            out.to_str().unwrap(),
            "--size",
            "32x16",
            "--tasks",
            "8",
            "--filter-tasks",
            "8",
            "--kernel-width",
            "3",
            "--steps",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total Mandelbrot pixels"))
        .stdout(predicate::str::contains("Convolution time"));

    let contents = std::fs::read_to_string(&out).unwrap();
    assert!(contents.starts_with("P3"), "expected an ASCII pixmap");
}

#[test]
fn rejects_an_even_kernel_width() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("never-written.pnm");
    Command::cargo_bin("mandelblur")
        .unwrap()
        .args(&[
            "--output",
            out.to_str().unwrap(),
            "--kernel-width",
            "4",
        ])
        .assert()
        .failure();
    assert!(!out.exists());
}

#[test]
fn rejects_a_zero_step_count() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("never-written.pnm");
    Command::cargo_bin("mandelblur")
        .unwrap()
        .args(&["--output", out.to_str().unwrap(), "--steps", "0"])
        .assert()
        .failure();
    assert!(!out.exists());
}
