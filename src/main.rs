// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate clap;
extern crate failure;
extern crate image;
extern crate mandelblur;
extern crate num_cpus;

use clap::{App, Arg, ArgMatches};
use failure::{err_msg, Error};
use image::pnm::{PNMEncoder, PNMSubtype, SampleEncoding};
use image::ColorType;
use mandelblur::{convolve, FractalRenderer, GradientTable, Raster};
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Given a string and a separator, returns the two values
/// separated by the separator.
fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + Ord>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

fn validate_odd(s: &str, err: &str) -> Result<(), String> {
    match usize::from_str(s) {
        Ok(i) if i % 2 == 1 => Ok(()),
        _ => Err(err.to_string()),
    }
}

fn validate_positive_real(s: &str, err: &str) -> Result<(), String> {
    match f64::from_str(s) {
        Ok(f) if f > 0.0 => Ok(()),
        _ => Err(err.to_string()),
    }
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const RATIO: &str = "ratio";
const TASKS: &str = "tasks";
const KERNEL_WIDTH: &str = "kernel-width";
const SIGMA: &str = "sigma";
const STEPS: &str = "steps";
const FILTER_TASKS: &str = "filter-tasks";
const THREADS: &str = "threads";

fn args<'a>() -> ArgMatches<'a> {
    let max_threads = num_cpus::get();

    App::new("mandelblur")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Parallel Mandelbrot renderer with iterative convolution filtering")
        .arg(
            Arg::with_name(OUTPUT)
                .required(true)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .help("Output file (ASCII P3 pixmap)"),
        )
        .arg(
            Arg::with_name(SIZE)
                .required(false)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("1536x1024")
                .validator(|s| validate_pair::<usize>(&s, 'x', "Could not parse output image size"))
                .help("Size of output image"),
        )
        .arg(
            Arg::with_name(RATIO)
                .required(false)
                .long(RATIO)
                .short("r")
                .takes_value(true)
                .validator(|s| {
                    validate_positive_real(&s, "Compression ratio must be a positive number")
                })
                .help("Horizontal compression ratio (default: width / height)"),
        )
        .arg(
            Arg::with_name(TASKS)
                .required(false)
                .long(TASKS)
                .short("t")
                .takes_value(true)
                .default_value("512")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        1_048_576,
                        "Could not parse fractal task count",
                        "Fractal task count must be at least 1",
                    )
                })
                .help("Number of column-band tasks for the fractal stage"),
        )
        .arg(
            Arg::with_name(KERNEL_WIDTH)
                .required(false)
                .long(KERNEL_WIDTH)
                .short("k")
                .takes_value(true)
                .default_value("5")
                .validator(|s| validate_odd(&s, "Kernel width must be an odd number"))
                .help("Side length of the convolution kernel (odd)"),
        )
        .arg(
            Arg::with_name(SIGMA)
                .required(false)
                .long(SIGMA)
                .takes_value(true)
                .default_value("0.37")
                .validator(|s| validate_positive_real(&s, "Sigma must be a positive number"))
                .help("Spread of the convolution kernel"),
        )
        .arg(
            Arg::with_name(STEPS)
                .required(false)
                .long(STEPS)
                .short("n")
                .takes_value(true)
                .default_value("20")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        10_000,
                        "Could not parse step count",
                        "Step count must be between 1 and 10000",
                    )
                })
                .help("Number of convolution passes"),
        )
        .arg(
            Arg::with_name(FILTER_TASKS)
                .required(false)
                .long(FILTER_TASKS)
                .takes_value(true)
                .default_value("256")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        1_048_576,
                        "Could not parse filter task count",
                        "Filter task count must be at least 1",
                    )
                })
                .help("Number of column-band tasks per convolution pass"),
        )
        .arg(
            Arg::with_name(THREADS)
                .required(false)
                .long(THREADS)
                .short("j")
                .takes_value(true)
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        max_threads,
                        "Could not parse thread count",
                        &format!("Thread count must be between 1 and {}", max_threads),
                    )
                })
                .help("Number of worker threads (default: all CPUs)"),
        )
        .get_matches()
}

fn arg_usize(matches: &ArgMatches, name: &str) -> Result<usize, Error> {
    usize::from_str(matches.value_of(name).unwrap())
        .map_err(|_| err_msg(format!("could not parse --{}", name)))
}

fn arg_f64(matches: &ArgMatches, name: &str) -> Result<f64, Error> {
    f64::from_str(matches.value_of(name).unwrap())
        .map_err(|_| err_msg(format!("could not parse --{}", name)))
}

fn seconds(elapsed: Duration) -> f64 {
    elapsed.as_secs() as f64 + f64::from(elapsed.subsec_nanos()) / 1e9
}

fn write_image(outfile: &str, raster: &Raster) -> Result<(), Error> {
    let path = Path::new(outfile);
    let output = File::create(&path)?;
    let mut encoder =
        PNMEncoder::new(output).with_subtype(PNMSubtype::Pixmap(SampleEncoding::Ascii));
    encoder.encode(
        &raster.interleaved()[..],
        raster.width() as u32,
        raster.height() as u32,
        ColorType::RGB(8),
    )?;
    Ok(())
}

fn run() -> Result<(), Error> {
    let matches = args();
    let (width, height) = parse_pair::<usize>(matches.value_of(SIZE).unwrap(), 'x')
        .ok_or_else(|| err_msg("could not parse image size"))?;
    let ratio = match matches.value_of(RATIO) {
        Some(_) => arg_f64(&matches, RATIO)?,
        None => (width as f64) / (height as f64),
    };
    let tasks = arg_usize(&matches, TASKS)?;
    let kernel_width = arg_usize(&matches, KERNEL_WIDTH)?;
    let sigma = arg_f64(&matches, SIGMA)?;
    let steps = arg_usize(&matches, STEPS)?;
    let filter_tasks = arg_usize(&matches, FILTER_TASKS)?;
    let threads = match matches.value_of(THREADS) {
        Some(_) => arg_usize(&matches, THREADS)?,
        None => num_cpus::get(),
    };

    for &(count, what) in &[(tasks, "fractal"), (filter_tasks, "filter")] {
        if width % count != 0 {
            eprintln!(
                "warning: {} trailing columns are uncovered by the {} tiling",
                width % count,
                what
            );
        }
    }

    let image = Raster::new(3, height, width).map_err(err_msg)?;
    let filtered = Raster::new(3, height, width).map_err(err_msg)?;
    let renderer =
        FractalRenderer::new(GradientTable::default_palette(), ratio).map_err(err_msg)?;

    let mut buffers = [image, filtered];
    let fractal_start = Instant::now();
    let members = renderer
        .render(&mut buffers[0], tasks, threads)
        .map_err(err_msg)?;
    let fractal_time = fractal_start.elapsed();
    println!("Mandelbrot time: {}", seconds(fractal_time));
    println!("Total Mandelbrot pixels: {}", members);

    let filter_start = Instant::now();
    let result = convolve(
        &mut buffers,
        kernel_width,
        sigma,
        steps,
        filter_tasks,
        threads,
    )
    .map_err(err_msg)?;
    let filter_time = filter_start.elapsed();
    println!("Convolution time: {}", seconds(filter_time));
    println!("Total time: {}", seconds(fractal_time + filter_time));

    write_image(matches.value_of(OUTPUT).unwrap(), &buffers[result])
}

fn main() {
    if let Err(e) = run() {
        eprintln!("mandelblur: {}", e);
        std::process::exit(1);
    }
}
