// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The escape-time kernel and the fractal render stage.
//!
//! The kernel iterates `z = z * z + c` from zero and reports how
//! quickly the orbit left the disc of radius 2, if it ever did.
//! The render stage maps every pixel of a raster to a point on the
//! complex plane through a fixed affine transform, runs the kernel,
//! and colors the pixel through a gradient table.  Work is tiled into
//! column bands and drained by a bounded pool of scoped threads; each
//! band is a disjoint mutable view, so the workers never contend.

extern crate crossbeam;

use crossbeam::thread::ScopedJoinHandle;
use gradient::GradientTable;
use num::Complex;
use raster::{BandMut, Raster};
use std::sync::{Arc, Mutex};
use std::vec::IntoIter;
use tiling::Tiling;

type BandQueue<'a> = Arc<Mutex<IntoIter<BandMut<'a>>>>;

/// The fixed iteration budget of the escape kernel.
pub const MAX_ITERATIONS: usize = 2048;

/// The result of iterating one point: how many steps were taken, the
/// final value of z, and whether the orbit escaped within budget.  A
/// point is a set member exactly when it did not escape.
#[derive(Copy, Clone, Debug)]
pub struct Escape {
    /// Steps taken before escape or budget exhaustion.
    pub iterations: usize,
    /// True when the orbit left the disc before the budget ran out.
    pub escaped: bool,
    z: Complex<f64>,
}

impl Escape {
    /// The continuous escape count, normalized by the iteration
    /// budget: `(n + 1 - ln(ln|z|)/ln 2) / budget`.  Computed from
    /// the final z even for members; the double logarithm goes
    /// non-finite for magnitudes at or below 1, and the gradient
    /// table resolves those to its terminal color.
    pub fn smooth_index(&self) -> f64 {
        let magnitude = self.z.norm();
        let m = (self.iterations as f64) + 1.0 - magnitude.ln().ln() / 2.0_f64.ln();
        m / (MAX_ITERATIONS as f64)
    }
}

/// Iterate a point until its orbit leaves the disc of radius 2 or
/// the budget is exhausted.  Pure arithmetic; no failure paths.
pub fn escape(c: Complex<f64>) -> Escape {
    let mut z: Complex<f64> = Complex { re: 0.0, im: 0.0 };
    let mut iterations = 0;
    while z.norm_sqr() <= 4.0 && iterations < MAX_ITERATIONS {
        z = z * z + c;
        iterations += 1;
    }
    Escape {
        iterations,
        escaped: iterations < MAX_ITERATIONS,
        z,
    }
}

/// Renders the Mandelbrot set into a raster, one column band per
/// task.  The gradient table and the horizontal compression ratio
/// are fixed at construction, so one renderer can fill any number of
/// rasters with identical settings.
pub struct FractalRenderer {
    gradient: GradientTable,
    ratio: f64,
}

impl FractalRenderer {
    /// Constructor.  The ratio compresses the horizontal axis of the
    /// viewed region and must be positive; it is scaled down by 10
    /// internally, matching the transform this renderer has always
    /// used.
    pub fn new(gradient: GradientTable, ratio: f64) -> Result<FractalRenderer, String> {
        if !(ratio > 0.0) {
            return Err(format!("compression ratio must be positive, got {}", ratio));
        }
        Ok(FractalRenderer { gradient, ratio })
    }

    /// Fill every covered pixel of the raster and return the number
    /// of set members found.  The width is tiled into `task_count`
    /// bands and the bands are drained by `threads` scoped workers;
    /// the pixel data and the member count are identical for any
    /// worker count, and for any task count with the same coverage.
    /// All precondition failures surface here, before any worker is
    /// spawned.
    pub fn render(
        &self,
        image: &mut Raster,
        task_count: usize,
        threads: usize,
    ) -> Result<usize, String> {
        if threads == 0 {
            return Err("worker count must be at least 1".to_string());
        }
        let tiling = Tiling::new(image.width(), task_count)?;
        let width = image.width() as f64;
        let height = image.height() as f64;
        let rows = image.height();
        let channels = image.channels().min(3);
        let scale = self.ratio / 10.0;

        let queue: BandQueue = Arc::new(Mutex::new(image.bands_mut(tiling).into_iter()));
        let members = crossbeam::scope(|spawner| {
            let handles: Vec<ScopedJoinHandle<usize>> = (0..threads)
                .map(|_| {
                    let queue = queue.clone();
                    spawner.spawn(move |_| {
                        let mut members = 0;
                        loop {
                            let band = { queue.lock().unwrap().next() };
                            match band {
                                Some(mut band) => {
                                    members += self.render_band(
                                        &mut band, width, height, rows, channels, scale,
                                    );
                                }
                                None => {
                                    break;
                                }
                            }
                        }
                        members
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .sum()
        })
        .unwrap();
        Ok(members)
    }

    /// Fill one band, column-major like the rest of the raster, and
    /// count the members seen along the way.
    fn render_band(
        &self,
        band: &mut BandMut,
        width: f64,
        height: f64,
        rows: usize,
        channels: usize,
        scale: f64,
    ) -> usize {
        let mut members = 0;
        for col in band.cols() {
            for row in 0..rows {
                let c = Complex::new(
                    (col as f64) / width * scale - 1.10,
                    (row as f64) / height * 0.1 - 0.35,
                );
                let point = escape(c);
                if !point.escaped {
                    members += 1;
                }
                let rgb = self.gradient.colorize(point.smooth_index(), point.escaped);
                for channel in 0..channels {
                    band.set(channel, row, col, rgb[channel]);
                }
            }
        }
        members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_origin_never_escapes() {
        let point = escape(Complex::new(0.0, 0.0));
        assert!(!point.escaped);
        assert_eq!(point.iterations, MAX_ITERATIONS);
    }

    #[test]
    fn points_outside_the_disc_always_escape() {
        for c in &[
            Complex::new(3.0, 0.0),
            Complex::new(0.0, 3.0),
            Complex::new(-2.5, -2.5),
            Complex::new(2.1, 0.0),
        ] {
            let point = escape(*c);
            assert!(point.escaped, "{} should escape", c);
            assert!(point.iterations <= MAX_ITERATIONS);
        }
    }

    #[test]
    fn renderer_rejects_a_bad_ratio() {
        assert!(FractalRenderer::new(GradientTable::default_palette(), 0.0).is_err());
        assert!(FractalRenderer::new(GradientTable::default_palette(), -1.5).is_err());
    }

    #[test]
    fn render_rejects_zero_tasks_and_workers() {
        let renderer = FractalRenderer::new(GradientTable::default_palette(), 1.5).unwrap();
        let mut image = Raster::new(3, 4, 8).unwrap();
        assert!(renderer.render(&mut image, 0, 2).is_err());
        assert!(renderer.render(&mut image, 2, 0).is_err());
    }

    #[test]
    fn render_is_deterministic_across_task_counts() {
        let renderer = FractalRenderer::new(GradientTable::default_palette(), 1.5).unwrap();
        let mut reference = Raster::new(3, 8, 16).unwrap();
        let reference_members = renderer.render(&mut reference, 1, 1).unwrap();
        for &(tasks, workers) in &[(2, 2), (4, 3), (8, 2), (16, 4)] {
            let mut image = Raster::new(3, 8, 16).unwrap();
            let members = renderer.render(&mut image, tasks, workers).unwrap();
            assert_eq!(members, reference_members, "member count with {} tasks", tasks);
            assert_eq!(image, reference, "pixels with {} tasks", tasks);
        }
    }

    #[test]
    fn uncovered_remainder_columns_stay_black() {
        let renderer = FractalRenderer::new(GradientTable::default_palette(), 1.5).unwrap();
        // 10 columns over 4 tasks: the last two columns get no task.
        let mut image = Raster::new(3, 4, 10).unwrap();
        renderer.render(&mut image, 4, 2).unwrap();
        for channel in 0..3 {
            for row in 0..4 {
                assert_eq!(image.get(channel, row, 8), 0);
                assert_eq!(image.get(channel, row, 9), 0);
            }
        }
    }
}
