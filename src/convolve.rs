//! The convolution kernel and the multi-pass filter stage.
//!
//! A kernel is a square matrix of real weights, built either from raw
//! weights or as a Gaussian from a spread parameter.  Applying it to
//! a pixel takes the weighted sum of the surrounding neighborhood;
//! neighbors outside the raster contribute nothing, which darkens the
//! borders and is kept that way deliberately.  The stage repeats the
//! filter for a number of passes over a pair of buffers, flipping
//! which buffer is source and which is destination after each pass
//! completes.

extern crate crossbeam;

use itertools::iproduct;
use num::clamp;
use raster::{BandMut, Raster};
use std::f64::consts::PI;
use std::sync::{Arc, Mutex};
use std::vec::IntoIter;
use tiling::Tiling;

type BandQueue<'a> = Arc<Mutex<IntoIter<BandMut<'a>>>>;

/// A square convolution matrix with an odd side length.
#[derive(Clone, Debug)]
pub struct Kernel {
    width: usize,
    weights: Vec<f64>,
}

impl Kernel {
    /// Constructor from raw row-major weights.  The width must be odd
    /// so the matrix has a center, and the weight count must match.
    pub fn from_weights(weights: Vec<f64>, width: usize) -> Result<Kernel, String> {
        if width % 2 == 0 || width == 0 {
            return Err(format!("kernel width must be odd, got {}", width));
        }
        if weights.len() != width * width {
            return Err(format!(
                "a {}x{} kernel needs {} weights, got {}",
                width,
                width,
                width * width,
                weights.len()
            ));
        }
        Ok(Kernel { width, weights })
    }

    /// A Gaussian bell about the center cell:
    /// `exp(-(k^2 + l^2) / (2 sigma^2)) / (2 pi sigma^2)`.  The
    /// weights are not normalized; their sum is whatever the bell
    /// adds up to at this width and spread.
    pub fn gaussian(width: usize, sigma: f64) -> Result<Kernel, String> {
        if !(sigma > 0.0) {
            return Err(format!("sigma must be positive, got {}", sigma));
        }
        if width % 2 == 0 || width == 0 {
            return Err(format!("kernel width must be odd, got {}", width));
        }
        let radius = (width / 2) as isize;
        let norm = 2.0 * PI * sigma * sigma;
        let weights = iproduct!(-radius..=radius, -radius..=radius)
            .map(|(k, l)| (-((k * k + l * l) as f64) / (2.0 * sigma * sigma)).exp() / norm)
            .collect();
        Kernel::from_weights(weights, width)
    }

    /// The side length of the matrix.
    pub fn width(&self) -> usize {
        self.width
    }

    fn radius(&self) -> isize {
        (self.width / 2) as isize
    }

    /// The weighted sum of the neighborhood centered on one pixel of
    /// one channel.  Neighbors that fall outside the raster are
    /// skipped, contributing exactly zero.  The accumulated value is
    /// clamped to [0, 255] and truncated.
    pub fn apply(&self, src: &Raster, channel: usize, row: usize, col: usize) -> u8 {
        let radius = self.radius();
        let rows = src.height() as isize;
        let cols = src.width() as isize;
        let mut val = 0.0;
        for (k, l) in iproduct!(-radius..=radius, -radius..=radius) {
            let cy = row as isize + k;
            let cx = col as isize + l;
            if cx < 0 || cx >= cols || cy < 0 || cy >= rows {
                continue;
            }
            let weight = self.weights[((k + radius) * (self.width as isize) + (l + radius)) as usize];
            val += weight * f64::from(src.get(channel, cy as usize, cx as usize));
        }
        clamp(val, 0.0, 255.0) as u8
    }
}

/// One filter pass: every covered (channel, row, column) of the
/// destination is computed from the source through the kernel.  The
/// destination's width is tiled into `task_count` bands drained by
/// `threads` scoped workers; the source is only ever read.  Returns
/// once every band has been written, so the caller may safely reuse
/// either buffer afterward.
pub fn convolve_pass(
    src: &Raster,
    dst: &mut Raster,
    kernel: &Kernel,
    task_count: usize,
    threads: usize,
) -> Result<(), String> {
    if threads == 0 {
        return Err("worker count must be at least 1".to_string());
    }
    if src.width() != dst.width() || src.height() != dst.height() || src.channels() != dst.channels()
    {
        return Err("source and destination rasters must have the same shape".to_string());
    }
    let tiling = Tiling::new(dst.width(), task_count)?;
    let rows = dst.height();
    let channels = dst.channels();

    let queue: BandQueue = Arc::new(Mutex::new(dst.bands_mut(tiling).into_iter()));
    crossbeam::scope(|spawner| {
        for _ in 0..threads {
            let queue = queue.clone();
            spawner.spawn(move |_| loop {
                let band = { queue.lock().unwrap().next() };
                match band {
                    Some(mut band) => {
                        for col in band.cols() {
                            for channel in 0..channels {
                                for row in 0..rows {
                                    let value = kernel.apply(src, channel, row, col);
                                    band.set(channel, row, col, value);
                                }
                            }
                        }
                    }
                    None => {
                        break;
                    }
                }
            });
        }
    })
    .unwrap();
    Ok(())
}

/// The multi-pass driver.  `buffers[0]` holds the input image and
/// `buffers[1]` is scratch of the same shape; after each pass the
/// roles flip by index, so pass `k + 1` reads the fully joined
/// output of pass `k` and nothing is ever copied.  Returns the index
/// of the buffer holding the final pass's output.  Every precondition
/// is checked here, before the first pass dispatches any work.
pub fn convolve(
    buffers: &mut [Raster; 2],
    kernel_width: usize,
    sigma: f64,
    nsteps: usize,
    task_count: usize,
    threads: usize,
) -> Result<usize, String> {
    let kernel = Kernel::gaussian(kernel_width, sigma)?;
    if nsteps == 0 {
        return Err("at least one filter pass is required".to_string());
    }
    if threads == 0 {
        return Err("worker count must be at least 1".to_string());
    }
    if buffers[0].width() != buffers[1].width()
        || buffers[0].height() != buffers[1].height()
        || buffers[0].channels() != buffers[1].channels()
    {
        return Err("the two filter buffers must have the same shape".to_string());
    }
    Tiling::new(buffers[0].width(), task_count)?;

    let mut current = 0;
    for _ in 0..nsteps {
        let (head, tail) = buffers.split_at_mut(1);
        let (src, dst) = if current == 0 {
            (&head[0], &mut tail[0])
        } else {
            (&tail[0], &mut head[0])
        };
        convolve_pass(src, dst, &kernel, task_count, threads)?;
        current = 1 - current;
    }
    Ok(current)
}
