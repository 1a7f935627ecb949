#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mandelblur renderer
//!
//! Mandelblur renders the Mandelbrot set with smooth gradient coloring
//! and then softens the result with an iterative Gaussian convolution.
//! The Mandelbrot takes a point on the complex plane and repeatedly
//! multiplies it by itself, measuring how quickly that number goes to
//! infinity.  That "velocity" is run through a gradient table to pick
//! the color of the corresponding pixel; points with no velocity (the
//! black heart of the set) get the table's terminal color.
//!
//! Both stages are built on the same machinery: the width of the image
//! is tiled into contiguous, disjoint column bands, each band becomes
//! one unit of work, and a bounded pool of scoped worker threads
//! drains the work queue.  Because every band is a disjoint mutable
//! view into one flat allocation, no locks are needed on the pixel
//! data itself, and the output is identical no matter how many tasks
//! or workers are used.
//!
//! The convolution stage runs for a configurable number of passes,
//! flipping between two buffers after each pass completes, so that a
//! pass always reads the fully written output of the pass before it.

extern crate crossbeam;
extern crate image;
extern crate itertools;
extern crate num;
extern crate num_cpus;

pub mod convolve;
pub mod gradient;
pub mod mandel;
pub mod raster;
pub mod tiling;

pub use convolve::{convolve, convolve_pass, Kernel};
pub use gradient::{Gradient, GradientTable};
pub use mandel::{escape, Escape, FractalRenderer, MAX_ITERATIONS};
pub use raster::{BandMut, Raster};
pub use tiling::Tiling;
