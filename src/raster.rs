//! Contains the Raster struct, a dense three-dimensional sample
//! buffer addressed by (channel, row, column), and the BandMut view,
//! a disjoint mutable slice of a Raster's columns that one unit of
//! work may fill without synchronizing with its siblings.

use tiling::Tiling;

/// A dense raster of 8-bit samples.  The layout is column-planar:
/// all the samples of column 0 come first, then all the samples of
/// column 1, and so on, with the channels of one (row, column) cell
/// adjacent.  Keeping the tiled axis outermost means a contiguous
/// span of columns is a contiguous byte range, which is what lets us
/// hand disjoint mutable bands to worker threads.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<u8>,
}

impl Raster {
    /// Constructor.  Allocates a zero-initialized buffer.  Rasters
    /// with a zero-sized dimension cannot be built.
    pub fn new(channels: usize, height: usize, width: usize) -> Result<Raster, String> {
        if channels == 0 || height == 0 || width == 0 {
            return Err(format!(
                "raster dimensions must be non-zero, got {}x{}x{}",
                channels, height, width
            ));
        }
        Ok(Raster {
            channels,
            height,
            width,
            data: vec![0; channels * height * width],
        })
    }

    /// The number of channels per cell.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The total number of samples in the buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Describes that the raster is of a size.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn offset(&self, channel: usize, row: usize, col: usize) -> usize {
        (col * self.height + row) * self.channels + channel
    }

    /// Read one sample.
    pub fn get(&self, channel: usize, row: usize, col: usize) -> u8 {
        self.data[self.offset(channel, row, col)]
    }

    /// Store one sample.  The value is already in range by
    /// construction; callers clamp before storing.
    pub fn set(&mut self, channel: usize, row: usize, col: usize, value: u8) {
        let offset = self.offset(channel, row, col);
        self.data[offset] = value;
    }

    /// Split the raster into one disjoint mutable column band per
    /// task.  Each band covers `tiling.span()` whole columns; the
    /// trailing `tiling.lost()` columns belong to no band and are
    /// left untouched, which is the tiler's documented coverage rule.
    /// When the tiling is oversubscribed (span of zero) there is
    /// nothing to hand out and the result is empty.
    pub fn bands_mut(&mut self, tiling: Tiling) -> Vec<BandMut> {
        let span = tiling.span();
        if span == 0 {
            return vec![];
        }
        let band_len = span * self.height * self.channels;
        let height = self.height;
        let channels = self.channels;
        self.data
            .chunks_exact_mut(band_len)
            .take(tiling.task_count())
            .enumerate()
            .map(|(task, data)| BandMut {
                first_col: task * span,
                span,
                height,
                channels,
                data,
            })
            .collect()
    }

    /// The samples in row-major, channel-interleaved order, the way
    /// image encoders expect them.
    pub fn interleaved(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len());
        for row in 0..self.height {
            for col in 0..self.width {
                for channel in 0..self.channels {
                    out.push(self.get(channel, row, col));
                }
            }
        }
        out
    }
}

/// A mutable view over a contiguous span of a Raster's columns.  A
/// band is the write target of exactly one task; bands from the same
/// `bands_mut` call never alias, so sibling tasks can fill them
/// concurrently without locks.
#[derive(Debug)]
pub struct BandMut<'a> {
    first_col: usize,
    span: usize,
    height: usize,
    channels: usize,
    data: &'a mut [u8],
}

impl<'a> BandMut<'a> {
    /// The absolute column range this band covers.
    pub fn cols(&self) -> ::std::ops::Range<usize> {
        self.first_col..(self.first_col + self.span)
    }

    /// Store one sample, addressed with absolute raster coordinates.
    /// The column must lie inside `cols()`.
    pub fn set(&mut self, channel: usize, row: usize, col: usize, value: u8) {
        debug_assert!(col >= self.first_col && col < self.first_col + self.span);
        let offset = ((col - self.first_col) * self.height + row) * self.channels + channel;
        self.data[offset] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_fails_on_zero_dimension() {
        assert!(Raster::new(0, 4, 4).is_err());
        assert!(Raster::new(3, 0, 4).is_err());
        assert!(Raster::new(3, 4, 0).is_err());
    }

    #[test]
    fn raster_starts_zeroed() {
        let raster = Raster::new(3, 2, 2).unwrap();
        assert_eq!(raster.len(), 12);
        assert!(!raster.is_empty());
        for channel in 0..3 {
            for row in 0..2 {
                for col in 0..2 {
                    assert_eq!(raster.get(channel, row, col), 0);
                }
            }
        }
    }

    #[test]
    fn set_then_get_roundtrips() {
        let mut raster = Raster::new(3, 4, 5).unwrap();
        raster.set(1, 2, 3, 200);
        assert_eq!(raster.get(1, 2, 3), 200);
        assert_eq!(raster.get(0, 2, 3), 0);
        assert_eq!(raster.get(1, 3, 3), 0);
    }

    #[test]
    fn bands_cover_disjoint_columns() {
        let mut raster = Raster::new(1, 2, 8).unwrap();
        let tiling = Tiling::new(8, 4).unwrap();
        {
            let bands = raster.bands_mut(tiling);
            assert_eq!(bands.len(), 4);
            for (task, mut band) in bands.into_iter().enumerate() {
                assert_eq!(band.cols(), (task * 2)..(task * 2 + 2));
                for col in band.cols() {
                    band.set(0, 0, col, task as u8 + 1);
                }
            }
        }
        for col in 0..8 {
            assert_eq!(raster.get(0, 0, col), (col / 2) as u8 + 1);
            assert_eq!(raster.get(0, 1, col), 0);
        }
    }

    #[test]
    fn remainder_columns_get_no_band() {
        let mut raster = Raster::new(1, 2, 10).unwrap();
        let tiling = Tiling::new(10, 4).unwrap();
        let bands = raster.bands_mut(tiling);
        assert_eq!(bands.len(), 4);
        assert_eq!(bands.last().unwrap().cols(), 6..8);
    }

    #[test]
    fn oversubscribed_tiling_yields_no_bands() {
        let mut raster = Raster::new(1, 2, 4).unwrap();
        let tiling = Tiling::new(4, 8).unwrap();
        assert!(raster.bands_mut(tiling).is_empty());
    }

    #[test]
    fn interleaved_is_row_major() {
        let mut raster = Raster::new(2, 2, 2).unwrap();
        // Tag every sample with a row/col/channel fingerprint.
        for row in 0..2 {
            for col in 0..2 {
                for channel in 0..2 {
                    raster.set(channel, row, col, (row * 100 + col * 10 + channel) as u8);
                }
            }
        }
        assert_eq!(
            raster.interleaved(),
            vec![0, 1, 10, 11, 100, 101, 110, 111]
        );
    }
}
