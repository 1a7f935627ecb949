//! Contains the GradientTable struct, an ordered set of color-stop
//! ranges that maps the normalized "smooth index" of an escaped point
//! to an RGB triplet.  Points that never escape, and degenerate
//! indices produced by the logarithm underflowing, get the table's
//! terminal color instead.

use num::clamp;

/// One color stop: a linear ramp from `start` to `end` over the
/// half-open slice `[from, to)` of the unit interval.
#[derive(Copy, Clone, Debug)]
pub struct Gradient {
    /// RGB at the low edge of the range.
    pub start: [u8; 3],
    /// RGB at the high edge of the range.
    pub end: [u8; 3],
    /// Low edge of the range, inclusive.
    pub from: f64,
    /// High edge of the range, exclusive.
    pub to: f64,
    /// Discretization step count.  Reserved; the coloring math does
    /// not consume it.
    pub steps: u32,
}

impl Gradient {
    fn blend(&self, t: f64) -> [u8; 3] {
        let mut out = [0u8; 3];
        for channel in 0..3 {
            let a = f64::from(self.start[channel]);
            let b = f64::from(self.end[channel]);
            out[channel] = clamp((a + (b - a) * t).round(), 0.0, 255.0) as u8;
        }
        out
    }
}

/// An ordered sequence of stops partitioning the unit interval.
#[derive(Clone, Debug)]
pub struct GradientTable {
    stops: Vec<Gradient>,
}

impl GradientTable {
    /// Constructor.  The stops must start at 0.0, each must be
    /// well-formed, and each must begin exactly where the previous
    /// one ends, so that every reachable index lands in exactly one
    /// stop.
    pub fn new(stops: Vec<Gradient>) -> Result<GradientTable, String> {
        if stops.is_empty() {
            return Err("a gradient table needs at least one stop".to_string());
        }
        let mut expected = 0.0;
        for stop in &stops {
            if stop.to <= stop.from {
                return Err(format!(
                    "gradient stop range [{}, {}) is empty or inverted",
                    stop.from, stop.to
                ));
            }
            if stop.from != expected {
                return Err(format!(
                    "gradient stop starts at {} where {} was expected",
                    stop.from, expected
                ));
            }
            expected = stop.to;
        }
        Ok(GradientTable { stops })
    }

    /// The palette the original renderer shipped with: a violet flash
    /// just outside the set's border, fading through white to black.
    pub fn default_palette() -> GradientTable {
        GradientTable {
            stops: vec![
                Gradient {
                    start: [0, 0, 0],
                    end: [76, 57, 125],
                    from: 0.0,
                    to: 0.010,
                    steps: 2000,
                },
                Gradient {
                    start: [76, 57, 125],
                    end: [255, 255, 255],
                    from: 0.010,
                    to: 0.020,
                    steps: 2000,
                },
                Gradient {
                    start: [255, 255, 255],
                    end: [0, 0, 0],
                    from: 0.020,
                    to: 0.050,
                    steps: 2000,
                },
                Gradient {
                    start: [0, 0, 0],
                    end: [0, 0, 0],
                    from: 0.050,
                    to: 1.0,
                    steps: 2000,
                },
            ],
        }
    }

    fn terminal(&self) -> [u8; 3] {
        self.stops[self.stops.len() - 1].end
    }

    /// Map a smooth index to a color.  Points that stayed inside the
    /// iteration budget get the terminal color, as do non-finite
    /// indices (the smooth formula takes a log of a log, which
    /// degenerates when the final magnitude is at or below 1).  An
    /// index below the first stop is pulled up to the first stop's
    /// low edge; an index past the last stop gets the terminal color.
    pub fn colorize(&self, q: f64, escaped: bool) -> [u8; 3] {
        if !escaped || !q.is_finite() {
            return self.terminal();
        }
        let q = if q < self.stops[0].from {
            self.stops[0].from
        } else {
            q
        };
        for stop in &self.stops {
            if q >= stop.from && q < stop.to {
                return stop.blend((q - stop.from) / (stop.to - stop.from));
            }
        }
        self.terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> GradientTable {
        GradientTable::new(vec![Gradient {
            start: [0, 0, 0],
            end: [255, 255, 255],
            from: 0.0,
            to: 1.0,
            steps: 100,
        }])
        .unwrap()
    }

    #[test]
    fn table_fails_when_empty() {
        assert!(GradientTable::new(vec![]).is_err());
    }

    #[test]
    fn table_fails_on_gap() {
        let stops = vec![
            Gradient {
                start: [0, 0, 0],
                end: [255, 0, 0],
                from: 0.0,
                to: 0.5,
                steps: 10,
            },
            Gradient {
                start: [255, 0, 0],
                end: [0, 0, 0],
                from: 0.6,
                to: 1.0,
                steps: 10,
            },
        ];
        assert!(GradientTable::new(stops).is_err());
    }

    #[test]
    fn table_fails_on_inverted_stop() {
        let stops = vec![Gradient {
            start: [0, 0, 0],
            end: [255, 0, 0],
            from: 0.5,
            to: 0.2,
            steps: 10,
        }];
        assert!(GradientTable::new(stops).is_err());
    }

    #[test]
    fn members_get_the_terminal_color() {
        let table = GradientTable::default_palette();
        assert_eq!(table.colorize(0.015, false), [0, 0, 0]);
    }

    #[test]
    fn degenerate_index_gets_the_terminal_color() {
        let table = ramp();
        assert_eq!(table.colorize(::std::f64::NAN, true), [255, 255, 255]);
    }

    #[test]
    fn midpoint_interpolates_linearly() {
        let table = ramp();
        assert_eq!(table.colorize(0.5, true), [128, 128, 128]);
    }

    #[test]
    fn range_edges_interpolate_exactly() {
        let table = ramp();
        assert_eq!(table.colorize(0.0, true), [0, 0, 0]);
        // 1.0 is past every stop and falls back to the terminal color.
        assert_eq!(table.colorize(1.0, true), [255, 255, 255]);
    }

    #[test]
    fn negative_index_clamps_to_the_first_stop() {
        let table = ramp();
        assert_eq!(table.colorize(-3.0, true), [0, 0, 0]);
    }

    #[test]
    fn stops_are_selected_by_range() {
        let table = GradientTable::default_palette();
        // Just inside the second stop, at its low edge.
        assert_eq!(table.colorize(0.010, true), [76, 57, 125]);
    }
}
