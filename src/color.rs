//! Color ramp lookup.
//!
//! All ramps are 11-stop tables interpolated piecewise-linearly, with a
//! "normal" direction that maps the maximum value to the first stop and a
//! "reversed" direction that maps the minimum there. A histogram-equalized
//! variant replaces the even stop spacing with data-driven stop values.

use serde::{Deserialize, Serialize};

/// Number of stops in every color table.
pub const NUM_COLORS: usize = 11;

/// Bin count for the raw histogram backing equalized coloring.
pub const RAW_HISTOGRAM_DIM: usize = 1000;

pub type Rgb = [f32; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorTable {
    Haxby,
    Bright,
    Muted,
    RedToBlue,
    Gray,
    Flat,
    SeaLevel1,
    SeaLevel2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RampDirection {
    Normal,
    Reversed,
}

#[rustfmt::skip]
pub const HAXBY: [Rgb; NUM_COLORS] = [
    [0.950, 0.950, 0.950], [1.000, 0.729, 0.522], [1.000, 0.631, 0.267],
    [1.000, 0.741, 0.341], [0.941, 0.925, 0.475], [0.804, 1.000, 0.635],
    [0.541, 0.925, 0.682], [0.416, 0.922, 1.000], [0.196, 0.745, 1.000],
    [0.157, 0.498, 0.984], [0.145, 0.224, 0.686],
];

#[rustfmt::skip]
pub const BRIGHT: [Rgb; NUM_COLORS] = [
    [1.000, 0.000, 0.000], [1.000, 0.250, 0.000], [1.000, 0.500, 0.000],
    [1.000, 1.000, 0.000], [0.500, 1.000, 0.000], [0.000, 1.000, 0.000],
    [0.000, 1.000, 1.000], [0.000, 0.500, 1.000], [0.000, 0.000, 1.000],
    [0.500, 0.000, 1.000], [1.000, 0.000, 1.000],
];

#[rustfmt::skip]
pub const MUTED: [Rgb; NUM_COLORS] = [
    [0.784, 0.000, 0.000], [0.761, 0.192, 0.000], [0.702, 0.353, 0.000],
    [0.553, 0.553, 0.000], [0.353, 0.702, 0.000], [0.000, 0.784, 0.000],
    [0.000, 0.553, 0.553], [0.000, 0.353, 0.702], [0.000, 0.000, 0.784],
    [0.353, 0.000, 0.702], [0.553, 0.000, 0.553],
];

#[rustfmt::skip]
pub const RED_TO_BLUE: [Rgb; NUM_COLORS] = [
    [1.000, 0.000, 0.000], [1.000, 0.250, 0.000], [1.000, 0.500, 0.000],
    [1.000, 0.750, 0.000], [1.000, 1.000, 0.000], [0.750, 1.000, 0.000],
    [0.500, 1.000, 0.000], [0.000, 1.000, 0.000], [0.000, 1.000, 1.000],
    [0.000, 0.500, 1.000], [0.000, 0.000, 1.000],
];

#[rustfmt::skip]
pub const GRAY: [Rgb; NUM_COLORS] = [
    [0.000, 0.000, 0.000], [0.100, 0.100, 0.100], [0.200, 0.200, 0.200],
    [0.300, 0.300, 0.300], [0.400, 0.400, 0.400], [0.500, 0.500, 0.500],
    [0.600, 0.600, 0.600], [0.700, 0.700, 0.700], [0.800, 0.800, 0.800],
    [0.900, 0.900, 0.900], [1.000, 1.000, 1.000],
];

pub const FLAT: [Rgb; NUM_COLORS] = [[0.500, 0.500, 0.500]; NUM_COLORS];

#[rustfmt::skip]
pub const ABOVE_SEA_LEVEL_1: [Rgb; NUM_COLORS] = [
    [0.980, 0.980, 0.471], [0.960, 0.940, 0.440], [0.941, 0.901, 0.408],
    [0.921, 0.862, 0.376], [0.902, 0.823, 0.345], [0.882, 0.784, 0.314],
    [0.862, 0.744, 0.282], [0.843, 0.705, 0.250], [0.823, 0.666, 0.219],
    [0.804, 0.627, 0.188], [0.784, 0.588, 0.157],
];

#[rustfmt::skip]
pub const ABOVE_SEA_LEVEL_2: [Rgb; NUM_COLORS] = [
    [1.000, 1.000, 0.392], [0.824, 0.784, 0.294], [0.667, 0.627, 0.196],
    [0.569, 0.569, 0.176], [0.471, 0.510, 0.157], [0.471, 0.392, 0.118],
    [0.408, 0.420, 0.094], [0.263, 0.482, 0.027], [0.129, 0.549, 0.000],
    [0.000, 0.627, 0.000], [0.000, 0.902, 0.000],
];

impl ColorTable {
    /// Stop table used for values below sea level (and everywhere for the
    /// plain ramps). The sea-level tables color submerged terrain with
    /// haxby.
    pub fn stops(&self) -> &'static [Rgb; NUM_COLORS] {
        match self {
            ColorTable::Haxby | ColorTable::SeaLevel1 | ColorTable::SeaLevel2 => &HAXBY,
            ColorTable::Bright => &BRIGHT,
            ColorTable::Muted => &MUTED,
            ColorTable::RedToBlue => &RED_TO_BLUE,
            ColorTable::Gray => &GRAY,
            ColorTable::Flat => &FLAT,
        }
    }

    pub fn is_sea_level(&self) -> bool {
        matches!(self, ColorTable::SeaLevel1 | ColorTable::SeaLevel2)
    }

    /// Land table for the sea-level ramps.
    pub fn land_stops(&self) -> &'static [Rgb; NUM_COLORS] {
        match self {
            ColorTable::SeaLevel2 => &ABOVE_SEA_LEVEL_2,
            _ => &ABOVE_SEA_LEVEL_1,
        }
    }
}

/// Interpolate a ramp at a clamped value. Out-of-range values take the
/// given endpoint colors.
pub fn get_color(
    value: f64,
    min: f64,
    max: f64,
    direction: RampDirection,
    below: Rgb,
    above: Rgb,
    stops: &[Rgb; NUM_COLORS],
) -> Rgb {
    let factor = if max <= min {
        0.5
    } else if direction == RampDirection::Normal {
        (max - value) / (max - min)
    } else {
        (value - min) / (max - min)
    };
    if factor >= 1.0 {
        above
    } else if factor <= 0.0 {
        below
    } else {
        let scaled = factor * (NUM_COLORS - 1) as f64;
        let i = scaled as usize;
        let ff = (scaled - i as f64) as f32;
        let lo = stops[i];
        let hi = stops[i + 1];
        [
            lo[0] + ff * (hi[0] - lo[0]),
            lo[1] + ff * (hi[1] - lo[1]),
            lo[2] + ff * (hi[2] - lo[2]),
        ]
    }
}

/// Interpolate a ramp using histogram-equalized stop values instead of
/// even spacing. `stops_at[i]` is the data value assigned to stop i, with
/// `stops_at[0] == min` and `stops_at[NUM_COLORS-1] == max`.
pub fn get_color_histogram(
    value: f64,
    min: f64,
    max: f64,
    direction: RampDirection,
    below: Rgb,
    above: Rgb,
    stops: &[Rgb; NUM_COLORS],
    stops_at: &[f32; NUM_COLORS],
) -> Rgb {
    let factor = if max <= min {
        0.5
    } else if direction == RampDirection::Normal {
        (max - value) / (max - min)
    } else {
        (value - min) / (max - min)
    };
    if factor <= 0.0 {
        below
    } else if factor >= 1.0 {
        above
    } else {
        let mut ii = NUM_COLORS - 2;
        for i in 0..NUM_COLORS - 1 {
            if value >= stops_at[i] as f64 && value <= stops_at[i + 1] as f64 {
                ii = i;
                break;
            }
        }
        let span = (stops_at[ii + 1] - stops_at[ii]) as f64;
        let ff;
        if direction == RampDirection::Normal {
            ff = if span > 0.0 {
                ((stops_at[ii + 1] as f64 - value) / span) as f32
            } else {
                0.0
            };
            ii = NUM_COLORS - 2 - ii;
        } else {
            ff = if span > 0.0 {
                ((value - stops_at[ii] as f64) / span) as f32
            } else {
                0.0
            };
        }
        let lo = stops[ii];
        let hi = stops[ii + 1];
        [
            lo[0] + ff * (hi[0] - lo[0]),
            lo[1] + ff * (hi[1] - lo[1]),
            lo[2] + ff * (hi[2] - lo[2]),
        ]
    }
}

/// Histogram-equalized stop tables for one scalar population: the full
/// range plus separate tables for the negative and non-negative
/// subpopulations (used by the sea-level ramps).
#[derive(Debug, Clone)]
pub struct Histogram {
    pub full: [f32; NUM_COLORS],
    pub neg: Option<[f32; NUM_COLORS]>,
    pub pos: Option<[f32; NUM_COLORS]>,
}

impl Histogram {
    /// Bin the valid values of a scalar population into stop tables.
    pub fn build<I>(values: I, min: f32, max: f32) -> Self
    where
        I: IntoIterator<Item = f32>,
    {
        let dhist = (max - min) / (RAW_HISTOGRAM_DIM - 1) as f32;
        let mut bins = vec![0u32; RAW_HISTOGRAM_DIM];
        let mut nbinned = 0u32;
        let mut nbinnedneg = 0u32;
        let mut nbinnedpos = 0u32;
        for v in values {
            let jbin = ((v - min) / dhist) as i64;
            if (0..RAW_HISTOGRAM_DIM as i64).contains(&jbin) {
                bins[jbin as usize] += 1;
                nbinned += 1;
                if v < 0.0 {
                    nbinnedneg += 1;
                } else {
                    nbinnedpos += 1;
                }
            }
        }

        let equalize = |range: std::ops::Range<usize>, count: u32, lo: f32, hi: f32| {
            let mut stops = [0.0f32; NUM_COLORS];
            stops[0] = lo;
            stops[NUM_COLORS - 1] = hi;
            let mut binnedsum = 0u32;
            let mut khist = 1usize;
            for jbin in range {
                let target = (khist as u32 * count) / (NUM_COLORS - 1) as u32;
                binnedsum += bins[jbin];
                if binnedsum >= target && khist < NUM_COLORS - 1 {
                    stops[khist] = min + jbin as f32 * dhist;
                    khist += 1;
                }
            }
            stops
        };

        let full = equalize(0..RAW_HISTOGRAM_DIM, nbinned, min, max);
        let jbinzero = ((-min / dhist) as usize).min(RAW_HISTOGRAM_DIM - 1);
        let neg = (nbinnedneg > NUM_COLORS as u32)
            .then(|| equalize(0..jbinzero, nbinnedneg, min.min(0.0), max.min(0.0)));
        let pos = (nbinnedpos > NUM_COLORS as u32)
            .then(|| equalize(jbinzero..RAW_HISTOGRAM_DIM, nbinnedpos, min.max(0.0), max.max(0.0)));

        Self { full, neg, pos }
    }
}

/// Ramp selection plus the value range it spans.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorSpec {
    pub table: ColorTable,
    pub direction: RampDirection,
    pub min: f64,
    pub max: f64,
}

impl ColorSpec {
    /// Look up the color for a value, with out-of-range values taking the
    /// ramp endpoints.
    pub fn color(&self, value: f64, histogram: Option<&Histogram>) -> Rgb {
        let stops = self.table.stops();
        self.color_with_endpoints(value, stops[0], stops[NUM_COLORS - 1], histogram)
    }

    /// Same lookup with explicit out-of-range colors (used when coloring
    /// by slope magnitude, where below is blue and above red).
    pub fn color_with_endpoints(
        &self,
        value: f64,
        below: Rgb,
        above: Rgb,
        histogram: Option<&Histogram>,
    ) -> Rgb {
        if self.table.is_sea_level() {
            return self.sea_level_color(value, histogram);
        }
        let stops = self.table.stops();
        match histogram {
            Some(h) => get_color_histogram(
                value,
                self.min,
                self.max,
                self.direction,
                below,
                above,
                stops,
                &h.full,
            ),
            None => get_color(value, self.min, self.max, self.direction, below, above, stops),
        }
    }

    /// Sea-level ramps split the range at zero: one side gets the land
    /// table, the other haxby stretched slightly past zero so the shore
    /// does not pin to an endpoint color. The normal direction puts land
    /// colors above sea level; reversed swaps the halves.
    fn sea_level_color(&self, value: f64, histogram: Option<&Histogram>) -> Rgb {
        let land = self.table.land_stops();
        let (lo, hi, stops, sub) = if value > 0.0 {
            if self.direction == RampDirection::Normal {
                (0.0, self.max, land, histogram.and_then(|h| h.pos.as_ref()))
            } else {
                (
                    -self.max / NUM_COLORS as f64,
                    self.max,
                    &HAXBY,
                    histogram.and_then(|h| h.pos.as_ref()),
                )
            }
        } else if self.direction == RampDirection::Reversed {
            (self.min, 0.0, land, histogram.and_then(|h| h.neg.as_ref()))
        } else {
            (
                self.min,
                -self.min / NUM_COLORS as f64,
                &HAXBY,
                histogram.and_then(|h| h.neg.as_ref()),
            )
        };
        let below = stops[0];
        let above = stops[NUM_COLORS - 1];
        match sub {
            Some(stops_at) => get_color_histogram(
                value,
                lo,
                hi,
                self.direction,
                below,
                above,
                stops,
                stops_at,
            ),
            None => get_color(value, lo, hi, self.direction, below, above, stops),
        }
    }
}
