//! Deterministic source colors sampled evenly around a hue ramp.
//!
//! A [`Colormap`] is a piecewise-linear ramp resolved once into a
//! fixed-size lookup table. For N sources the palette samples the table at
//! N evenly spaced positions from 0 to 1 inclusive, so the first source
//! always gets the ramp's start color and the last its end color.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::constants::COLORMAP_LUT_SIZE;
use crate::{AtlasError, Result};

/// Stops of the `gist_rainbow` ramp: position, then RGB in `[0, 1]`.
const GIST_RAINBOW_STOPS: [(f64, [f64; 3]); 8] = [
    (0.000, [1.00, 0.00, 0.16]),
    (0.030, [1.00, 0.00, 0.00]),
    (0.215, [1.00, 1.00, 0.00]),
    (0.400, [0.00, 1.00, 0.00]),
    (0.586, [0.00, 1.00, 1.00]),
    (0.770, [0.00, 0.00, 1.00]),
    (0.954, [1.00, 0.00, 1.00]),
    (1.000, [1.00, 0.00, 0.75]),
];

static GIST_RAINBOW: Lazy<Colormap> = Lazy::new(|| {
    Colormap::from_stops("gist_rainbow", &GIST_RAINBOW_STOPS)
        .unwrap_or_else(|_| Colormap::solid("gist_rainbow", [1.0, 0.0, 0.16]))
});

/// A color ramp resolved into a lookup table.
#[derive(Debug, Clone, PartialEq)]
pub struct Colormap {
    name: String,
    lut: Vec<[f64; 3]>,
}

impl Colormap {
    /// The broad red-to-magenta ramp used by default.
    #[must_use]
    pub fn gist_rainbow() -> Self {
        GIST_RAINBOW.clone()
    }

    /// Build a ramp from `(position, rgb)` stops.
    ///
    /// Positions must start at 0, end at 1 and never decrease; channels must
    /// lie in `[0, 1]`.
    pub fn from_stops(name: impl Into<String>, stops: &[(f64, [f64; 3])]) -> Result<Self> {
        let name = name.into();
        validate_stops(&name, stops)?;
        let n = COLORMAP_LUT_SIZE;
        let mut lut = Vec::with_capacity(n);
        for i in 0..n {
            let x = i as f64 / (n - 1) as f64;
            lut.push(interpolate(stops, x));
        }
        // Endpoints are pinned to the first and last stop.
        lut[0] = stops[0].1;
        lut[n - 1] = stops[stops.len() - 1].1;
        Ok(Self { name, lut })
    }

    fn solid(name: &str, rgb: [f64; 3]) -> Self {
        Self {
            name: name.to_string(),
            lut: vec![rgb; COLORMAP_LUT_SIZE],
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Color at `x` in `[0, 1]`; values outside are clamped.
    #[must_use]
    pub fn sample(&self, x: f64) -> [f64; 3] {
        let n = self.lut.len();
        let index = if x.is_nan() || x <= 0.0 {
            0
        } else {
            ((x * n as f64).floor() as usize).min(n - 1)
        };
        self.lut[index]
    }
}

impl Default for Colormap {
    fn default() -> Self {
        Self::gist_rainbow()
    }
}

fn validate_stops(name: &str, stops: &[(f64, [f64; 3])]) -> Result<()> {
    let invalid = |reason: String| AtlasError::InvalidOptions {
        reason: format!("colormap `{name}`: {reason}"),
    };
    if stops.len() < 2 {
        return Err(invalid("needs at least two stops".into()));
    }
    if stops[0].0 != 0.0 || stops[stops.len() - 1].0 != 1.0 {
        return Err(invalid("stops must span 0 to 1".into()));
    }
    if stops.windows(2).any(|pair| pair[1].0 < pair[0].0) {
        return Err(invalid("stop positions must not decrease".into()));
    }
    if stops
        .iter()
        .flat_map(|(_, rgb)| rgb.iter())
        .any(|c| !(0.0..=1.0).contains(c))
    {
        return Err(invalid("channels must lie in [0, 1]".into()));
    }
    Ok(())
}

/// Linear interpolation between the stops bracketing `x`, taking the first
/// stop at or after `x` as the upper bracket.
fn interpolate(stops: &[(f64, [f64; 3])], x: f64) -> [f64; 3] {
    let upper = stops
        .iter()
        .position(|(pos, _)| *pos >= x)
        .unwrap_or(stops.len() - 1)
        .max(1);
    let (x0, c0) = stops[upper - 1];
    let (x1, c1) = stops[upper];
    let span = x1 - x0;
    let t = if span > 0.0 { (x - x0) / span } else { 1.0 };
    let mut rgb = [0.0; 3];
    for ch in 0..3 {
        rgb[ch] = (c0[ch] + t * (c1[ch] - c0[ch])).clamp(0.0, 1.0);
    }
    rgb
}

/// `#rrggbb` with each channel rounded half-to-even from `[0, 1]`.
#[must_use]
pub fn to_hex(rgb: [f64; 3]) -> String {
    let bytes = rgb.map(|c| (c.clamp(0.0, 1.0) * 255.0).round_ties_even() as u8);
    format!("#{}", hex::encode(bytes))
}

/// `n` evenly spaced positions from 0 to 1 inclusive.
fn linspace(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let step = 1.0 / (n - 1) as f64;
            let mut points: Vec<f64> = (0..n).map(|i| i as f64 * step).collect();
            points[n - 1] = 1.0;
            points
        }
    }
}

/// One color per source, in source order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Palette {
    entries: Vec<(String, String)>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Palette {
    /// Assign colors to `sources` in the given order.
    ///
    /// Duplicate ids keep their first color.
    #[must_use]
    pub fn allocate(sources: &[String], colormap: &Colormap) -> Self {
        let positions = linspace(sources.len());
        let mut palette = Self::default();
        for (source, x) in sources.iter().zip(positions) {
            if palette.index.contains_key(source) {
                continue;
            }
            let color = to_hex(colormap.sample(x));
            palette.index.insert(source.clone(), palette.entries.len());
            palette.entries.push((source.clone(), color));
        }
        tracing::debug!(
            target = "pubatlas::palette",
            colormap = colormap.name(),
            sources = palette.entries.len(),
            "palette allocated"
        );
        palette
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn color_for(&self, source_id: &str) -> Result<&str> {
        let position = match self.index.get(source_id) {
            Some(position) => Some(*position),
            None => self.entries.iter().position(|(id, _)| id == source_id),
        };
        position
            .map(|i| self.entries[i].1.as_str())
            .ok_or_else(|| AtlasError::UnknownSource {
                source_id: source_id.to_string(),
            })
    }

    /// `(source_id, color)` pairs in allocation order.
    #[must_use]
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn colors(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, color)| color.as_str())
    }
}
