//! Presentation table handed to the chart renderer.

use std::io::Write;
use std::path::Path;

use atomic_write_file::AtomicWriteFile;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::embedding::EmbeddingIdentity;
use crate::Result;

/// One plotted point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutRow {
    pub title: String,
    pub source_id: String,
    pub x: f64,
    pub y: f64,
    /// `#rrggbb` color of the row's source.
    pub color: String,
    /// Passthrough fields from the raw record (authors, venue, year, ...).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Inclusive plot range for one axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Plot ranges for both axes.
///
/// The y axis is anchored to the x axis scale (`aspect_ratio` of one unit of y
/// per unit of x) so distances read the same in both directions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AxisBounds {
    pub x: AxisRange,
    pub y: AxisRange,
    pub aspect_ratio: f64,
}

/// Inputs a layout can only be reproduced from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutProvenance {
    pub seed: u64,
    pub embedding: EmbeddingIdentity,
    /// Hex BLAKE3 digest of the embedding matrix.
    pub embedding_fingerprint: String,
    pub dropped_records: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kl_divergence: Option<f64>,
}

/// Final table: passthrough fields plus coordinates and colors, row-aligned
/// with the corpus it was built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Layout {
    pub rows: Vec<LayoutRow>,
    pub bounds: AxisBounds,
    /// Source to color, in hue order.
    pub legend: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<LayoutProvenance>,
}

impl Layout {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn xs(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|row| row.x)
    }

    pub fn ys(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|row| row.y)
    }

    /// Colors in row order.
    pub fn colors(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.color.as_str())
    }

    /// Serialize to pretty JSON and atomically replace `path`.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = AtomicWriteFile::options().open(path)?;
        serde_json::to_writer_pretty(&mut file, self)?;
        file.write_all(b"\n")?;
        file.commit()?;
        tracing::info!(
            target = "pubatlas::layout",
            path = %path.display(),
            rows = self.rows.len(),
            "layout written"
        );
        Ok(())
    }

    pub fn read_json(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs_err::read(path.as_ref())?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
