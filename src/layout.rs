//! Joins corpus rows, projected coordinates and source colors into the final
//! presentation table, and derives the plot ranges.

use serde_json::Map;

use crate::palette::Palette;
use crate::projection::Projection;
use crate::types::{AxisBounds, AxisRange, Corpus, Layout, LayoutRow};
use crate::{AtlasError, Result};

/// Column names owned by the layout; raw fields with these names are not
/// copied into the passthrough map.
pub const RESERVED_COLUMNS: [&str; 5] = ["title", "source_id", "x", "y", "color"];

/// Row-aligned merge of `corpus`, `projection` and `palette`.
///
/// `margin` scales each axis extent outward (1.05 for a 5% margin).
pub fn assemble_layout(
    corpus: &Corpus,
    projection: &Projection,
    palette: &Palette,
    margin: f64,
) -> Result<Layout> {
    if projection.len() != corpus.len() {
        return Err(AtlasError::RowMismatch {
            expected: corpus.len(),
            got: projection.len(),
        });
    }

    let mut rows = Vec::with_capacity(corpus.len());
    for (index, record) in corpus.records().iter().enumerate() {
        let color = palette.color_for(&record.source_id)?;
        let (x, y) = projection.point(index);
        let fields: Map<_, _> = record
            .fields
            .iter()
            .filter(|(key, _)| !RESERVED_COLUMNS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        rows.push(LayoutRow {
            title: record.title.clone(),
            source_id: record.source_id.clone(),
            x,
            y,
            color: color.to_string(),
            fields,
        });
    }

    let bounds = axis_bounds(
        rows.iter().map(|row| row.x),
        rows.iter().map(|row| row.y),
        margin,
    );
    tracing::debug!(
        target = "pubatlas::layout",
        rows = rows.len(),
        x_min = bounds.x.min,
        x_max = bounds.x.max,
        y_min = bounds.y.min,
        y_max = bounds.y.max,
        "layout assembled"
    );
    Ok(Layout {
        rows,
        bounds,
        legend: palette.entries().to_vec(),
        provenance: None,
    })
}

/// Plot ranges with the y axis anchored to the x axis scale.
#[must_use]
pub fn axis_bounds(
    xs: impl IntoIterator<Item = f64>,
    ys: impl IntoIterator<Item = f64>,
    margin: f64,
) -> AxisBounds {
    AxisBounds {
        x: axis_range(xs, margin),
        y: axis_range(ys, margin),
        aspect_ratio: 1.0,
    }
}

/// `[min, max]` pushed outward by `|v| * (margin - 1)` on each end.
///
/// For data straddling zero this is exactly `[min * margin, max * margin]`.
/// An empty input yields `[0, 0]`.
#[must_use]
pub fn axis_range(values: impl IntoIterator<Item = f64>, margin: f64) -> AxisRange {
    let (min, max) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if min > max {
        return AxisRange { min: 0.0, max: 0.0 };
    }
    let slack = margin - 1.0;
    AxisRange {
        min: min - min.abs() * slack,
        max: max + max.abs() * slack,
    }
}
