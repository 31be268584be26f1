//! Two-stage projection of embeddings onto the plane.
//!
//! Stage one is t-SNE from `n x d` to `n x 2`. Stage two is PCA over the
//! stage-one output (never the input embeddings), which turns the
//! arbitrary t-SNE orientation into a canonical one: major variance along x,
//! minor along y. The composition is fixed; swapping or skipping a stage
//! changes what the map means.

pub mod pca;
mod quadtree;
pub mod tsne;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::constants::MIN_PROJECTION_POINTS;
use crate::types::{EmbeddingMatrix, ProjectionOptions, TsneMethod};
use crate::{AtlasError, Result};

pub use tsne::{Tsne, TsneFit};

/// Diagnostics of one projection run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectionReport {
    pub kl_divergence: f64,
    pub iterations: usize,
    pub perplexity: f64,
    pub learning_rate: f64,
    pub method: TsneMethod,
    /// Share of variance on the (x, y) axes after re-orientation.
    pub explained_variance_ratio: [f64; 2],
}

/// `n x 2` coordinates in corpus row order.
#[derive(Debug, Clone)]
pub struct Projection {
    coords: Array2<f64>,
    report: ProjectionReport,
}

impl Projection {
    #[cfg(test)]
    pub(crate) fn from_coords(coords: Array2<f64>) -> Self {
        Self {
            coords,
            report: ProjectionReport {
                kl_divergence: 0.0,
                iterations: 0,
                perplexity: 0.0,
                learning_rate: 0.0,
                method: TsneMethod::default(),
                explained_variance_ratio: [0.0, 0.0],
            },
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.coords.nrows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coords.nrows() == 0
    }

    #[must_use]
    pub fn coords(&self) -> &Array2<f64> {
        &self.coords
    }

    #[must_use]
    pub fn point(&self, row: usize) -> (f64, f64) {
        (self.coords[[row, 0]], self.coords[[row, 1]])
    }

    #[must_use]
    pub fn report(&self) -> &ProjectionReport {
        &self.report
    }
}

/// Runs both stages with one set of options.
#[derive(Debug, Clone)]
pub struct Projector {
    options: ProjectionOptions,
}

impl Projector {
    pub fn new(options: ProjectionOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    #[must_use]
    pub fn options(&self) -> &ProjectionOptions {
        &self.options
    }

    pub fn project(&self, embeddings: &EmbeddingMatrix) -> Result<Projection> {
        let n = embeddings.rows();
        if n < MIN_PROJECTION_POINTS {
            return Err(AtlasError::InsufficientData {
                min: MIN_PROJECTION_POINTS,
                got: n,
            });
        }

        let data = embeddings.data().mapv(f64::from);
        let fit = Tsne::new(&self.options.tsne, self.options.seed).fit(data.view())?;
        let (coords, explained_variance_ratio) = pca::reorient(fit.embedding.view());
        if coords.iter().any(|v| !v.is_finite()) {
            return Err(AtlasError::Projection {
                reason: "re-orientation produced non-finite coordinates".into(),
            });
        }

        let report = ProjectionReport {
            kl_divergence: fit.kl_divergence,
            iterations: fit.iterations,
            perplexity: fit.perplexity,
            learning_rate: fit.learning_rate,
            method: fit.method,
            explained_variance_ratio,
        };
        tracing::info!(
            target = "pubatlas::projection",
            points = n,
            dimension = embeddings.dimension(),
            seed = self.options.seed,
            method = ?report.method,
            kl = report.kl_divergence,
            iterations = report.iterations,
            "embeddings projected"
        );
        Ok(Projection { coords, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: Vec<Vec<f32>>) -> EmbeddingMatrix {
        EmbeddingMatrix::from_rows(rows, "test").unwrap()
    }

    fn fast_options() -> ProjectionOptions {
        let mut options = ProjectionOptions::default();
        options.tsne.iterations = 300;
        options.tsne.perplexity = 3.0;
        options
    }

    #[test]
    fn fewer_than_two_points_is_fatal() {
        let projector = Projector::new(fast_options()).unwrap();
        let err = projector.project(&matrix(vec![vec![1.0, 0.0]])).unwrap_err();
        assert!(matches!(
            err,
            AtlasError::InsufficientData { min: 2, got: 1 }
        ));
        assert!(err.to_string().contains("insufficient data to project"));
    }

    #[test]
    fn output_is_centered_and_major_axis_first() {
        let rows: Vec<Vec<f32>> = (0..10)
            .map(|i| {
                let t = i as f32;
                vec![t, 0.5 * t, (t * 0.7).sin(), 1.0]
            })
            .collect();
        let projection = Projector::new(fast_options())
            .unwrap()
            .project(&matrix(rows))
            .unwrap();
        assert_eq!(projection.len(), 10);
        let coords = projection.coords();
        assert!(coords.column(0).sum().abs() < 1e-9);
        assert!(coords.column(1).sum().abs() < 1e-9);
        let var_x = coords.column(0).mapv(|v| v * v).sum();
        let var_y = coords.column(1).mapv(|v| v * v).sum();
        assert!(var_x >= var_y);
        let ratio = projection.report().explained_variance_ratio;
        assert!(ratio[0] >= ratio[1]);
    }

    #[test]
    fn invalid_options_are_rejected_up_front() {
        let mut options = fast_options();
        options.tsne.perplexity = -1.0;
        assert!(matches!(
            Projector::new(options),
            Err(AtlasError::InvalidOptions { .. })
        ));
    }
}
