//! Builder-style options controlling an atlas run.

use serde::{Deserialize, Serialize};

use super::record::SourceOrder;
use crate::constants::{
    DEFAULT_AXIS_MARGIN, DEFAULT_EARLY_EXAGGERATION, DEFAULT_EMBED_BATCH_SIZE, DEFAULT_PERPLEXITY,
    DEFAULT_SEED, DEFAULT_TSNE_ANGLE, DEFAULT_TSNE_ITERATIONS, TSNE_EXPLORATION_ITERATIONS,
};
use crate::{AtlasError, Result};

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_perplexity() -> f64 {
    DEFAULT_PERPLEXITY
}

fn default_early_exaggeration() -> f64 {
    DEFAULT_EARLY_EXAGGERATION
}

fn default_iterations() -> usize {
    DEFAULT_TSNE_ITERATIONS
}

fn default_angle() -> f64 {
    DEFAULT_TSNE_ANGLE
}

fn default_axis_margin() -> f64 {
    DEFAULT_AXIS_MARGIN
}

fn default_batch_size() -> usize {
    DEFAULT_EMBED_BATCH_SIZE
}

/// Starting positions for the t-SNE optimisation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TsneInit {
    /// Leading two principal components of the embeddings, rescaled.
    #[default]
    Pca,
    /// Seeded isotropic Gaussian.
    Random,
}

/// How the t-SNE gradient is computed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TsneMethod {
    /// Sparse nearest-neighbour affinities and a quadtree approximation of
    /// the repulsive forces. Roughly `O(n log n)` per iteration.
    #[default]
    BarnesHut,
    /// Dense affinities and exact forces. Quadratic in time and memory.
    Exact,
}

/// Knobs for the neighbourhood-preserving stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TsneOptions {
    /// Target effective neighbour count; clamped to `n - 1` for small inputs.
    #[serde(default = "default_perplexity")]
    pub perplexity: f64,
    #[serde(default = "default_early_exaggeration")]
    pub early_exaggeration: f64,
    /// `None` picks `max(n / early_exaggeration / 4, 50)`.
    #[serde(default)]
    pub learning_rate: Option<f64>,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default)]
    pub init: TsneInit,
    #[serde(default)]
    pub method: TsneMethod,
    /// Barnes-Hut opening angle in `[0, 1]`; ignored by the exact method.
    #[serde(default = "default_angle")]
    pub angle: f64,
}

impl Default for TsneOptions {
    fn default() -> Self {
        Self {
            perplexity: default_perplexity(),
            early_exaggeration: default_early_exaggeration(),
            learning_rate: None,
            iterations: default_iterations(),
            init: TsneInit::default(),
            method: TsneMethod::default(),
            angle: default_angle(),
        }
    }
}

/// Options for both projection stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectionOptions {
    /// Seeds t-SNE initialisation and the PCA power iteration.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub tsne: TsneOptions,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            tsne: TsneOptions::default(),
        }
    }
}

impl ProjectionOptions {
    pub fn validate(&self) -> Result<()> {
        let tsne = &self.tsne;
        if !(tsne.perplexity.is_finite() && tsne.perplexity > 0.0) {
            return Err(AtlasError::InvalidOptions {
                reason: format!("perplexity must be positive, got {}", tsne.perplexity),
            });
        }
        if !(tsne.early_exaggeration.is_finite() && tsne.early_exaggeration >= 1.0) {
            return Err(AtlasError::InvalidOptions {
                reason: format!(
                    "early exaggeration must be at least 1, got {}",
                    tsne.early_exaggeration
                ),
            });
        }
        if let Some(rate) = tsne.learning_rate {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(AtlasError::InvalidOptions {
                    reason: format!("learning rate must be positive, got {rate}"),
                });
            }
        }
        if !(0.0..=1.0).contains(&tsne.angle) {
            return Err(AtlasError::InvalidOptions {
                reason: format!("Barnes-Hut angle must lie in [0, 1], got {}", tsne.angle),
            });
        }
        if tsne.iterations < TSNE_EXPLORATION_ITERATIONS {
            return Err(AtlasError::InvalidOptions {
                reason: format!(
                    "t-SNE needs at least {TSNE_EXPLORATION_ITERATIONS} iterations, got {}",
                    tsne.iterations
                ),
            });
        }
        Ok(())
    }
}

/// Tunable options for a whole atlas run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineOptions {
    #[serde(default)]
    pub source_order: SourceOrder,
    /// Only ingest the first N sources after ordering.
    #[serde(default)]
    pub max_sources: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub embed_batch_size: usize,
    #[serde(default)]
    pub projection: ProjectionOptions,
    /// Outward scale of the axis bounds; 1.05 leaves a 5% margin.
    #[serde(default = "default_axis_margin")]
    pub axis_margin: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            source_order: SourceOrder::default(),
            max_sources: None,
            embed_batch_size: default_batch_size(),
            projection: ProjectionOptions::default(),
            axis_margin: default_axis_margin(),
        }
    }
}

impl PipelineOptions {
    /// Start a fluent builder for `PipelineOptions`.
    #[must_use]
    pub fn builder() -> PipelineOptionsBuilder {
        PipelineOptionsBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.embed_batch_size == 0 {
            return Err(AtlasError::InvalidOptions {
                reason: "embed batch size must be non-zero".into(),
            });
        }
        if !(self.axis_margin.is_finite() && self.axis_margin >= 1.0) {
            return Err(AtlasError::InvalidOptions {
                reason: format!("axis margin must be at least 1.0, got {}", self.axis_margin),
            });
        }
        self.projection.validate()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptionsBuilder {
    inner: PipelineOptions,
}

impl PipelineOptionsBuilder {
    #[must_use]
    pub fn source_order(mut self, order: SourceOrder) -> Self {
        self.inner.source_order = order;
        self
    }

    #[must_use]
    pub fn max_sources(mut self, limit: usize) -> Self {
        self.inner.max_sources = Some(limit);
        self
    }

    #[must_use]
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.inner.embed_batch_size = size;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.inner.projection.seed = seed;
        self
    }

    #[must_use]
    pub fn perplexity(mut self, perplexity: f64) -> Self {
        self.inner.projection.tsne.perplexity = perplexity;
        self
    }

    #[must_use]
    pub fn early_exaggeration(mut self, factor: f64) -> Self {
        self.inner.projection.tsne.early_exaggeration = factor;
        self
    }

    /// Fix the learning rate instead of deriving it from the corpus size.
    #[must_use]
    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.inner.projection.tsne.learning_rate = Some(rate);
        self
    }

    #[must_use]
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.inner.projection.tsne.iterations = iterations;
        self
    }

    #[must_use]
    pub fn init(mut self, init: TsneInit) -> Self {
        self.inner.projection.tsne.init = init;
        self
    }

    #[must_use]
    pub fn method(mut self, method: TsneMethod) -> Self {
        self.inner.projection.tsne.method = method;
        self
    }

    #[must_use]
    pub fn angle(mut self, angle: f64) -> Self {
        self.inner.projection.tsne.angle = angle;
        self
    }

    #[must_use]
    pub fn axis_margin(mut self, margin: f64) -> Self {
        self.inner.axis_margin = margin;
        self
    }

    #[must_use]
    pub fn build(self) -> PipelineOptions {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        PipelineOptions::default().validate().unwrap();
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let opts: PipelineOptions = serde_json::from_str(r#"{"max_sources": 3}"#).unwrap();
        assert_eq!(opts.max_sources, Some(3));
        assert_eq!(opts.projection.seed, DEFAULT_SEED);
        assert_eq!(opts.projection.tsne.iterations, DEFAULT_TSNE_ITERATIONS);
        assert_eq!(opts.source_order, SourceOrder::CaseInsensitive);
        assert_eq!(opts.projection.tsne.method, TsneMethod::BarnesHut);
        assert!((opts.projection.tsne.angle - DEFAULT_TSNE_ANGLE).abs() < f64::EPSILON);
        assert!((opts.axis_margin - DEFAULT_AXIS_MARGIN).abs() < f64::EPSILON);
    }

    #[test]
    fn method_parses_from_snake_case() {
        let opts: TsneOptions = serde_json::from_str(r#"{"method": "exact"}"#).unwrap();
        assert_eq!(opts.method, TsneMethod::Exact);
        let opts = PipelineOptions::builder()
            .method(TsneMethod::Exact)
            .angle(0.0)
            .build();
        assert_eq!(opts.projection.tsne.method, TsneMethod::Exact);
        opts.validate().unwrap();
    }

    #[test]
    fn rejects_bad_values() {
        let opts = PipelineOptions::builder().perplexity(0.0).build();
        assert!(matches!(
            opts.validate(),
            Err(AtlasError::InvalidOptions { .. })
        ));

        let opts = PipelineOptions::builder().iterations(100).build();
        assert!(opts.validate().is_err());

        let opts = PipelineOptions::builder().axis_margin(0.9).build();
        assert!(opts.validate().is_err());

        let opts = PipelineOptions::builder().embed_batch_size(0).build();
        assert!(opts.validate().is_err());

        let opts = PipelineOptions::builder().learning_rate(-1.0).build();
        assert!(opts.validate().is_err());

        let opts = PipelineOptions::builder().angle(1.5).build();
        assert!(opts.validate().is_err());
    }
}
