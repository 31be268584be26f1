//! End-to-end atlas build: normalize, embed, project, color, assemble.
//!
//! Each stage consumes only the previous stage's output. Any fatal error
//! aborts the run before a layout exists; dropped records are reported but do
//! not change the outcome.

use tracing::instrument;

use crate::embed::{TitleEmbedder, embed_corpus};
use crate::layout::assemble_layout;
use crate::normalize::normalize_sources;
use crate::palette::{Colormap, Palette};
use crate::projection::{Projection, Projector};
use crate::types::{
    Corpus, EmbeddingMatrix, Layout, LayoutProvenance, PipelineOptions, SourceBatch,
};
use crate::{AtlasError, Result};

/// Every intermediate of one run, row-aligned with each other.
#[derive(Debug, Clone)]
pub struct AtlasRun {
    pub corpus: Corpus,
    pub embeddings: EmbeddingMatrix,
    pub projection: Projection,
    pub palette: Palette,
    pub layout: Layout,
}

pub struct AtlasPipeline<E> {
    embedder: E,
    options: PipelineOptions,
    colormap: Colormap,
}

impl<E: TitleEmbedder> AtlasPipeline<E> {
    /// Pipeline with default options and the default colormap.
    #[must_use]
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            options: PipelineOptions::default(),
            colormap: Colormap::default(),
        }
    }

    pub fn with_options(embedder: E, options: PipelineOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            embedder,
            options,
            colormap: Colormap::default(),
        })
    }

    #[must_use]
    pub fn colormap(mut self, colormap: Colormap) -> Self {
        self.colormap = colormap;
        self
    }

    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    #[must_use]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Build the layout for `batches`.
    pub fn run(&self, batches: Vec<SourceBatch>) -> Result<Layout> {
        self.run_detailed(batches).map(|run| run.layout)
    }

    /// Build the layout and keep every intermediate.
    #[instrument(
        target = "pubatlas::pipeline",
        skip_all,
        fields(sources = batches.len(), seed = self.options.projection.seed)
    )]
    pub fn run_detailed(&self, batches: Vec<SourceBatch>) -> Result<AtlasRun> {
        self.options.validate()?;
        let corpus = normalize_sources(
            batches,
            self.options.source_order,
            self.options.max_sources,
        )?;
        let dropped = corpus.report().dropped_records();
        if dropped > 0 {
            tracing::info!(
                target = "pubatlas::pipeline",
                dropped,
                "records without a usable title were skipped"
            );
        }
        // Fail before paying for embeddings when the projection cannot run.
        if corpus.len() < crate::constants::MIN_PROJECTION_POINTS {
            return Err(AtlasError::InsufficientData {
                min: crate::constants::MIN_PROJECTION_POINTS,
                got: corpus.len(),
            });
        }

        let embeddings = embed_corpus(&corpus, &self.embedder, self.options.embed_batch_size)?;
        let projection = Projector::new(self.options.projection.clone())?.project(&embeddings)?;
        let palette = Palette::allocate(corpus.sources(), &self.colormap);
        let mut layout = assemble_layout(&corpus, &projection, &palette, self.options.axis_margin)?;
        layout.provenance = Some(LayoutProvenance {
            seed: self.options.projection.seed,
            embedding: embeddings.identity().clone(),
            embedding_fingerprint: embeddings.fingerprint(),
            dropped_records: dropped,
            kl_divergence: Some(projection.report().kl_divergence),
        });

        tracing::info!(
            target = "pubatlas::pipeline",
            rows = layout.len(),
            sources = palette.len(),
            "atlas built"
        );
        Ok(AtlasRun {
            corpus,
            embeddings,
            projection,
            palette,
            layout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashingEmbedder;
    use serde_json::{Value, json};

    fn batch(source: &str, titles: &[&str]) -> SourceBatch {
        let records = titles
            .iter()
            .map(|title| match json!({ "title": title }) {
                Value::Object(map) => map,
                _ => unreachable!(),
            })
            .collect();
        SourceBatch::new(source, records)
    }

    fn pipeline() -> AtlasPipeline<HashingEmbedder> {
        let options = PipelineOptions::builder().iterations(300).build();
        AtlasPipeline::with_options(HashingEmbedder::new(64), options).unwrap()
    }

    #[test]
    fn single_record_aborts_before_embedding() {
        let err = pipeline()
            .run(vec![batch("A", &["Only one title"])])
            .unwrap_err();
        assert!(matches!(err, AtlasError::InsufficientData { min: 2, got: 1 }));
    }

    #[test]
    fn provenance_records_seed_model_and_drops() {
        let run = pipeline()
            .run_detailed(vec![
                batch("A", &["Deep learning for robotics", ""]),
                batch("B", &["Soft robotic grippers"]),
            ])
            .unwrap();
        let provenance = run.layout.provenance.as_ref().unwrap();
        assert_eq!(provenance.seed, crate::constants::DEFAULT_SEED);
        assert_eq!(provenance.dropped_records, 1);
        assert_eq!(provenance.embedding.dimension, 64);
        assert_eq!(provenance.embedding_fingerprint, run.embeddings.fingerprint());
        assert_eq!(run.embeddings.rows(), run.corpus.len());
        assert_eq!(run.projection.len(), run.corpus.len());
    }

    #[test]
    fn invalid_options_fail_construction() {
        let options = PipelineOptions::builder().axis_margin(0.5).build();
        assert!(AtlasPipeline::with_options(HashingEmbedder::new(8), options).is_err());
    }
}
