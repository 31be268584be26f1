//! Title embedding: the black-box model seam and the corpus-level driver.
//!
//! Invariants: the matrix has exactly one row per corpus record, in corpus
//! order, all of the embedder's declared width. Anything else aborts the run.

mod hashing;
#[cfg(feature = "api_embed")]
mod openai;

use ndarray::Array2;

use crate::types::{Corpus, EmbeddingMatrix};
use crate::{AtlasError, Result};

pub use hashing::HashingEmbedder;
#[cfg(feature = "api_embed")]
pub use openai::{OpenAiEmbedder, OpenAiEmbedderConfig};

/// A pretrained text-embedding function, deterministic for a fixed model.
pub trait TitleEmbedder {
    /// Embed each title, returning one vector per input in input order.
    fn embed_titles(&self, titles: &[&str]) -> Result<Vec<Vec<f32>>>;

    fn embedding_dimension(&self) -> usize;

    /// Identifier recorded in layout provenance.
    fn model_name(&self) -> &str;
}

impl<E: TitleEmbedder + ?Sized> TitleEmbedder for &E {
    fn embed_titles(&self, titles: &[&str]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_titles(titles)
    }

    fn embedding_dimension(&self) -> usize {
        (**self).embedding_dimension()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

impl<E: TitleEmbedder + ?Sized> TitleEmbedder for Box<E> {
    fn embed_titles(&self, titles: &[&str]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_titles(titles)
    }

    fn embedding_dimension(&self) -> usize {
        (**self).embedding_dimension()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Embed every corpus title in `batch_size` chunks.
pub fn embed_corpus<E>(corpus: &Corpus, embedder: &E, batch_size: usize) -> Result<EmbeddingMatrix>
where
    E: TitleEmbedder + ?Sized,
{
    let titles: Vec<&str> = corpus.titles().collect();
    if let Some(index) = titles.iter().position(|title| title.trim().is_empty()) {
        return Err(AtlasError::EmptyTitle { index });
    }

    let dimension = embedder.embedding_dimension();
    let mut flat = Vec::with_capacity(titles.len() * dimension);
    let mut row = 0usize;
    for chunk in titles.chunks(batch_size.max(1)) {
        let vectors = embedder.embed_titles(chunk)?;
        if vectors.len() != chunk.len() {
            return Err(AtlasError::EmbeddingRowMismatch {
                expected: titles.len(),
                got: row + vectors.len(),
            });
        }
        for vector in vectors {
            if vector.len() != dimension {
                return Err(AtlasError::EmbeddingDimensionMismatch {
                    row,
                    expected: dimension,
                    got: vector.len(),
                });
            }
            if vector.iter().any(|value| !value.is_finite()) {
                return Err(AtlasError::EmbeddingFailed {
                    reason: format!("row {row} contains a non-finite value"),
                });
            }
            flat.extend(vector);
            row += 1;
        }
    }

    let data = Array2::from_shape_vec((titles.len(), dimension), flat).map_err(|err| {
        AtlasError::EmbeddingFailed {
            reason: err.to_string(),
        }
    })?;
    tracing::info!(
        target = "pubatlas::embed",
        model = embedder.model_name(),
        rows = data.nrows(),
        dimension,
        "titles embedded"
    );
    Ok(EmbeddingMatrix::new(data, embedder.model_name()))
}
