//! Error type shared by every stage of the atlas pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Fatal conditions raised while building an atlas.
///
/// Records without a usable title are not errors: the normalizer drops them
/// and reports the count instead.
#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("insufficient data to project: need at least {min} records, got {got}")]
    InsufficientData { min: usize, got: usize },

    #[error("embedding failed: {reason}")]
    EmbeddingFailed { reason: String },

    #[error("embedder returned {got} rows for {expected} titles")]
    EmbeddingRowMismatch { expected: usize, got: usize },

    #[error("embedding row {row} has dimension {got}, expected {expected}")]
    EmbeddingDimensionMismatch {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("record {index} reached the embedder with an empty title")]
    EmptyTitle { index: usize },

    #[error("no palette color for source `{source_id}`")]
    UnknownSource { source_id: String },

    #[error("source `{source_id}` was supplied more than once")]
    DuplicateSource { source_id: String },

    #[error("projection has {got} rows but the corpus has {expected}")]
    RowMismatch { expected: usize, got: usize },

    #[error("projection failed: {reason}")]
    Projection { reason: String },

    #[error("invalid options: {reason}")]
    InvalidOptions { reason: String },

    #[error("failed to read source file {path}: {reason}")]
    SourceFile { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
