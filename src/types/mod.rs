//! Public types exposed by the `pubatlas-core` crate.

pub mod embedding;
pub mod layout;
pub mod options;
pub mod record;

pub use embedding::{EmbeddingIdentity, EmbeddingMatrix};
pub use layout::{AxisBounds, AxisRange, Layout, LayoutProvenance, LayoutRow};
pub use options::{
    PipelineOptions, PipelineOptionsBuilder, ProjectionOptions, TsneInit, TsneMethod, TsneOptions,
};
pub use record::{
    Corpus, NormalizeReport, RawRecord, Record, SourceBatch, SourceOrder, SourceTally,
};
