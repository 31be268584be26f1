#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::cast_possible_truncation,
        clippy::float_cmp,
        clippy::cast_precision_loss
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Documentation lints: internal helpers are self-describing; public APIs keep docs.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Cast safety: row/column counts and color channels are bounded well inside the
// ranges where these casts are exact.
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
//
// Numeric kernels index several parallel buffers at once.
#![allow(clippy::needless_range_loop)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::similar_names)]
// Exact comparisons against stop positions and zero sums are intended.
#![allow(clippy::float_cmp)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::len_without_is_empty)]

//! Publication atlas core.
//!
//! Turns per-source bibliographic records into a 2D map: records are
//! normalized into one corpus, titles are embedded, embeddings are projected
//! with t-SNE followed by a PCA re-orientation, and every source gets a
//! stable color from an evenly sampled hue ramp. The resulting [`Layout`] is
//! what a chart renderer consumes.
//!
//! ```no_run
//! use pubatlas_core::{AtlasPipeline, HashingEmbedder, source};
//!
//! # fn main() -> pubatlas_core::Result<()> {
//! let batches = source::load_directory("publications/")?;
//! let layout = AtlasPipeline::new(HashingEmbedder::default()).run(batches)?;
//! layout.write_json("atlas.json")?;
//! # Ok(())
//! # }
//! ```

/// The pubatlas-core crate version (matches `Cargo.toml`).
pub const PUBATLAS_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod constants;
pub mod embed;
pub mod error;
pub mod layout;
pub mod normalize;
pub mod palette;
pub mod pipeline;
pub mod projection;
pub mod source;
pub mod types;

pub use embed::{HashingEmbedder, TitleEmbedder, embed_corpus};
#[cfg(feature = "api_embed")]
pub use embed::{OpenAiEmbedder, OpenAiEmbedderConfig};
pub use error::{AtlasError, Result};
pub use layout::{assemble_layout, axis_bounds, axis_range};
pub use normalize::normalize_sources;
pub use palette::{Colormap, Palette, to_hex};
pub use pipeline::{AtlasPipeline, AtlasRun};
pub use projection::{Projection, ProjectionReport, Projector};
pub use types::{
    AxisBounds, AxisRange, Corpus, EmbeddingIdentity, EmbeddingMatrix, Layout, LayoutProvenance,
    LayoutRow, NormalizeReport, PipelineOptions, PipelineOptionsBuilder, ProjectionOptions,
    RawRecord, Record, SourceBatch, SourceOrder, SourceTally, TsneInit, TsneMethod, TsneOptions,
};
