//! Default tuning values for the atlas pipeline.

/// Seed shared by both projection stages unless overridden.
pub const DEFAULT_SEED: u64 = 42;

/// Fewest records for which a 2D projection is defined.
pub const MIN_PROJECTION_POINTS: usize = 2;

/// Record field holding the text that gets embedded.
pub const TITLE_FIELD: &str = "title";

pub const DEFAULT_PERPLEXITY: f64 = 30.0;
pub const DEFAULT_EARLY_EXAGGERATION: f64 = 12.0;
pub const DEFAULT_TSNE_ITERATIONS: usize = 1000;
/// Iterations run with early exaggeration and low momentum.
pub const TSNE_EXPLORATION_ITERATIONS: usize = 250;
pub const TSNE_MIN_GRAD_NORM: f64 = 1e-7;
pub const TSNE_MAX_ITER_WITHOUT_PROGRESS: usize = 300;
pub const TSNE_MIN_GAIN: f64 = 0.01;
/// Standard deviation of the initial 2D cloud.
pub const TSNE_INIT_SCALE: f64 = 1e-4;
/// Binary search tolerance on the entropy of each conditional distribution.
pub const PERPLEXITY_TOLERANCE: f64 = 1e-5;
pub const PERPLEXITY_SEARCH_STEPS: usize = 100;
/// Barnes-Hut opening angle: a quadtree cell narrower than this fraction of
/// its distance is summarised by its centre of mass.
pub const DEFAULT_TSNE_ANGLE: f64 = 0.5;

/// Outward scale applied to the data extent when computing axis bounds.
pub const DEFAULT_AXIS_MARGIN: f64 = 1.05;

/// Entries in a resolved colormap lookup table.
pub const COLORMAP_LUT_SIZE: usize = 256;

/// Titles sent to the embedder per call.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 64;

/// Width of the vectors produced by [`crate::HashingEmbedder::default`].
pub const DEFAULT_HASHING_DIMENSION: usize = 768;
