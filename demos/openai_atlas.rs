//! Build an atlas with an OpenAI-compatible embedding endpoint.
//!
//! Reads `OPENAI_API_KEY` (and optionally `OPENAI_BASE_URL`) from the
//! environment.
//!
//! ```bash
//! cargo run --example openai_atlas --features api_embed -- publications/ atlas.json
//! ```

use std::path::PathBuf;

use pubatlas_core::{AtlasPipeline, OpenAiEmbedder, OpenAiEmbedderConfig, source};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let dir = PathBuf::from(args.next().unwrap_or_else(|| "publications".into()));
    let out = PathBuf::from(args.next().unwrap_or_else(|| "atlas.json".into()));

    let config = OpenAiEmbedderConfig::from_env("text-embedding-3-small", 1536)?;
    let pipeline = AtlasPipeline::new(OpenAiEmbedder::new(config)?);

    let layout = pipeline.run(source::load_directory(&dir)?)?;
    layout.write_json(&out)?;
    println!("{} titles -> {}", layout.len(), out.display());
    Ok(())
}
