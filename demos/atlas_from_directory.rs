//! Build an atlas from a directory of per-source JSON files.
//!
//! Each `<source>.json` file holds an array of records with at least a
//! `title` field. Pass an optional source limit as the third argument.
//!
//! ```bash
//! cargo run --example atlas_from_directory -- publications/ atlas.json 10
//! ```

use std::path::PathBuf;

use pubatlas_core::{AtlasPipeline, HashingEmbedder, PipelineOptions, source};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let dir = PathBuf::from(args.next().unwrap_or_else(|| "publications".into()));
    let out = PathBuf::from(args.next().unwrap_or_else(|| "atlas.json".into()));
    let limit = args.next().map(|raw| raw.parse::<usize>()).transpose()?;

    let mut builder = PipelineOptions::builder();
    if let Some(limit) = limit {
        builder = builder.max_sources(limit);
    }
    let pipeline = AtlasPipeline::with_options(HashingEmbedder::default(), builder.build())?;

    let batches = source::load_directory(&dir)?;
    let run = pipeline.run_detailed(batches)?;
    run.layout.write_json(&out)?;

    println!(
        "{} titles from {} sources -> {}",
        run.layout.len(),
        run.palette.len(),
        out.display()
    );
    for (source_id, color) in run.palette.entries() {
        println!("  {color}  {source_id}");
    }
    let report = run.corpus.report();
    if report.dropped_records() > 0 {
        println!("skipped {} records without a title", report.dropped_records());
    }
    for skipped in &report.skipped_sources {
        println!("source limit reached, not loaded: {skipped}");
    }
    Ok(())
}
