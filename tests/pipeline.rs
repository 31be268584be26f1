//! End-to-end atlas builds through the public API.
//!
//! These run the full normalize -> embed -> project -> color -> assemble chain
//! with the hashing embedder, so they need no network and stay deterministic.

use std::collections::HashSet;

use pubatlas_core::{
    AtlasError, AtlasPipeline, HashingEmbedder, Layout, PipelineOptions, RawRecord, SourceBatch,
    SourceOrder, source,
};
use serde_json::{Value, json};
use tempfile::TempDir;

fn record(value: Value) -> RawRecord {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

fn titled(titles: &[&str]) -> Vec<RawRecord> {
    titles
        .iter()
        .map(|title| record(json!({ "title": title })))
        .collect()
}

fn pipeline(seed: u64) -> AtlasPipeline<HashingEmbedder> {
    let options = PipelineOptions::builder()
        .seed(seed)
        .iterations(300)
        .build();
    AtlasPipeline::with_options(HashingEmbedder::new(128), options).unwrap()
}

fn robotics_sources() -> Vec<SourceBatch> {
    vec![
        SourceBatch::new(
            "Majidi",
            titled(&[
                "Soft robotic grippers with liquid metal",
                "Stretchable electronics for soft robots",
                "Shape memory actuators in soft machines",
            ]),
        ),
        SourceBatch::new(
            "atkeson",
            titled(&[
                "Trajectory optimization for humanoid walking",
                "Learning dynamics models for legged robots",
                "Memory based control of robot arms",
            ]),
        ),
        SourceBatch::new(
            "Bagnell",
            titled(&[
                "Imitation learning with no regret",
                "Structured prediction for autonomous driving",
            ]),
        ),
    ]
}

#[test]
fn blank_titles_are_dropped_and_both_sources_colored() {
    let batches = vec![
        SourceBatch::new("A", titled(&["Deep learning for robotics", ""])),
        SourceBatch::new("B", titled(&["Soft robotic grippers"])),
    ];
    let run = pipeline(42).run_detailed(batches).unwrap();
    let layout = &run.layout;

    assert_eq!(layout.len(), 2);
    assert_eq!(run.palette.len(), 2);
    assert_eq!(layout.rows[0].title, "Deep learning for robotics");
    assert_eq!(layout.rows[1].title, "Soft robotic grippers");
    for row in &layout.rows {
        assert!(row.x.is_finite() && row.y.is_finite());
        assert_eq!(row.color, run.palette.color_for(&row.source_id).unwrap());
    }
    assert_eq!(layout.legend[0], ("A".to_string(), "#ff0029".to_string()));
    assert_eq!(layout.legend[1], ("B".to_string(), "#ff00bf".to_string()));
    assert_eq!(layout.provenance.as_ref().unwrap().dropped_records, 1);
}

#[test]
fn rows_stay_aligned_with_the_corpus_across_dropped_records() {
    let mut batches = robotics_sources();
    // Bagnell sorts between atkeson and Majidi; drop one of its records.
    batches[2].records.insert(1, record(json!({ "title": "   ", "venue": "NeurIPS" })));
    let run = pipeline(42).run_detailed(batches).unwrap();

    assert_eq!(run.corpus.report().dropped_records(), 1);
    assert_eq!(run.layout.len(), run.corpus.len());
    assert_eq!(run.embeddings.rows(), run.corpus.len());
    assert_eq!(run.projection.len(), run.corpus.len());
    let records = run.corpus.records();
    for (i, row) in run.layout.rows.iter().enumerate() {
        assert_eq!(row.title, records[i].title, "row {i}");
        assert_eq!(row.source_id, records[i].source_id, "row {i}");
        assert_eq!((row.x, row.y), run.projection.point(i), "row {i}");
    }
    assert_eq!(
        run.layout.rows[3].title,
        "Imitation learning with no regret"
    );
    assert_eq!(
        run.layout.rows[4].title,
        "Structured prediction for autonomous driving"
    );
}

#[test]
fn every_source_with_rows_gets_exactly_one_color() {
    let run = pipeline(42).run_detailed(robotics_sources()).unwrap();

    assert_eq!(run.palette.len(), run.corpus.sources().len());
    let used: HashSet<&str> = run.layout.colors().collect();
    let allocated: HashSet<&str> = run.palette.colors().collect();
    assert_eq!(used, allocated);
    assert_eq!(allocated.len(), run.palette.len());
    for source in run.corpus.sources() {
        let color = run.palette.color_for(source).unwrap();
        assert!(
            run.layout
                .rows
                .iter()
                .filter(|row| &row.source_id == source)
                .all(|row| row.color == color)
        );
    }
}

#[test]
fn single_usable_record_is_insufficient() {
    let batches = vec![SourceBatch::new(
        "A",
        vec![
            record(json!({ "title": "Only usable title" })),
            record(json!({ "authors": "no title here" })),
        ],
    )];
    match pipeline(42).run(batches) {
        Err(AtlasError::InsufficientData { min, got }) => {
            assert_eq!(min, 2);
            assert_eq!(got, 1);
        }
        other => panic!("expected InsufficientData, got {other:?}"),
    }
}

#[test]
fn empty_input_is_insufficient() {
    assert!(matches!(
        pipeline(42).run(Vec::new()),
        Err(AtlasError::InsufficientData { got: 0, .. })
    ));
}

#[test]
fn rows_follow_case_insensitive_source_order() {
    let layout = pipeline(42).run(robotics_sources()).unwrap();
    let sources: Vec<&str> = layout.rows.iter().map(|r| r.source_id.as_str()).collect();
    assert_eq!(
        sources,
        ["atkeson", "atkeson", "atkeson", "Bagnell", "Bagnell", "Majidi", "Majidi", "Majidi"]
    );
    let legend: Vec<&str> = layout.legend.iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(legend, ["atkeson", "Bagnell", "Majidi"]);
    // Within a source, input order is preserved.
    assert_eq!(
        layout.rows[0].title,
        "Trajectory optimization for humanoid walking"
    );
}

#[test]
fn same_seed_reproduces_the_layout() {
    let first = pipeline(7).run(robotics_sources()).unwrap();
    let second = pipeline(7).run(robotics_sources()).unwrap();
    assert_eq!(first.len(), second.len());
    for (a, b) in first.rows.iter().zip(&second.rows) {
        assert_eq!(a.title, b.title);
        assert_eq!(a.color, b.color);
        assert!((a.x - b.x).abs() < 1e-6, "x drifted: {} vs {}", a.x, b.x);
        assert!((a.y - b.y).abs() < 1e-6, "y drifted: {} vs {}", a.y, b.y);
    }
    assert_eq!(first.provenance, second.provenance);
}

#[test]
fn bounds_contain_every_point() {
    let layout = pipeline(42).run(robotics_sources()).unwrap();
    let bounds = layout.bounds;
    assert_eq!(bounds.aspect_ratio, 1.0);
    for row in &layout.rows {
        assert!(bounds.x.contains(row.x), "x {} outside {:?}", row.x, bounds.x);
        assert!(bounds.y.contains(row.y), "y {} outside {:?}", row.y, bounds.y);
    }
}

#[test]
fn max_sources_limits_the_palette() {
    let options = PipelineOptions::builder()
        .iterations(250)
        .max_sources(2)
        .source_order(SourceOrder::AsGiven)
        .build();
    let run = AtlasPipeline::with_options(HashingEmbedder::new(64), options)
        .unwrap()
        .run_detailed(robotics_sources())
        .unwrap();
    assert_eq!(run.palette.len(), 2);
    assert_eq!(run.corpus.report().skipped_sources, vec!["Bagnell".to_string()]);
    assert!(run.layout.rows.iter().all(|row| row.source_id != "Bagnell"));
}

#[test]
fn passthrough_fields_survive_to_the_layout() {
    let batches = vec![
        SourceBatch::new(
            "A",
            vec![record(json!({
                "title": "Grasp planning under uncertainty",
                "pub_year": "2018",
                "venue": "ICRA"
            }))],
        ),
        SourceBatch::new(
            "B",
            vec![record(json!({ "title": "Tactile sensing skins", "pub_year": "2021" }))],
        ),
    ];
    let layout = pipeline(42).run(batches).unwrap();
    assert_eq!(layout.rows[0].fields.get("venue"), Some(&json!("ICRA")));
    assert_eq!(layout.rows[1].fields.get("pub_year"), Some(&json!("2021")));
}

#[test]
fn layout_survives_a_directory_round_trip() {
    let dir = TempDir::new().unwrap();
    for batch in robotics_sources() {
        source::write_source(dir.path(), &batch).unwrap();
    }

    let batches = source::load_directory(dir.path()).unwrap();
    assert_eq!(batches.len(), 3);
    let layout = pipeline(42).run(batches).unwrap();

    let path = dir.path().join("atlas.out");
    layout.write_json(&path).unwrap();
    let restored = Layout::read_json(&path).unwrap();

    assert_eq!(restored.len(), layout.len());
    assert_eq!(restored.legend, layout.legend);
    for (a, b) in layout.rows.iter().zip(&restored.rows) {
        assert_eq!(a.title, b.title);
        assert_eq!(a.source_id, b.source_id);
        assert_eq!(a.color, b.color);
        assert!((a.x - b.x).abs() < 1e-9);
        assert!((a.y - b.y).abs() < 1e-9);
    }
    assert_eq!(
        restored.provenance.as_ref().map(|p| &p.embedding_fingerprint),
        layout.provenance.as_ref().map(|p| &p.embedding_fingerprint)
    );
}
