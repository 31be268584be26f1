//! One-file-per-source JSON persistence.
//!
//! A directory holds `<source_id>.json` files, each a JSON array of record
//! objects. Files are read in parallel and returned in case-folded file name
//! order, so callers always see the same order for the same directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use atomic_write_file::AtomicWriteFile;
use rayon::prelude::*;

use crate::types::{RawRecord, SourceBatch};
use crate::{AtlasError, Result};

const SOURCE_EXTENSION: &str = "json";

/// Read every `*.json` file in `dir` as one source.
pub fn load_directory(dir: impl AsRef<Path>) -> Result<Vec<SourceBatch>> {
    let dir = dir.as_ref();
    let mut paths = Vec::new();
    for entry in fs_err::read_dir(dir)? {
        let path = entry?.path();
        let is_source = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION));
        if is_source {
            paths.push(path);
        }
    }

    // Whole names, not stems: "a b.json" sorts before "a.json".
    paths.sort_by_cached_key(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
    });
    let batches = paths
        .par_iter()
        .map(load_source_file)
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(
        target = "pubatlas::source",
        dir = %dir.display(),
        sources = batches.len(),
        records = batches.iter().map(|b| b.records.len()).sum::<usize>(),
        "source directory loaded"
    );
    Ok(batches)
}

/// File name a source is stored under.
#[must_use]
pub fn file_name(source_id: &str) -> String {
    format!("{source_id}.{SOURCE_EXTENSION}")
}

/// Case-folded file name; the key [`SourceOrder::CaseInsensitive`] sorts by.
///
/// [`SourceOrder::CaseInsensitive`]: crate::SourceOrder::CaseInsensitive
pub(crate) fn order_key(source_id: &str) -> String {
    file_name(source_id).to_lowercase()
}

/// Read one source file; the source id is the file stem.
pub fn load_source_file(path: impl AsRef<Path>) -> Result<SourceBatch> {
    let path = path.as_ref();
    let source_id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| AtlasError::SourceFile {
            path: path.to_path_buf(),
            reason: "file name is not a valid source id".into(),
        })?
        .to_string();
    let bytes = fs_err::read(path)?;
    let records: Vec<RawRecord> =
        serde_json::from_slice(&bytes).map_err(|err| AtlasError::SourceFile {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    tracing::debug!(
        target = "pubatlas::source",
        source = %source_id,
        records = records.len(),
        "source file read"
    );
    Ok(SourceBatch { source_id, records })
}

/// Atomically write `batch` to `<dir>/<source_id>.json`.
pub fn write_source(dir: impl AsRef<Path>, batch: &SourceBatch) -> Result<PathBuf> {
    if batch.source_id.is_empty()
        || batch
            .source_id
            .contains(|c: char| std::path::is_separator(c) || c == '\0')
    {
        return Err(AtlasError::InvalidOptions {
            reason: format!("`{}` cannot be used as a file name", batch.source_id),
        });
    }
    let path = dir.as_ref().join(file_name(&batch.source_id));
    let mut file = AtomicWriteFile::options().open(&path)?;
    serde_json::to_writer_pretty(&mut file, &batch.records)?;
    file.write_all(b"\n")?;
    file.commit()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn round_trips_through_a_directory() {
        let dir = TempDir::new().unwrap();
        let record = match json!({"title": "Grasping with soft fingers", "pub_year": "2019"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        write_source(dir.path(), &SourceBatch::new("Majidi", vec![record.clone()])).unwrap();
        write_source(dir.path(), &SourceBatch::new("Beuth", Vec::new())).unwrap();
        fs_err::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let batches = load_directory(dir.path()).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].source_id, "Beuth");
        assert!(batches[0].records.is_empty());
        assert_eq!(batches[1].source_id, "Majidi");
        assert_eq!(batches[1].records, vec![record]);
    }

    #[test]
    fn sorts_whole_file_names_not_stems() {
        let dir = TempDir::new().unwrap();
        for id in ["a", "B", "a b"] {
            write_source(dir.path(), &SourceBatch::new(id, Vec::new())).unwrap();
        }
        let batches = load_directory(dir.path()).unwrap();
        let ids: Vec<&str> = batches.iter().map(|b| b.source_id.as_str()).collect();
        // ' ' < '.' so "a b.json" precedes "a.json".
        assert_eq!(ids, ["a b", "a", "B"]);
    }

    #[test]
    fn malformed_file_names_the_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Broken.json");
        fs_err::write(&path, "{ not json").unwrap();
        match load_directory(dir.path()) {
            Err(AtlasError::SourceFile { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected SourceFile error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unsafe_source_ids() {
        let dir = TempDir::new().unwrap();
        let batch = SourceBatch::new("../escape", Vec::new());
        assert!(write_source(dir.path(), &batch).is_err());
    }
}
