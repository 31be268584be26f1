//! Records, per-source input batches, and the normalized corpus.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One record exactly as a source collaborator delivered it.
pub type RawRecord = Map<String, Value>;

/// All raw records delivered for a single source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceBatch {
    pub source_id: String,
    #[serde(default)]
    pub records: Vec<RawRecord>,
}

impl SourceBatch {
    #[must_use]
    pub fn new(source_id: impl Into<String>, records: Vec<RawRecord>) -> Self {
        Self {
            source_id: source_id.into(),
            records,
        }
    }
}

/// How sources are ordered before their records are concatenated.
///
/// The resulting order also drives hue assignment, so it must be stable
/// run to run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrder {
    /// Keep the order the caller supplied.
    AsGiven,
    /// Stable sort by lowercased `<source_id>.json` file name, the order
    /// [`load_directory`](crate::source::load_directory) lists a directory in.
    #[default]
    CaseInsensitive,
}

/// A bibliographic entry with a usable title, tagged with its source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub title: String,
    pub source_id: String,
    /// Every other raw field, untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

/// Kept/dropped counts for one source.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct SourceTally {
    pub source_id: String,
    pub kept: usize,
    pub dropped: usize,
}

/// What normalization did to each source, in ingestion order.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct NormalizeReport {
    pub sources: Vec<SourceTally>,
    /// Sources cut by `max_sources`, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_sources: Vec<String>,
}

impl NormalizeReport {
    /// Records dropped for lacking a usable title.
    #[must_use]
    pub fn dropped_records(&self) -> usize {
        self.sources.iter().map(|tally| tally.dropped).sum()
    }

    #[must_use]
    pub fn kept_records(&self) -> usize {
        self.sources.iter().map(|tally| tally.kept).sum()
    }

    /// Sources that contributed no rows to the corpus.
    pub fn empty_sources(&self) -> impl Iterator<Item = &str> {
        self.sources
            .iter()
            .filter(|tally| tally.kept == 0)
            .map(|tally| tally.source_id.as_str())
    }
}

/// Ordered, normalized records across all sources.
///
/// Row order is source order, then the order records had within their source.
/// Every row has a non-empty title.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Corpus {
    records: Vec<Record>,
    sources: Vec<String>,
    report: NormalizeReport,
}

impl Corpus {
    pub(crate) fn from_parts(
        records: Vec<Record>,
        sources: Vec<String>,
        report: NormalizeReport,
    ) -> Self {
        Self {
            records,
            sources,
            report,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Distinct source ids with at least one row, in corpus order.
    #[must_use]
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    #[must_use]
    pub fn report(&self) -> &NormalizeReport {
        &self.report
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.title.as_str())
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}
