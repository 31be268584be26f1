//! Flattens per-source raw records into one ordered corpus.
//!
//! Records whose `title` is missing, not a string, or blank are dropped here so
//! the embedder never sees an empty string. Dropping is expected behaviour and
//! only shows up in the [`NormalizeReport`].

use std::collections::HashSet;

use serde_json::Value;

use crate::constants::TITLE_FIELD;
use crate::source;
use crate::types::{
    Corpus, NormalizeReport, RawRecord, Record, SourceBatch, SourceOrder, SourceTally,
};
use crate::{AtlasError, Result};

/// Order `batches`, then concatenate their usable records.
///
/// `max_sources` keeps only the first N sources after ordering.
pub fn normalize_sources(
    mut batches: Vec<SourceBatch>,
    order: SourceOrder,
    max_sources: Option<usize>,
) -> Result<Corpus> {
    let mut seen = HashSet::with_capacity(batches.len());
    for batch in &batches {
        if !seen.insert(batch.source_id.as_str()) {
            return Err(AtlasError::DuplicateSource {
                source_id: batch.source_id.clone(),
            });
        }
    }

    if order == SourceOrder::CaseInsensitive {
        batches.sort_by_cached_key(|batch| source::order_key(&batch.source_id));
    }

    let mut report = NormalizeReport::default();
    if let Some(limit) = max_sources {
        if batches.len() > limit {
            report.skipped_sources = batches
                .drain(limit..)
                .map(|batch| batch.source_id)
                .collect();
        }
    }

    let mut records = Vec::with_capacity(batches.iter().map(|b| b.records.len()).sum());
    let mut sources = Vec::new();
    for batch in batches {
        let SourceBatch {
            source_id,
            records: raw,
        } = batch;
        let mut tally = SourceTally {
            source_id: source_id.clone(),
            ..Default::default()
        };
        for (position, raw_record) in raw.into_iter().enumerate() {
            match normalize_record(raw_record, &source_id) {
                Some(record) => {
                    tally.kept += 1;
                    records.push(record);
                }
                None => {
                    tally.dropped += 1;
                    tracing::debug!(
                        target = "pubatlas::normalize",
                        source = %source_id,
                        position,
                        "dropping record without a usable title"
                    );
                }
            }
        }
        if tally.kept > 0 {
            sources.push(source_id);
        } else {
            tracing::debug!(
                target = "pubatlas::normalize",
                source = %tally.source_id,
                "source contributed no records"
            );
        }
        report.sources.push(tally);
    }

    tracing::info!(
        target = "pubatlas::normalize",
        records = records.len(),
        sources = sources.len(),
        dropped = report.dropped_records(),
        skipped_sources = report.skipped_sources.len(),
        "corpus normalized"
    );
    Ok(Corpus::from_parts(records, sources, report))
}

fn normalize_record(mut raw: RawRecord, source_id: &str) -> Option<Record> {
    let title = match raw.remove(TITLE_FIELD) {
        Some(Value::String(title)) if !title.trim().is_empty() => title,
        _ => return None,
    };
    Some(Record {
        title,
        source_id: source_id.to_string(),
        fields: raw,
    })
}
