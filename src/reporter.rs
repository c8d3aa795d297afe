use crate::types::{IngestSummary, SnapshotSummary};

/// Emit an ingestion summary as a single JSON line to stdout.
pub fn report_ingest(summary: &IngestSummary) {
    if let Ok(json) = serde_json::to_string(summary) {
        println!("{json}");
    }
}

/// Emit a snapshot summary as a single JSON line to stdout.
pub fn report_snapshot(summary: &SnapshotSummary) {
    if let Ok(json) = serde_json::to_string(summary) {
        println!("{json}");
    }
}
