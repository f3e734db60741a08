//! Report provenance: when it was produced and from which dataset bytes

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::types::{AnalysisReport, ReportMeta};

/// SHA-256 of the dataset file, lowercase hex
pub fn dataset_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Stamp `result` with provenance for the dataset it was computed from
pub fn stamp<T: Serialize>(
    result: T,
    dataset: &[u8],
    conversations: usize,
    failed_records: usize,
) -> AnalysisReport<T> {
    AnalysisReport {
        meta: ReportMeta {
            generated_at: Utc::now(),
            dataset_digest: dataset_digest(dataset),
            conversations,
            failed_records,
        },
        result,
    }
}

// =============================================================================
// TESTS
// =============================================================================
