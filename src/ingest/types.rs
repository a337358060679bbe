//! Ingestion result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A successfully downloaded blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedFile {
    /// Path relative to the repository root
    pub path: String,
    /// Decoded text content (invalid UTF-8 is replaced)
    pub content: String,
    pub language: Option<String>,
    /// Size in bytes of the downloaded blob
    pub size: u64,
}

/// Why a run did not ingest every eligible file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truncation {
    /// The forge capped its own recursive listing
    pub remote_listing: bool,
    /// More candidates than `max_files`
    pub file_limit: bool,
    /// `max_total_bytes` reached before all candidates were fetched
    pub byte_budget: bool,
}

impl Truncation {
    pub fn any(&self) -> bool {
        self.remote_listing || self.file_limit || self.byte_budget
    }

    pub fn merge(self, other: Truncation) -> Truncation {
        Truncation {
            remote_listing: self.remote_listing || other.remote_listing,
            file_limit: self.file_limit || other.file_limit,
            byte_budget: self.byte_budget || other.byte_budget,
        }
    }

    /// Human-readable reasons, in a fixed order
    pub fn reasons(&self) -> Vec<&'static str> {
        let mut reasons = Vec::new();
        if self.remote_listing {
            reasons.push("forge listing truncated");
        }
        if self.file_limit {
            reasons.push("file count limit");
        }
        if self.byte_budget {
            reasons.push("total size limit");
        }
        reasons
    }
}

/// Final product of an ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionResult {
    /// `owner/name`
    pub repository: String,
    pub reference: String,
    /// Files in filtered-candidate order
    pub files: Vec<RetrievedFile>,
    /// Coarse flag: any of `truncation` is set
    pub truncated: bool,
    pub truncation: Truncation,
    /// Items that failed every retry attempt
    pub failed_count: usize,
    /// Items downloaded but skipped for exceeding the per-file limit
    pub skipped_count: usize,
    pub total_bytes: u64,
    pub summary: String,
    pub completed_at: DateTime<Utc>,
}

impl IngestionResult {
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}
