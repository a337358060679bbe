//! Assembly of the final ingestion result

use chrono::Utc;

use crate::forge::resolver::ResolvedRepository;
use crate::ingest::retriever::RetrievalOutcome;
use crate::ingest::types::{IngestionResult, Truncation};

/// Format a byte count for summaries
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let value = bytes as f64;
    if value >= MB {
        format!("{:.1} MB", value / MB)
    } else if value >= KB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// One-line summary distinguishing a full import, an import with failures and
/// an import cut short by limits
pub fn summarize(
    repository: &str,
    reference: &str,
    file_count: usize,
    total_bytes: u64,
    failed_count: usize,
    truncation: &Truncation,
) -> String {
    let noun = if file_count == 1 { "file" } else { "files" };
    let mut summary = format!(
        "Imported {} {} from {}@{} ({})",
        file_count,
        noun,
        repository,
        reference,
        format_bytes(total_bytes)
    );

    if failed_count > 0 {
        summary.push_str(&format!("; {} failed", failed_count));
    }

    if truncation.any() {
        summary.push_str(&format!(
            "; truncated due to limits ({})",
            truncation.reasons().join(", ")
        ));
    }

    summary.push('.');
    summary
}

/// Combine planning truncation and retrieval outcome into the final result
pub fn aggregate(
    resolved: &ResolvedRepository,
    plan_truncation: Truncation,
    outcome: RetrievalOutcome,
) -> IngestionResult {
    let truncation = plan_truncation.merge(Truncation {
        byte_budget: outcome.byte_budget_exhausted,
        ..Default::default()
    });

    let repository = resolved.repository.to_string();
    let summary = summarize(
        &repository,
        &resolved.reference,
        outcome.files.len(),
        outcome.total_bytes,
        outcome.failed_count,
        &truncation,
    );

    IngestionResult {
        repository,
        reference: resolved.reference.clone(),
        files: outcome.files,
        truncated: truncation.any(),
        truncation,
        failed_count: outcome.failed_count,
        skipped_count: outcome.skipped_count,
        total_bytes: outcome.total_bytes,
        summary,
        completed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::client::AuthMode;
    use crate::forge::types::RepositoryId;
    use crate::ingest::types::RetrievedFile;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_summary_variants() {
        let clean = summarize("acme/widgets", "main", 12, 2048, 0, &Truncation::default());
        assert_eq!(clean, "Imported 12 files from acme/widgets@main (2.0 KB).");

        let failed = summarize("acme/widgets", "main", 8, 100, 2, &Truncation::default());
        assert!(failed.contains("2 failed"));
        assert!(!failed.contains("truncated"));

        let truncated = summarize(
            "acme/widgets",
            "main",
            1,
            10,
            0,
            &Truncation {
                file_limit: true,
                ..Default::default()
            },
        );
        assert!(truncated.starts_with("Imported 1 file from"));
        assert!(truncated.contains("truncated due to limits (file count limit)"));
    }

    #[test]
    fn test_aggregate_merges_truncation_sources() {
        let resolved = ResolvedRepository {
            repository: RepositoryId::new("acme", "widgets"),
            reference: "v2".to_string(),
            is_public: true,
            auth: AuthMode::Anonymous,
        };
        let outcome = RetrievalOutcome {
            files: vec![RetrievedFile {
                path: "a.rs".into(),
                content: "x".into(),
                language: Some("rust".into()),
                size: 1,
            }],
            failed_count: 1,
            skipped_count: 0,
            total_bytes: 1,
            byte_budget_exhausted: true,
            batches_run: 1,
        };
        let plan_truncation = Truncation {
            remote_listing: true,
            ..Default::default()
        };

        let result = aggregate(&resolved, plan_truncation, outcome);
        assert!(result.truncated);
        assert!(result.truncation.remote_listing);
        assert!(result.truncation.byte_budget);
        assert!(!result.truncation.file_limit);
        assert_eq!(result.reference, "v2");
        assert!(result.summary.contains("1 failed"));
        assert!(result.summary.contains("forge listing truncated, total size limit"));
    }
}
