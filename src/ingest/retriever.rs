//! Batched blob download under a cumulative byte budget

use futures::future::join_all;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use crate::config::{IngestionBudget, RetrievalConfig};
use crate::forge::client::{ApiError, ForgeApi};
use crate::forge::resolver::ResolvedRepository;
use crate::forge::types::TreeEntry;
use crate::ingest::error::IngestError;
use crate::ingest::progress::{CancellationFlag, Progress};
use crate::ingest::types::RetrievedFile;
use crate::languages;

/// What the retriever committed
#[derive(Debug, Clone, Default)]
pub struct RetrievalOutcome {
    pub files: Vec<RetrievedFile>,
    pub failed_count: usize,
    /// Downloaded blobs at or above the per-file limit (size was unknown up front)
    pub skipped_count: usize,
    pub total_bytes: u64,
    pub byte_budget_exhausted: bool,
    pub batches_run: usize,
}

/// Downloads candidate blobs batch by batch.
///
/// Items inside a batch are fetched concurrently; their results are merged in
/// candidate order only after the whole batch has resolved, so counters are
/// only ever touched by the coordinating task.
pub struct ContentRetriever<'a, A: ForgeApi + ?Sized> {
    api: &'a A,
    resolved: &'a ResolvedRepository,
    budget: IngestionBudget,
    settings: &'a RetrievalConfig,
    progress: &'a Progress,
    cancellation: Option<&'a CancellationFlag>,
}

impl<'a, A: ForgeApi + ?Sized> ContentRetriever<'a, A> {
    pub fn new(
        api: &'a A,
        resolved: &'a ResolvedRepository,
        budget: IngestionBudget,
        settings: &'a RetrievalConfig,
        progress: &'a Progress,
    ) -> Self {
        Self {
            api,
            resolved,
            budget,
            settings,
            progress,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, flag: Option<&'a CancellationFlag>) -> Self {
        self.cancellation = flag;
        self
    }

    async fn fetch_with_retry(&self, entry: &TreeEntry) -> Result<Vec<u8>, ApiError> {
        self.settings
            .retry
            .run(
                &entry.path,
                |_attempt| {
                    self.api
                        .blob(&self.resolved.repository, &entry.content_ref, self.resolved.auth)
                },
                // The quota is shared by every request; retrying soon only burns it
                |error: &ApiError| error.is_transient() && !matches!(error, ApiError::RateLimited { .. }),
            )
            .await
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.is_some_and(|flag| flag.is_cancelled())
    }

    /// Download `candidates` in order.
    ///
    /// Stops before a batch once the committed total reaches the budget, and
    /// stops for good as soon as one item would push the total over it; the
    /// rest of that batch is discarded and no further batch starts. A rate
    /// limit on any item ends the run with `IngestError::RateLimited` once its
    /// batch has resolved.
    #[instrument(skip_all, fields(repository = %self.resolved.repository, candidates = candidates.len()))]
    pub async fn retrieve(&self, candidates: &[TreeEntry]) -> Result<RetrievalOutcome, IngestError> {
        let mut seen = HashSet::new();
        let unique: Vec<&TreeEntry> = candidates
            .iter()
            .filter(|entry| seen.insert(entry.path.as_str()))
            .collect();
        if unique.len() != candidates.len() {
            debug!("Dropped {} duplicate paths", candidates.len() - unique.len());
        }

        let total = unique.len();
        let batch_size = self.settings.batch_size.max(1);
        let mut outcome = RetrievalOutcome::default();
        let mut processed = 0;

        self.progress
            .report(&format!("Downloading files (0/{})...", total));

        for (batch_index, batch) in unique.chunks(batch_size).enumerate() {
            if self.is_cancelled() {
                info!("Ingestion cancelled before batch {}", batch_index + 1);
                return Err(IngestError::Cancelled {
                    repository: self.resolved.repository.to_string(),
                });
            }

            if outcome.total_bytes >= self.budget.max_total_bytes {
                info!(
                    "Byte budget of {} reached before batch {}",
                    self.budget.max_total_bytes,
                    batch_index + 1
                );
                outcome.byte_budget_exhausted = true;
                break;
            }

            if batch_index > 0 && !self.settings.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_batch_delay).await;
            }

            let results = join_all(batch.iter().map(|entry| self.fetch_with_retry(entry))).await;
            outcome.batches_run += 1;
            let mut rate_limited = None;

            for (entry, result) in batch.iter().zip(results) {
                let bytes = match result {
                    Ok(bytes) => bytes,
                    Err(ApiError::RateLimited { retry_after, .. }) => {
                        warn!("Rate limited while fetching {}", entry.path);
                        rate_limited = Some(retry_after);
                        continue;
                    }
                    Err(e) => {
                        warn!("Failed to fetch {}: {}", entry.path, e);
                        outcome.failed_count += 1;
                        continue;
                    }
                };

                let size = bytes.len() as u64;
                if size >= self.budget.max_file_bytes {
                    debug!("Skipping large file after download: {} ({} bytes)", entry.path, size);
                    outcome.skipped_count += 1;
                    continue;
                }

                if outcome.total_bytes + size > self.budget.max_total_bytes {
                    info!(
                        "Adding {} ({} bytes) would exceed the byte budget; stopping",
                        entry.path, size
                    );
                    outcome.byte_budget_exhausted = true;
                    break;
                }

                outcome.total_bytes += size;
                outcome.files.push(RetrievedFile {
                    path: entry.path.clone(),
                    content: String::from_utf8_lossy(&bytes).into_owned(),
                    language: languages::language_for_path(&entry.path).map(str::to_string),
                    size,
                });
            }

            if let Some(retry_after) = rate_limited {
                warn!(
                    "Rate limit reached after {} files; stopping before batch {}",
                    outcome.files.len(),
                    batch_index + 2
                );
                return Err(IngestError::RateLimited {
                    repository: self.resolved.repository.to_string(),
                    retry_after,
                });
            }

            processed += batch.len();
            if outcome.byte_budget_exhausted {
                break;
            }
            self.progress
                .report(&format!("Downloading files ({}/{})...", processed, total));
        }

        info!(
            "Retrieved {} files ({} bytes), {} failed, {} skipped, budget exhausted: {}",
            outcome.files.len(),
            outcome.total_bytes,
            outcome.failed_count,
            outcome.skipped_count,
            outcome.byte_budget_exhausted
        );

        Ok(outcome)
    }
}
