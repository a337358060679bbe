//! End-to-end repository ingestion from a remote forge

use tracing::{info, instrument};

use crate::config::{FilterConfig, ForgeIngestConfig, IngestionBudget, RetrievalConfig};
use crate::file_tree::{build_file_tree, FileTreeNode};
use crate::forge::client::ForgeApi;
use crate::forge::identifier::parse_identifier;
use crate::forge::resolver::{resolve_repository, ResolvedRepository};
use crate::forge::tree::fetch_tree;
use crate::ingest::error::IngestError;
use crate::ingest::planner::{plan, PathFilter};
use crate::ingest::progress::{CancellationFlag, Progress, ProgressCallback};
use crate::ingest::result::aggregate;
use crate::ingest::retriever::ContentRetriever;
use crate::ingest::types::IngestionResult;

/// Configuration for repository ingestion
#[derive(Debug, Clone, Default)]
pub struct IngestionConfig {
    pub budget: IngestionBudget,
    pub retrieval: RetrievalConfig,
    pub filter: FilterConfig,
}

impl From<&ForgeIngestConfig> for IngestionConfig {
    fn from(config: &ForgeIngestConfig) -> Self {
        Self {
            budget: config.budget,
            retrieval: config.retrieval.clone(),
            filter: config.filter.clone(),
        }
    }
}

/// Ingests remote repositories through a forge API
pub struct RepositoryIngester<A: ForgeApi> {
    api: A,
    config: IngestionConfig,
    filter: PathFilter,
    progress: Progress,
    cancellation: Option<CancellationFlag>,
}

impl<A: ForgeApi> RepositoryIngester<A> {
    /// Create a new repository ingester
    pub fn new(api: A, config: IngestionConfig) -> Self {
        let filter = PathFilter::new(&config.filter);
        Self {
            api,
            config,
            filter,
            progress: Progress::default(),
            cancellation: None,
        }
    }

    /// Report status lines to `callback` while ingesting
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Progress::new(Some(callback));
        self
    }

    /// Stop before the next download batch once `flag` is set
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = Some(flag);
        self
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    /// Parse an identifier and resolve its reference and visibility.
    ///
    /// An explicit `reference` wins over one embedded in a URL.
    pub async fn resolve(
        &self,
        identifier: &str,
        reference: Option<&str>,
    ) -> Result<ResolvedRepository, IngestError> {
        let parsed = parse_identifier(identifier)?;
        let reference = reference.or(parsed.reference.as_deref());

        self.progress.report("Checking repository access...");
        resolve_repository(&self.api, &parsed.repository, reference).await
    }

    /// Ingest a repository at `reference`, or its default branch
    #[instrument(skip(self))]
    pub async fn ingest(
        &self,
        identifier: &str,
        reference: Option<&str>,
    ) -> Result<IngestionResult, IngestError> {
        let resolved = self.resolve(identifier, reference).await?;
        let repository = resolved.repository.to_string();

        self.progress.report("Fetching file tree...");
        let listing = fetch_tree(&self.api, &resolved).await?;

        self.progress
            .report(&format!("Filtering {} entries...", listing.entries.len()));
        let plan = plan(&listing, &self.config.budget, &self.filter);
        if plan.candidates.is_empty() {
            return Err(IngestError::NoMatchingFiles {
                repository,
                reference: resolved.reference,
            });
        }

        let outcome = ContentRetriever::new(
            &self.api,
            &resolved,
            self.config.budget,
            &self.config.retrieval,
            &self.progress,
        )
        .with_cancellation(self.cancellation.as_ref())
        .retrieve(&plan.candidates)
        .await?;

        let result = aggregate(&resolved, plan.truncation, outcome);
        info!("{}", result.summary);
        self.progress.report("Import complete");

        Ok(result)
    }

    /// Ingest and also build the file tree for selection
    pub async fn ingest_with_tree(
        &self,
        identifier: &str,
        reference: Option<&str>,
    ) -> Result<(IngestionResult, Vec<FileTreeNode>), IngestError> {
        let result = self.ingest(identifier, reference).await?;
        let tree = build_file_tree(&result.files).map_err(|source| IngestError::TreeBuild {
            repository: result.repository.clone(),
            source,
        })?;
        Ok((result, tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::client::{ApiError, AuthMode};
    use crate::forge::types::{RepositoryId, RepositoryMetadata, TreeEntry, TreeListing};
    use crate::retry::RetryPolicy;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct SmallForge {
        listing: TreeListing,
        tree_requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ForgeApi for SmallForge {
        async fn repository(&self, _: &RepositoryId, _: AuthMode) -> Result<RepositoryMetadata, ApiError> {
            Ok(RepositoryMetadata {
                full_name: Some("acme/widgets".into()),
                default_branch: "main".into(),
                private: false,
            })
        }

        async fn tree(&self, _: &RepositoryId, reference: &str, _: AuthMode) -> Result<TreeListing, ApiError> {
            self.tree_requests.lock().unwrap().push(reference.to_string());
            Ok(self.listing.clone())
        }

        async fn blob(&self, _: &RepositoryId, content_ref: &str, _: AuthMode) -> Result<Vec<u8>, ApiError> {
            Ok(format!("// {}", content_ref).into_bytes())
        }

        fn has_credential(&self) -> bool {
            false
        }
    }

    fn forge(entries: Vec<TreeEntry>) -> SmallForge {
        SmallForge {
            listing: TreeListing {
                entries,
                truncated: false,
            },
            tree_requests: Mutex::new(Vec::new()),
        }
    }

    fn config() -> IngestionConfig {
        IngestionConfig {
            retrieval: RetrievalConfig {
                batch_size: 2,
                inter_batch_delay: Duration::ZERO,
                retry: RetryPolicy::immediate(1),
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_progress_messages_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let ingester = RepositoryIngester::new(
            forge(vec![
                TreeEntry::blob("src/lib.rs", Some(10), "a"),
                TreeEntry::blob("src/main.rs", Some(10), "b"),
            ]),
            config(),
        )
        .with_progress(Box::new(move |message: &str| {
            sink.lock().unwrap().push(message.to_string());
        }));

        let result = ingester.ingest("acme/widgets", None).await.unwrap();
        assert_eq!(result.file_count(), 2);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first().map(String::as_str), Some("Checking repository access..."));
        assert_eq!(seen.last().map(String::as_str), Some("Import complete"));
        assert!(seen.iter().any(|m| m == "Fetching file tree..."));
        assert!(seen.iter().any(|m| m == "Filtering 2 entries..."));
        assert!(seen.iter().any(|m| m == "Downloading files (2/2)..."));
    }

    #[tokio::test]
    async fn test_reference_from_url_and_explicit_override() {
        let ingester = RepositoryIngester::new(forge(vec![TreeEntry::blob("a.rs", Some(1), "a")]), config());

        let result = ingester
            .ingest("https://github.com/acme/widgets/tree/release", None)
            .await
            .unwrap();
        assert_eq!(result.reference, "release");

        let result = ingester
            .ingest("https://github.com/acme/widgets/tree/release", Some("hotfix"))
            .await
            .unwrap();
        assert_eq!(result.reference, "hotfix");
    }

    #[tokio::test]
    async fn test_invalid_identifier_makes_no_requests() {
        let ingester = RepositoryIngester::new(forge(vec![]), config());
        let error = ingester.ingest("not a repo", None).await.unwrap_err();
        assert!(matches!(error, IngestError::InvalidIdentifier { .. }));
        assert!(ingester.api.tree_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tree_is_built_from_result() {
        let ingester = RepositoryIngester::new(
            forge(vec![
                TreeEntry::blob("src/lib.rs", Some(1), "a"),
                TreeEntry::blob("README.md", Some(1), "b"),
            ]),
            config(),
        );
        let (result, tree) = ingester.ingest_with_tree("acme/widgets", None).await.unwrap();
        assert_eq!(tree.iter().map(FileTreeNode::file_count).sum::<usize>(), result.file_count());
        assert_eq!(tree[0].name, "src");
    }
}
