// forge-ingest - Budgeted ingestion of remote Git-forge repositories
// Root library module

pub mod config;
pub mod file_tree;
pub mod forge;
pub mod ingest;
pub mod languages;
pub mod observability;
pub mod retry;

// Re-export observability
pub use observability::{get_metrics, init_logging, init_logging_with_level, with_trace_id};

// Re-export configuration
pub use config::{ApiConfig, FilterConfig, ForgeIngestConfig, IngestionBudget, RetrievalConfig};

// Re-export forge access
pub use forge::{
    parse_identifier, resolve_repository, ApiError, AuthMode, Credential, ForgeApi, ForgeClient,
    RepositoryId, ResolvedRepository, TreeEntry, TreeListing,
};

// Re-export the ingestion pipeline
pub use ingest::{
    CancellationFlag, IngestError, IngestionConfig, IngestionResult, ProgressCallback,
    RepositoryIngester, RetrievedFile, Truncation,
};

// Re-export tree building
pub use file_tree::{build_file_tree, render_tree, select_files, FileTreeNode, NodeKind, TreeBuildError};

pub use retry::RetryPolicy;
