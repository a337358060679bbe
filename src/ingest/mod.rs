//! Budgeted ingestion of a remote repository
//!
//! The pipeline resolves a repository, lists its tree, plans which blobs to
//! download, downloads them in paced batches and aggregates the outcome.

pub mod error;
pub mod pipeline;
pub mod planner;
pub mod progress;
pub mod result;
pub mod retriever;
pub mod types;

pub use error::IngestError;
pub use pipeline::{IngestionConfig, RepositoryIngester};
pub use planner::{plan, PathFilter, Plan, PlanStats};
pub use progress::{CancellationFlag, Progress, ProgressCallback};
pub use result::{aggregate, format_bytes, summarize};
pub use retriever::{ContentRetriever, RetrievalOutcome};
pub use types::{IngestionResult, RetrievedFile, Truncation};
