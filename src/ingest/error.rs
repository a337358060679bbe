//! Terminal failure categories for an ingestion run

use std::time::Duration;

use crate::file_tree::TreeBuildError;
use crate::forge::client::ApiError;

/// Classified, terminal ingestion failures.
///
/// Per-item fetch failures never surface here; the retriever counts them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("'{input}' is not a valid repository identifier (expected owner/name or a repository URL)")]
    InvalidIdentifier { input: String },

    #[error("rate limited by the forge API while accessing {repository}{}", retry_hint(.retry_after))]
    RateLimited {
        repository: String,
        retry_after: Option<Duration>,
    },

    #[error("{repository} requires authentication; provide a token with read access")]
    AuthenticationRequired { repository: String },

    #[error("access to {repository} was denied; check the token's permissions")]
    AccessDenied { repository: String },

    #[error("repository {repository} was not found")]
    RepositoryNotFound { repository: String },

    #[error("reference '{reference}' was not found in {repository}")]
    ReferenceNotFound {
        repository: String,
        reference: String,
    },

    #[error("{repository}@{reference} has no files")]
    RepositoryEmpty {
        repository: String,
        reference: String,
    },

    #[error("no supported source files found in {repository}@{reference} after filtering")]
    NoMatchingFiles {
        repository: String,
        reference: String,
    },

    #[error("request to the forge API for {repository} failed: {message}")]
    Transport { repository: String, message: String },

    #[error("ingestion of {repository} was cancelled")]
    Cancelled { repository: String },

    #[error("could not build file tree for {repository}: {source}")]
    TreeBuild {
        repository: String,
        #[source]
        source: TreeBuildError,
    },
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|after| format!(" (retry in {}s)", after.as_secs()))
        .unwrap_or_default()
}

impl IngestError {
    /// Map an API failure that has no stage-specific meaning
    pub fn from_api(repository: &str, error: ApiError) -> Self {
        let repository = repository.to_string();
        match error {
            ApiError::RateLimited { retry_after, .. } => IngestError::RateLimited {
                repository,
                retry_after,
            },
            ApiError::AuthRequired => IngestError::AuthenticationRequired { repository },
            ApiError::AccessDenied => IngestError::AccessDenied { repository },
            ApiError::NotFound => IngestError::RepositoryNotFound { repository },
            other => IngestError::Transport {
                repository,
                message: other.to_string(),
            },
        }
    }

    /// Short machine-friendly category name
    pub fn category(&self) -> &'static str {
        match self {
            IngestError::InvalidIdentifier { .. } => "invalid_identifier",
            IngestError::RateLimited { .. } => "rate_limited",
            IngestError::AuthenticationRequired { .. } => "authentication_required",
            IngestError::AccessDenied { .. } => "access_denied",
            IngestError::RepositoryNotFound { .. } => "repository_not_found",
            IngestError::ReferenceNotFound { .. } => "reference_not_found",
            IngestError::RepositoryEmpty { .. } => "repository_empty",
            IngestError::NoMatchingFiles { .. } => "no_matching_files",
            IngestError::Transport { .. } => "transport",
            IngestError::Cancelled { .. } => "cancelled",
            IngestError::TreeBuild { .. } => "tree_build",
        }
    }
}
