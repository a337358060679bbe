//! Resolution of the effective reference and visibility of a repository

use tracing::{debug, info, instrument};

use crate::forge::client::{AuthMode, ForgeApi};
use crate::forge::types::{RepositoryId, RepositoryMetadata};
use crate::ingest::error::IngestError;

/// Repository ready for tree fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRepository {
    pub repository: RepositoryId,
    /// Branch or tag to ingest
    pub reference: String,
    pub is_public: bool,
    /// Auth mode to use for every later request
    pub auth: AuthMode,
}

async fn fetch_metadata<A: ForgeApi + ?Sized>(
    api: &A,
    repo: &RepositoryId,
) -> Result<(RepositoryMetadata, AuthMode), IngestError> {
    // A configured credential is used for every request of the run
    let auth = if api.has_credential() {
        AuthMode::Credentialed
    } else {
        AuthMode::Anonymous
    };
    debug!("Fetching metadata for {} ({:?})", repo, auth);

    api.repository(repo, auth)
        .await
        .map(|metadata| (metadata, auth))
        .map_err(|error| IngestError::from_api(&repo.to_string(), error))
}

/// Determine the reference to ingest and how to authenticate.
///
/// Metadata is always fetched because visibility is needed even when a
/// reference is given. Without a credential, private repositories are rejected.
#[instrument(skip(api))]
pub async fn resolve_repository<A: ForgeApi + ?Sized>(
    api: &A,
    repo: &RepositoryId,
    explicit_reference: Option<&str>,
) -> Result<ResolvedRepository, IngestError> {
    let (metadata, auth) = fetch_metadata(api, repo).await?;

    if metadata.private && !api.has_credential() {
        return Err(IngestError::AuthenticationRequired {
            repository: repo.to_string(),
        });
    }

    let reference = explicit_reference
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| metadata.default_branch.clone());

    info!(
        "Resolved {} to reference '{}' ({})",
        repo,
        reference,
        if metadata.private { "private" } else { "public" }
    );

    Ok(ResolvedRepository {
        repository: repo.clone(),
        reference,
        is_public: !metadata.private,
        auth,
    })
}
