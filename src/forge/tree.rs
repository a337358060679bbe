//! Recursive tree listing for a resolved reference

use tracing::{info, instrument, warn};

use crate::forge::client::{ApiError, ForgeApi};
use crate::forge::resolver::ResolvedRepository;
use crate::forge::types::TreeListing;
use crate::ingest::error::IngestError;

/// Fetch the full recursive listing of a reference.
///
/// A listing with zero entries is reported as `RepositoryEmpty`, never as an
/// empty success. The forge's own truncation flag is passed through untouched.
#[instrument(skip(api, resolved), fields(repository = %resolved.repository, reference = %resolved.reference))]
pub async fn fetch_tree<A: ForgeApi + ?Sized>(
    api: &A,
    resolved: &ResolvedRepository,
) -> Result<TreeListing, IngestError> {
    let repository = resolved.repository.to_string();
    let reference = resolved.reference.clone();

    let listing = api
        .tree(&resolved.repository, &resolved.reference, resolved.auth)
        .await
        .map_err(|error| match error {
            ApiError::NotFound => IngestError::ReferenceNotFound {
                repository: repository.clone(),
                reference: reference.clone(),
            },
            ApiError::Status(409) => IngestError::RepositoryEmpty {
                repository: repository.clone(),
                reference: reference.clone(),
            },
            other => IngestError::from_api(&repository, other),
        })?;

    if listing.entries.is_empty() {
        return Err(IngestError::RepositoryEmpty {
            repository,
            reference,
        });
    }

    if listing.truncated {
        warn!(
            "Forge truncated the tree listing of {}@{} at {} entries",
            repository,
            reference,
            listing.entries.len()
        );
    }
    info!("Fetched {} tree entries", listing.entries.len());

    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::client::AuthMode;
    use crate::forge::types::{RepositoryId, RepositoryMetadata, TreeEntry};
    use async_trait::async_trait;

    struct TreeForge(Result<TreeListing, ApiError>);

    #[async_trait]
    impl ForgeApi for TreeForge {
        async fn repository(&self, _: &RepositoryId, _: AuthMode) -> Result<RepositoryMetadata, ApiError> {
            unreachable!()
        }

        async fn tree(&self, _: &RepositoryId, _: &str, _: AuthMode) -> Result<TreeListing, ApiError> {
            self.0.clone()
        }

        async fn blob(&self, _: &RepositoryId, _: &str, _: AuthMode) -> Result<Vec<u8>, ApiError> {
            unreachable!()
        }

        fn has_credential(&self) -> bool {
            false
        }
    }

    fn resolved() -> ResolvedRepository {
        ResolvedRepository {
            repository: RepositoryId::new("acme", "widgets"),
            reference: "main".to_string(),
            is_public: true,
            auth: AuthMode::Anonymous,
        }
    }

    #[tokio::test]
    async fn test_truncation_flag_is_propagated() {
        let listing = TreeListing {
            entries: vec![TreeEntry::blob("src/lib.rs", Some(10), "b1")],
            truncated: true,
        };
        let fetched = fetch_tree(&TreeForge(Ok(listing)), &resolved()).await.unwrap();
        assert!(fetched.truncated);
        assert_eq!(fetched.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let error = fetch_tree(&TreeForge(Err(ApiError::NotFound)), &resolved())
            .await
            .unwrap_err();
        assert!(matches!(error, IngestError::ReferenceNotFound { ref reference, .. } if reference == "main"));

        let error = fetch_tree(&TreeForge(Err(ApiError::Status(409))), &resolved())
            .await
            .unwrap_err();
        assert!(matches!(error, IngestError::RepositoryEmpty { .. }));

        let error = fetch_tree(&TreeForge(Err(ApiError::Status(500))), &resolved())
            .await
            .unwrap_err();
        assert!(matches!(error, IngestError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_zero_entries_is_empty_repository() {
        let error = fetch_tree(&TreeForge(Ok(TreeListing::default())), &resolved())
            .await
            .unwrap_err();
        assert!(matches!(error, IngestError::RepositoryEmpty { .. }));
    }
}
