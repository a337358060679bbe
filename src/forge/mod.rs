//! Remote Git-forge access
//!
//! This module talks to a GitHub-compatible REST API: repository metadata,
//! recursive tree listings and blob contents.

pub mod client;
pub mod identifier;
pub mod resolver;
pub mod tree;
pub mod types;

pub use client::{ApiError, AuthMode, Credential, ForgeApi, ForgeClient};
pub use identifier::{parse_identifier, ParsedIdentifier};
pub use resolver::{resolve_repository, ResolvedRepository};
pub use tree::fetch_tree;
pub use types::{EntryKind, RepositoryId, RepositoryMetadata, TreeEntry, TreeListing};
