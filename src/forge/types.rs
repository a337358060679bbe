//! Forge-specific types and data structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// `owner/name` pair identifying a repository on the forge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryId {
    pub owner: String,
    pub name: String,
}

impl RepositoryId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Repository metadata as returned by `GET /repos/{owner}/{name}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    /// Full `owner/name` as reported by the forge
    #[serde(default)]
    pub full_name: Option<String>,
    /// Default branch name
    pub default_branch: String,
    /// Whether the repository is private
    #[serde(default)]
    pub private: bool,
}

/// Kind of an entry in a recursive tree listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    /// Submodule pointers
    Commit,
}

/// A single entry of the recursive tree listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Path relative to the repository root
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Blob size in bytes, absent for trees
    #[serde(default)]
    pub size: Option<u64>,
    /// Opaque handle used to download the blob contents
    #[serde(rename = "sha")]
    pub content_ref: String,
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>, size: Option<u64>, content_ref: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Blob,
            size,
            content_ref: content_ref.into(),
        }
    }

    pub fn tree(path: impl Into<String>, content_ref: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Tree,
            size: None,
            content_ref: content_ref.into(),
        }
    }
}

/// Recursive tree listing for a reference
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeListing {
    #[serde(rename = "tree", default)]
    pub entries: Vec<TreeEntry>,
    /// Set by the forge when the listing exceeded its own size ceiling
    #[serde(default)]
    pub truncated: bool,
}

/// Raw blob payload as returned by `GET /repos/{owner}/{name}/git/blobs/{sha}`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BlobPayload {
    pub content: String,
    #[serde(default)]
    pub encoding: Option<String>,
}
