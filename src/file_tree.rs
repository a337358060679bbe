//! Hierarchical view of retrieved files for selection
//!
//! Directories are never listed explicitly; they are materialized from the
//! file paths. Every level is ordered directories first, then by name.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::ingest::types::RetrievedFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTreeNode {
    pub name: String,
    /// Full path from the repository root
    pub path: String,
    pub kind: NodeKind,
    /// Always empty for files
    pub children: Vec<FileTreeNode>,
    /// File size, or the sum of descendant file sizes for directories
    pub size: u64,
    pub language: Option<String>,
    /// File has a known language, or directory contains such a file
    pub is_supported: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeBuildError {
    #[error("file path '{path}' has no name segments")]
    EmptyPath { path: String },

    #[error("file path '{path}' appears more than once")]
    DuplicatePath { path: String },

    #[error("'{path}' is used both as a file and as a directory")]
    PathConflict { path: String },
}

impl FileTreeNode {
    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Number of file nodes at or below this node
    pub fn file_count(&self) -> usize {
        match self.kind {
            NodeKind::File => 1,
            NodeKind::Directory => self.children.iter().map(FileTreeNode::file_count).sum(),
        }
    }

    /// Find a descendant (or this node) by full path
    pub fn find(&self, path: &str) -> Option<&FileTreeNode> {
        let path = path.trim_matches('/');
        if self.path == path {
            return Some(self);
        }
        let prefix = format!("{}/", self.path);
        if !path.starts_with(&prefix) {
            return None;
        }
        self.children.iter().find_map(|child| child.find(path))
    }

    fn collect_file_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self.kind {
            NodeKind::File => out.push(&self.path),
            NodeKind::Directory => {
                for child in &self.children {
                    child.collect_file_paths(out);
                }
            }
        }
    }

    /// File paths below this node in display order
    pub fn file_paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_file_paths(&mut out);
        out
    }
}

/// Intermediate directory with per-level indexes keyed by segment name
#[derive(Default)]
struct DirBuilder<'a> {
    dirs: BTreeMap<&'a str, DirBuilder<'a>>,
    files: BTreeMap<&'a str, &'a RetrievedFile>,
}

impl<'a> DirBuilder<'a> {
    fn insert(&mut self, file: &'a RetrievedFile) -> Result<(), TreeBuildError> {
        let segments: Vec<&str> = file.path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((name, parents)) = segments.split_last() else {
            return Err(TreeBuildError::EmptyPath {
                path: file.path.clone(),
            });
        };

        let mut current = self;
        for (depth, segment) in parents.iter().enumerate() {
            if current.files.contains_key(segment) {
                return Err(TreeBuildError::PathConflict {
                    path: segments[..=depth].join("/"),
                });
            }
            current = current.dirs.entry(segment).or_default();
        }

        if current.dirs.contains_key(name) {
            return Err(TreeBuildError::PathConflict {
                path: segments.join("/"),
            });
        }
        if current.files.insert(name, file).is_some() {
            return Err(TreeBuildError::DuplicatePath {
                path: segments.join("/"),
            });
        }
        Ok(())
    }

    fn into_nodes(self, prefix: &str) -> Vec<FileTreeNode> {
        let join = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", prefix, name)
            }
        };

        let mut nodes = Vec::with_capacity(self.dirs.len() + self.files.len());

        for (name, dir) in self.dirs {
            let path = join(name);
            let children = dir.into_nodes(&path);
            nodes.push(FileTreeNode {
                name: name.to_string(),
                size: children.iter().map(|c| c.size).sum(),
                is_supported: children.iter().any(|c| c.is_supported),
                path,
                kind: NodeKind::Directory,
                children,
                language: None,
            });
        }

        for (name, file) in self.files {
            nodes.push(FileTreeNode {
                name: name.to_string(),
                path: join(name),
                kind: NodeKind::File,
                children: Vec::new(),
                size: file.size,
                language: file.language.clone(),
                is_supported: file.language.is_some(),
            });
        }

        nodes
    }
}

/// Build the sorted forest of top-level nodes from retrieved files.
///
/// The result depends only on the set of paths, not on input order.
pub fn build_file_tree(files: &[RetrievedFile]) -> Result<Vec<FileTreeNode>, TreeBuildError> {
    let mut root = DirBuilder::default();
    for file in files {
        root.insert(file)?;
    }
    Ok(root.into_nodes(""))
}

/// Indented text rendering, one node per line
pub fn render_tree(nodes: &[FileTreeNode]) -> String {
    fn render(nodes: &[FileTreeNode], depth: usize, out: &mut String) {
        for node in nodes {
            out.push_str(&"  ".repeat(depth));
            out.push_str(&node.name);
            if node.is_directory() {
                out.push('/');
                out.push('\n');
                render(&node.children, depth + 1, out);
            } else {
                match &node.language {
                    Some(language) => out.push_str(&format!(" ({}, {} B)\n", language, node.size)),
                    None => out.push_str(&format!(" ({} B)\n", node.size)),
                }
            }
        }
    }

    let mut out = String::new();
    render(nodes, 0, &mut out);
    out
}

/// Files at or below any of the selected paths, in input order.
///
/// A selected path names either a file or a directory.
pub fn select_files<'a>(files: &'a [RetrievedFile], selection: &[String]) -> Vec<&'a RetrievedFile> {
    let selected: HashSet<&str> = selection
        .iter()
        .map(|path| path.trim_matches('/'))
        .filter(|path| !path.is_empty())
        .collect();

    files
        .iter()
        .filter(|file| {
            let path = file.path.trim_matches('/');
            if selected.contains(path) {
                return true;
            }
            // Walk every ancestor directory of the file
            path.match_indices('/')
                .any(|(idx, _)| selected.contains(&path[..idx]))
        })
        .collect()
}
