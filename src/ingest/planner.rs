//! Filtering of the raw listing down to a bounded candidate set

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::config::{FilterConfig, IngestionBudget};
use crate::forge::types::{EntryKind, TreeEntry, TreeListing};
use crate::ingest::types::Truncation;
use crate::languages;

/// Paths never worth downloading: VCS metadata, dependency and build output,
/// lockfiles, secrets, logs, caches and minified bundles
const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    r"(^|/)\.(git|svn|hg)/",
    r"(^|/)node_modules/",
    r"(^|/)(vendor|bower_components|\.venv|venv|site-packages)/",
    r"(^|/)(target|dist|build|out|bin|obj|\.next|\.nuxt|coverage)/",
    r"(^|/)(__pycache__|\.cache|\.pytest_cache|\.mypy_cache|\.gradle|\.idea|\.vscode)/",
    r"(^|/)(package-lock\.json|npm-shrinkwrap\.json|yarn\.lock|pnpm-lock\.yaml|Cargo\.lock|Gemfile\.lock|poetry\.lock|composer\.lock|go\.sum)$",
    r"\.lock$",
    r"(^|/)\.env(\.[^/]*)?$",
    r"\.(log|tmp|swp|bak)$",
    r"\.min\.(js|css)$",
    r"\.map$",
];

static DEFAULT_IGNORES: Lazy<Vec<Regex>> = Lazy::new(|| {
    DEFAULT_IGNORE_PATTERNS
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
});

/// Compiled filter rules
#[derive(Debug, Clone)]
pub struct PathFilter {
    extra_ignores: Vec<Regex>,
    extra_extensions: Vec<String>,
}

impl PathFilter {
    /// Built-in rules plus the configured extras.
    ///
    /// Invalid extra patterns are rejected by config validation; any that slip
    /// through are ignored here.
    pub fn new(config: &FilterConfig) -> Self {
        let extra_ignores = config
            .extra_ignore_patterns
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect();
        Self {
            extra_ignores,
            extra_extensions: config.extra_extensions.clone(),
        }
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        DEFAULT_IGNORES
            .iter()
            .chain(self.extra_ignores.iter())
            .any(|re| re.is_match(path))
    }

    pub fn is_supported(&self, path: &str) -> bool {
        languages::is_supported_path(path, &self.extra_extensions)
    }
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

/// How many entries each step removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanStats {
    pub listed: usize,
    pub directories: usize,
    pub ignored: usize,
    pub unsupported: usize,
    pub oversized: usize,
    pub over_limit: usize,
}

/// Candidates for download, in listing order
#[derive(Debug, Clone)]
pub struct Plan {
    pub candidates: Vec<TreeEntry>,
    pub truncation: Truncation,
    pub stats: PlanStats,
}

/// Reduce a listing to the candidate set.
///
/// Steps run in a fixed order: drop non-blobs, drop ignored paths, drop
/// unsupported extensions, drop entries at or above the per-file cap, then
/// keep the first `max_files`. An empty plan is valid here; the caller
/// decides whether that is an error.
pub fn plan(listing: &TreeListing, budget: &IngestionBudget, filter: &PathFilter) -> Plan {
    let mut stats = PlanStats {
        listed: listing.entries.len(),
        ..Default::default()
    };

    let mut candidates: Vec<TreeEntry> = Vec::new();
    for entry in &listing.entries {
        if entry.kind != EntryKind::Blob {
            stats.directories += 1;
            continue;
        }
        if filter.is_ignored(&entry.path) {
            stats.ignored += 1;
            continue;
        }
        if !filter.is_supported(&entry.path) {
            stats.unsupported += 1;
            continue;
        }
        if entry.size.is_some_and(|size| size >= budget.max_file_bytes) {
            debug!("Skipping large file: {} ({:?} bytes)", entry.path, entry.size);
            stats.oversized += 1;
            continue;
        }
        candidates.push(entry.clone());
    }

    let file_limit = candidates.len() > budget.max_files;
    if file_limit {
        stats.over_limit = candidates.len() - budget.max_files;
        candidates.truncate(budget.max_files);
    }

    info!(
        "Planned {} of {} entries ({} dirs, {} ignored, {} unsupported, {} oversized, {} over limit)",
        candidates.len(),
        stats.listed,
        stats.directories,
        stats.ignored,
        stats.unsupported,
        stats.oversized,
        stats.over_limit
    );

    Plan {
        candidates,
        truncation: Truncation {
            remote_listing: listing.truncated,
            file_limit,
            byte_budget: false,
        },
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(entries: Vec<TreeEntry>) -> TreeListing {
        TreeListing {
            entries,
            truncated: false,
        }
    }

    fn paths(plan: &Plan) -> Vec<&str> {
        plan.candidates.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn test_default_ignores() {
        let filter = PathFilter::default();
        for path in [
            ".git/config",
            "web/node_modules/react/index.js",
            "target/debug/build.rs",
            "Cargo.lock",
            "frontend/yarn.lock",
            ".env",
            ".env.production",
            "logs/server.log",
            "static/app.min.js",
            "pkg/__pycache__/mod.py",
        ] {
            assert!(filter.is_ignored(path), "{} should be ignored", path);
        }
        for path in ["src/main.rs", "src/builder/mod.rs", "environment.ts", "docs/build.md"] {
            assert!(!filter.is_ignored(path), "{} should be kept", path);
        }
    }

    #[test]
    fn test_pipeline_order_and_stats() {
        let budget = IngestionBudget {
            max_files: 10,
            max_file_bytes: 100,
            max_total_bytes: 1000,
        };
        let plan = plan(
            &listing(vec![
                TreeEntry::tree("src", "t1"),
                TreeEntry::blob("src/main.rs", Some(10), "b1"),
                TreeEntry::blob("node_modules/x/index.js", Some(10), "b2"),
                TreeEntry::blob("logo.png", Some(10), "b3"),
                TreeEntry::blob("src/huge.rs", Some(100), "b4"),
                TreeEntry::blob("src/unknown_size.rs", None, "b5"),
            ]),
            &budget,
            &PathFilter::default(),
        );

        assert_eq!(paths(&plan), vec!["src/main.rs", "src/unknown_size.rs"]);
        assert_eq!(
            plan.stats,
            PlanStats {
                listed: 6,
                directories: 1,
                ignored: 1,
                unsupported: 1,
                oversized: 1,
                over_limit: 0,
            }
        );
        assert!(!plan.truncation.any());
    }

    #[test]
    fn test_file_limit_truncates_and_flags() {
        let budget = IngestionBudget {
            max_files: 2,
            ..Default::default()
        };
        let entries = (0..5)
            .map(|i| TreeEntry::blob(format!("f{}.rs", i), Some(1), format!("b{}", i)))
            .collect();
        let plan = plan(&listing(entries), &budget, &PathFilter::default());
        assert_eq!(paths(&plan), vec!["f0.rs", "f1.rs"]);
        assert!(plan.truncation.file_limit);
        assert_eq!(plan.stats.over_limit, 3);
    }

    #[test]
    fn test_exact_limit_is_not_truncation() {
        let budget = IngestionBudget {
            max_files: 2,
            ..Default::default()
        };
        let entries = vec![
            TreeEntry::blob("a.rs", Some(1), "b1"),
            TreeEntry::blob("b.rs", Some(1), "b2"),
        ];
        let plan = plan(&listing(entries), &budget, &PathFilter::default());
        assert!(!plan.truncation.file_limit);
    }

    #[test]
    fn test_remote_truncation_carried() {
        let mut raw = listing(vec![TreeEntry::blob("a.rs", Some(1), "b1")]);
        raw.truncated = true;
        let plan = plan(&raw, &IngestionBudget::default(), &PathFilter::default());
        assert!(plan.truncation.remote_listing);
        assert!(plan.truncation.any());
    }

    #[test]
    fn test_only_locks_and_images_yields_empty_plan() {
        let plan = plan(
            &listing(vec![
                TreeEntry::blob("Cargo.lock", Some(10), "b1"),
                TreeEntry::blob("deps.lock", Some(10), "b2"),
                TreeEntry::blob("img/logo.png", Some(10), "b3"),
            ]),
            &IngestionBudget::default(),
            &PathFilter::default(),
        );
        assert!(plan.candidates.is_empty());
    }

    #[test]
    fn test_extra_rules_from_config() {
        let filter = PathFilter::new(&FilterConfig {
            extra_ignore_patterns: vec![r"^generated/".to_string()],
            extra_extensions: vec!["avsc".to_string()],
        });
        assert!(filter.is_ignored("generated/api.rs"));
        assert!(filter.is_supported("schemas/user.avsc"));
    }
}
