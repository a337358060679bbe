// forge-ingest CLI - Import source files from a remote repository under budgets
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;

// Macro for conditional printing based on quiet flag
macro_rules! qprintln {
    ($quiet:expr, $($arg:tt)*) => {
        if !$quiet {
            println!($($arg)*);
        }
    };
}

use forge_ingest::ingest::format_bytes;
use forge_ingest::{
    get_metrics, init_logging_with_level, render_tree, select_files, with_trace_id,
    CancellationFlag, Credential, ForgeClient, ForgeIngestConfig, IngestionConfig,
    ProgressCallback, RepositoryIngester,
};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "forge-ingest - Import source files from a GitHub-compatible forge",
    long_about = None,
    after_help = "EXAMPLES:
  forge-ingest ingest rust-lang/log
  forge-ingest ingest https://github.com/rust-lang/log/tree/master --tree
  forge-ingest ingest acme/private-repo --token $GITHUB_TOKEN --max-files 200
  forge-ingest resolve tokio-rs/tokio"
)]
struct Cli {
    /// Enable verbose logging (DEBUG level). Default is WARN level.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress progress and informational output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the supported source files of a repository
    Ingest {
        /// owner/name, repository URL or git@host:owner/name.git
        repo: String,

        /// Branch or tag (defaults to the repository's default branch)
        #[arg(long = "ref")]
        reference: Option<String>,

        /// Access token for private repositories and higher rate limits
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Maximum number of files to download
        #[arg(long)]
        max_files: Option<usize>,

        /// Skip files of this many KB or more
        #[arg(long)]
        max_file_kb: Option<u64>,

        /// Stop once this many MB have been downloaded
        #[arg(long)]
        max_total_mb: Option<u64>,

        /// Print the file tree of the imported files
        #[arg(long)]
        tree: bool,

        /// Print the contents of files at or below these paths
        #[arg(long)]
        select: Vec<String>,

        /// Print the full result as JSON
        #[arg(long, conflicts_with_all = ["tree", "select"])]
        json: bool,
    },

    /// Show the reference and visibility a repository resolves to
    Resolve {
        /// owner/name, repository URL or git@host:owner/name.git
        repo: String,

        /// Branch or tag (defaults to the repository's default branch)
        #[arg(long = "ref")]
        reference: Option<String>,

        /// Access token for private repositories
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
}

fn spinner(quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("Invalid progress template")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message("Initializing...");
    Ok(pb)
}

/// Convert a size given in `unit`-sized steps to bytes
fn scaled_bytes(value: u64, unit: u64, flag: &str) -> Result<u64> {
    match value.checked_mul(unit) {
        Some(bytes) => Ok(bytes),
        None => bail!("--{} {} is too large", flag, value),
    }
}

fn build_client(config: &ForgeIngestConfig, token: Option<String>) -> Result<Arc<ForgeClient>> {
    let credential = token.and_then(Credential::new);
    Ok(Arc::new(ForgeClient::new(&config.api, credential)?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _ = init_logging_with_level(cli.verbose, cli.quiet);

    let quiet = cli.quiet;
    let mut config = ForgeIngestConfig::load(cli.config.as_deref())?;

    with_trace_id("forge-ingest-cli", async move {
        match cli.command {
            Commands::Ingest {
                repo,
                reference,
                token,
                max_files,
                max_file_kb,
                max_total_mb,
                tree,
                select,
                json,
            } => {
                if let Some(max_files) = max_files {
                    config.budget.max_files = max_files;
                }
                if let Some(kb) = max_file_kb {
                    config.budget.max_file_bytes = scaled_bytes(kb, 1024, "max-file-kb")?;
                }
                if let Some(mb) = max_total_mb {
                    config.budget.max_total_bytes = scaled_bytes(mb, 1024 * 1024, "max-total-mb")?;
                }
                config.validate()?;

                let client = build_client(&config, token)?;

                let progress_bar = spinner(quiet || json)?;
                let pb = progress_bar.clone();
                let progress_callback: ProgressCallback = Box::new(move |message: &str| {
                    pb.set_message(message.to_string());
                    pb.tick();
                });

                // Ctrl-C stops the run before the next download batch
                let cancellation = CancellationFlag::new();
                let on_interrupt = cancellation.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        on_interrupt.cancel();
                    }
                });

                let ingester = RepositoryIngester::new(client, IngestionConfig::from(&config))
                    .with_progress(progress_callback)
                    .with_cancellation(cancellation);

                let outcome = if tree {
                    ingester
                        .ingest_with_tree(&repo, reference.as_deref())
                        .await
                        .map(|(result, nodes)| (result, Some(nodes)))
                } else {
                    ingester
                        .ingest(&repo, reference.as_deref())
                        .await
                        .map(|result| (result, None))
                };
                let (result, nodes) = match outcome {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        progress_bar.abandon_with_message(format!("❌ {}", e));
                        return Err(e.into());
                    }
                };
                progress_bar.finish_with_message("✅ Import complete");

                if json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    return Ok(());
                }

                qprintln!(quiet, "📦 {}", result.summary);
                qprintln!(
                    quiet,
                    "   Files: {}  Size: {}  Failed: {}  Skipped: {}",
                    result.file_count(),
                    format_bytes(result.total_bytes),
                    result.failed_count,
                    result.skipped_count
                );
                if result.truncated {
                    qprintln!(
                        quiet,
                        "⚠️  Truncated: {}",
                        result.truncation.reasons().join(", ")
                    );
                }

                if let Some(nodes) = nodes {
                    println!();
                    print!("{}", render_tree(&nodes));
                }

                if !select.is_empty() {
                    for file in select_files(&result.files, &select) {
                        println!("\n==> {} <==", file.path);
                        println!("{}", file.content);
                    }
                }
            }

            Commands::Resolve {
                repo,
                reference,
                token,
            } => {
                let client = build_client(&config, token)?;
                let ingester = RepositoryIngester::new(client, IngestionConfig::from(&config));
                let resolved = ingester.resolve(&repo, reference.as_deref()).await?;

                println!("Repository: {}", resolved.repository);
                println!("Reference:  {}", resolved.reference);
                println!(
                    "Visibility: {}",
                    if resolved.is_public { "public" } else { "private" }
                );
            }
        }

        tracing::debug!("metrics: {}", get_metrics());
        Ok::<(), anyhow::Error>(())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_bytes() {
        assert_eq!(scaled_bytes(4, 1024, "max-file-kb").unwrap(), 4096);
        assert_eq!(scaled_bytes(0, 1024 * 1024, "max-total-mb").unwrap(), 0);
    }

    #[test]
    fn test_scaled_bytes_overflow_is_an_error() {
        let error = scaled_bytes(u64::MAX, 1024, "max-file-kb").unwrap_err();
        assert!(error.to_string().contains("--max-file-kb"));
        assert!(scaled_bytes(u64::MAX / 1024, 1024 * 1024, "max-total-mb").is_err());
    }

    #[test]
    fn test_json_conflicts_with_tree() {
        let parsed = Cli::try_parse_from(["forge-ingest", "ingest", "acme/widgets", "--json", "--tree"]);
        assert!(parsed.is_err());
    }
}
