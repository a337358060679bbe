// Logging and trace context for forge-ingest
// Structured logging through tracing, with per-run trace ids and a small set
// of process-wide counters

use anyhow::Result;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

static OPERATION_COUNTER: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Filter directives for the CLI verbosity flags
pub fn default_filter(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "forge_ingest=debug,info"
    } else {
        // Warnings from this crate, errors only from dependencies
        "forge_ingest=warn,error"
    }
}

/// Initialize the logging and tracing infrastructure
pub fn init_logging() -> Result<()> {
    init_logging_with_level(false, false)
}

/// Initialize logging with configurable verbosity
pub fn init_logging_with_level(verbose: bool, quiet: bool) -> Result<()> {
    let filter_level = EnvFilter::new(default_filter(verbose, quiet));

    // --quiet always wins over RUST_LOG
    let env_filter = if quiet {
        EnvFilter::new("error")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env().unwrap_or(filter_level)
    } else {
        filter_level
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(!quiet)
        .with_thread_ids(!quiet)
        .with_line_number(!quiet)
        .with_file(!quiet)
        .with_writer(std::io::stderr)
        .with_ansi(true);

    match tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        Ok(()) => {
            if !quiet {
                debug!("forge-ingest logging initialized");
            }
            Ok(())
        }
        // Already initialized, which is fine in test environments
        Err(_) => Ok(()),
    }
}

/// Operation context for tracing through the system
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub trace_id: Uuid,
    pub span_id: Uuid,
    pub operation: String,
    pub start_time: Instant,
}

impl OperationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
            operation: operation.into(),
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Run a future under a fresh trace id, logging its start, duration and outcome
pub async fn with_trace_id<F, T, E>(operation: &str, f: F) -> std::result::Result<T, E>
where
    F: std::future::Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    let ctx = OperationContext::new(operation);

    info!(
        trace_id = %ctx.trace_id,
        span_id = %ctx.span_id,
        "Starting operation: {}", operation
    );

    let result = f.await;
    let elapsed = ctx.elapsed();

    match &result {
        Ok(_) => {
            OPERATION_COUNTER.fetch_add(1, Ordering::Relaxed);
            info!(
                trace_id = %ctx.trace_id,
                span_id = %ctx.span_id,
                elapsed_ms = elapsed.as_millis(),
                "Operation completed successfully: {}", operation
            );
        }
        Err(e) => {
            ERROR_COUNTER.fetch_add(1, Ordering::Relaxed);
            error!(
                trace_id = %ctx.trace_id,
                span_id = %ctx.span_id,
                elapsed_ms = elapsed.as_millis(),
                error = %e,
                "Operation failed: {}", operation
            );
        }
    }

    result
}

/// Get current metrics snapshot
pub fn get_metrics() -> serde_json::Value {
    serde_json::json!({
        "operations": {
            "total": OPERATION_COUNTER.load(Ordering::Relaxed),
            "errors": ERROR_COUNTER.load(Ordering::Relaxed),
        },
        "timestamp": Utc::now().to_rfc3339(),
    })
}
