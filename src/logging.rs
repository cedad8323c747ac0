use crate::errors::{AppError, AppResult};
use std::path::Path;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global JSON subscriber writing to a daily rolling file under `log_dir`.
/// `RUST_LOG` wins over `default_filter` when set.
pub fn init_tracing(log_dir: &Path, default_filter: &str) -> AppResult<()> {
    std::fs::create_dir_all(log_dir).map_err(|error| AppError::Io(error.to_string()))?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "feed.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| AppError::Internal(format!("tracing already initialized: {}", error)))?;

    let _ = LOG_GUARD.set(guard);
    Ok(())
}
