use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const LOG_ENV_VAR: &str = "POMO_LOG";
pub const LOG_FILENAME: &str = "pomo.log";

#[derive(Debug, Error)]
pub enum InitLoggingError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDir { path: String, source: io::Error },

    #[error("failed to install log subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

pub fn log_dir(pomo_dir: &Path) -> PathBuf {
    pomo_dir.join("logs")
}

/// Routes diagnostics to `<pomo dir>/logs/pomo.log`, never to the terminal the
/// UI or `print` owns. The guard must live until exit to flush the writer.
pub fn init_logging(pomo_dir: &Path) -> Result<WorkerGuard, InitLoggingError> {
    let dir = log_dir(pomo_dir);
    fs::create_dir_all(&dir).map_err(|source| InitLoggingError::CreateDir {
        path: dir.display().to_string(),
        source,
    })?;

    let env_filter = EnvFilter::builder()
        .with_env_var(LOG_ENV_VAR)
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let (writer, guard) = tracing_appender::non_blocking(rolling::never(&dir, LOG_FILENAME));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
