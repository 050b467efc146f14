use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::error::AppError;

pub fn log_file_path(log_dir: &Path) -> PathBuf {
    let file_name = format!("{}.log", Local::now().format("%Y%m%d_%H%M%S"));
    log_dir.join(file_name)
}

/// Installs the console and per-session file subscribers. Returns the file path.
pub fn init_logging(log_dir: &Path, trace_id: &str) -> Result<PathBuf, AppError> {
    fs::create_dir_all(log_dir).map_err(|err| {
        AppError::io(format!("Failed to create log dir {}: {err}", log_dir.display()), trace_id)
    })?;
    let path = log_file_path(log_dir);
    let file = File::options()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| {
            AppError::io(format!("Failed to open log file {}: {err}", path.display()), trace_id)
        })?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console = fmt::layer().with_target(false);
    let (text_file, json_file) = if cfg!(debug_assertions) {
        let layer = fmt::layer()
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .with_writer(Mutex::new(file));
        (Some(layer), None)
    } else {
        let layer = fmt::layer()
            .json()
            .with_target(false)
            .with_writer(Mutex::new(file));
        (None, Some(layer))
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(text_file)
        .with(json_file)
        .try_init();

    Ok(path)
}
