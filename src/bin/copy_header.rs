use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use drawing_api_perf_lib::app::error::AppError;

const DEFAULT_HEADER: &str = "/usr/include/FlexLexer.h";

/// Copies a system header into the build tree.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// destination file, or a directory to copy into
    #[arg(short, long)]
    output: PathBuf,

    #[arg(short, long, default_value = DEFAULT_HEADER)]
    source: PathBuf,
}

fn destination(source: &Path, output: &Path) -> PathBuf {
    match source.file_name() {
        Some(name) if output.is_dir() => output.join(name),
        _ => output.to_path_buf(),
    }
}

fn copy_header(source: &Path, output: &Path, trace_id: &str) -> Result<PathBuf, AppError> {
    if !source.is_file() {
        return Err(AppError::validation(
            format!("header not found: {}", source.display()),
            trace_id,
        ));
    }
    let target = destination(source, output);
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            AppError::io(format!("Failed to create {}: {err}", parent.display()), trace_id)
        })?;
    }
    let bytes = fs::copy(source, &target).map_err(|err| {
        AppError::io(
            format!("Failed to copy {} to {}: {err}", source.display(), target.display()),
            trace_id,
        )
    })?;
    info!(trace_id = %trace_id, source = %source.display(), target = %target.display(), bytes, "header copied");
    Ok(target)
}

fn main() -> ExitCode {
    let args = Args::parse();
    let trace_id = Uuid::new_v4().to_string();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .try_init();

    match copy_header(&args.source, &args.output, &trace_id) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!(trace_id = %trace_id, code = %err.code, error = %err.error, "copy failed");
            ExitCode::from(1)
        }
    }
}
