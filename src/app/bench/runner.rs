use std::path::Path;

use tracing::info;

use crate::app::bridge::channel::{BridgeCommand, DeviceBridge};
use crate::app::bridge::paths::{device_tmp_path, host_file_name, DEVICE_TMP_DIR};
use crate::app::device::prep::REMOUNT_ROOT;
use crate::app::error::AppError;

pub fn demo_commands(binary: &Path, api_name: &str, test_count: u32, test_time: u64) -> Vec<BridgeCommand> {
    let remote = device_tmp_path(&host_file_name(binary));
    vec![
        BridgeCommand::shell(REMOUNT_ROOT),
        BridgeCommand::shell("power-shell setmode 602"),
        BridgeCommand::shell("power-shell display -s 50"),
        BridgeCommand::send(binary, DEVICE_TMP_DIR),
        BridgeCommand::shell(format!("chmod +x {remote}")),
        BridgeCommand::shell(format!("{remote} {api_name} {test_count} {test_time}")),
    ]
}

pub fn ensure_demo_binary(binary: &Path, trace_id: &str) -> Result<(), AppError> {
    if binary.is_file() {
        return Ok(());
    }
    Err(AppError::validation(
        format!("benchmark binary not found: {}", binary.display()),
        trace_id,
    ))
}

/// Pushes the benchmark binary and runs it once; returns what the benchmark printed.
pub fn push_and_run(
    bridge: &dyn DeviceBridge,
    binary: &Path,
    api_name: &str,
    test_count: u32,
    test_time: u64,
    trace_id: &str,
) -> Result<String, AppError> {
    let mut last = String::new();
    for command in demo_commands(binary, api_name, test_count, test_time) {
        last = bridge.execute_capture(&command, trace_id)?;
    }
    info!(trace_id = %trace_id, api = %api_name, "benchmark finished");
    Ok(last)
}
