use std::fs;
use std::path::PathBuf;
use std::thread;

use tracing::{info, warn};

use crate::app::bridge::channel::{BridgeCommand, DeviceBridge};
use crate::app::bridge::parse::pick_hilog_file;
use crate::app::bridge::paths::{api_report_dir, device_hilog_path, DEVICE_HILOG_DIR};
use crate::app::config::BenchConfig;
use crate::app::device::prep::{delete_hilog, REMOUNT_ROOT};
use crate::app::error::AppError;

/// Captures hilog for one run window and pulls it to `reports/{mode}/{api}/{log_name}.log`.
pub fn collect_hilog(
    bridge: &dyn DeviceBridge,
    config: &BenchConfig,
    api_name: &str,
    log_name: &str,
    trace_id: &str,
) -> Result<PathBuf, AppError> {
    let save_dir = api_report_dir(&config.work_dir, &config.mode, api_name);
    fs::create_dir_all(&save_dir).map_err(|err| {
        AppError::io(format!("Failed to create {}: {err}", save_dir.display()), trace_id)
    })?;

    bridge.execute_capture(&BridgeCommand::shell("hilog -r"), trace_id)?;
    bridge.execute_capture(&BridgeCommand::shell(REMOUNT_ROOT), trace_id)?;
    bridge.execute_capture(&BridgeCommand::shell("hilog -w stop"), trace_id)?;
    delete_hilog(bridge, trace_id)?;
    thread::sleep(config.pacing.log_clear());

    bridge.execute_capture(
        &BridgeCommand::shell(format!("hilog -w start -f {api_name} -m none")),
        trace_id,
    )?;
    thread::sleep(config.log_window());
    bridge.execute_capture(&BridgeCommand::shell("hilog -w stop"), trace_id)?;

    let listing = bridge.execute_capture(&BridgeCommand::shell(format!("ls {DEVICE_HILOG_DIR}")), trace_id)?;
    let Some(file_name) = pick_hilog_file(&listing, api_name) else {
        warn!(trace_id = %trace_id, api = %api_name, "no hilog file captured");
        delete_hilog(bridge, trace_id)?;
        return Err(AppError::log_missing(
            format!("no hilog file for {api_name} in {DEVICE_HILOG_DIR}"),
            trace_id,
        ));
    };
    info!(trace_id = %trace_id, api = %api_name, file = %file_name, "hilog file");

    let local = save_dir.join(format!("{log_name}.log"));
    bridge.execute_capture(&BridgeCommand::recv(&device_hilog_path(&file_name), &local), trace_id)?;
    delete_hilog(bridge, trace_id)?;
    Ok(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::bridge::fake::RecordingBridge;
    use crate::app::config::PacingSettings;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> BenchConfig {
        BenchConfig {
            work_dir: dir.path().to_path_buf(),
            log_time: 0,
            pacing: PacingSettings::immediate(),
            ..BenchConfig::default()
        }
    }

    #[test]
    fn pulls_newest_matching_file() {
        let dir = TempDir::new().expect("tmp");
        let bridge = RecordingBridge::new()
            .reply("ls /data/log/hilog", "DrawRect.001.20240101-000000\nDrawRect.002.20240101-000030\n")
            .recv_writes("DrawingApiTest Started: [1]\n");
        let path = collect_hilog(&bridge, &config(&dir), "DrawRect", "drawing_DrawRect_1", "t")
            .expect("collected");
        assert_eq!(path, dir.path().join("reports/drawing/DrawRect/drawing_DrawRect_1.log"));
        assert!(path.exists());

        let lines = bridge.lines();
        assert_eq!(lines[0], "shell hilog -r");
        assert!(lines.contains(&"shell hilog -w start -f DrawRect -m none".to_string()));
        let recv = lines.iter().find(|line| line.starts_with("file recv")).expect("recv");
        assert!(recv.starts_with("file recv /data/log/hilog/DrawRect.002.20240101-000030 "));
        assert_eq!(lines.last().map(String::as_str), Some("shell rm -rf /data/log/hilog/*"));
    }

    #[test]
    fn missing_log_is_reported() {
        let dir = TempDir::new().expect("tmp");
        let bridge = RecordingBridge::new().reply("ls /data/log/hilog", "hilog.001.gz\n");
        let err = collect_hilog(&bridge, &config(&dir), "DrawRect", "x", "trace-h").unwrap_err();
        assert_eq!(err.code, "ERR_LOG_MISSING");
        assert!(!bridge.lines().iter().any(|line| line.starts_with("file recv")));
    }
}
