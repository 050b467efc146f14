use std::fs;
use std::path::PathBuf;

use crate::app::bridge::channel::{BridgeCommand, DeviceBridge};
use crate::app::bridge::paths::{api_report_dir, device_tmp_path};
use crate::app::config::BenchConfig;
use crate::app::error::AppError;

const TRACE_TAGS: &str = "ace app ohos zimage zmedia zcamera zaudio ability window distributeddatamgr \
graphic sched freq irq sync mmc rpc workq idle disk pagecache memreclaim binder multimodalinput ark";

pub fn trace_commands(trace_name: &str, duration_secs: u64, local_dir: &std::path::Path) -> Vec<BridgeCommand> {
    let remote = device_tmp_path(&format!("{trace_name}.ftrace"));
    vec![
        BridgeCommand::shell(format!(
            "bytrace -t {duration_secs} -b 307200 --overwrite {TRACE_TAGS} > {remote}"
        )),
        // bytrace prints two banner lines ahead of the trace body.
        BridgeCommand::shell(format!("sed -i '1,2d' {remote}")),
        BridgeCommand::recv(&remote, local_dir),
    ]
}

/// Records a bytrace for `trace_time` seconds and pulls it into the per-API report dir.
pub fn catch_trace(
    bridge: &dyn DeviceBridge,
    config: &BenchConfig,
    api_name: &str,
    trace_name: &str,
    trace_id: &str,
) -> Result<PathBuf, AppError> {
    let dir = api_report_dir(&config.work_dir, &config.mode, api_name);
    fs::create_dir_all(&dir)
        .map_err(|err| AppError::io(format!("Failed to create {}: {err}", dir.display()), trace_id))?;
    for command in trace_commands(trace_name, config.trace_time, &dir) {
        bridge.execute_capture(&command, trace_id)?;
    }
    Ok(dir.join(format!("{trace_name}.ftrace")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::bridge::fake::RecordingBridge;
    use tempfile::TempDir;

    #[test]
    fn records_strips_and_pulls_trace() {
        let dir = TempDir::new().expect("tmp");
        let config = BenchConfig {
            work_dir: dir.path().to_path_buf(),
            trace_time: 7,
            ..BenchConfig::default()
        };
        let bridge = RecordingBridge::new();
        let path = catch_trace(&bridge, &config, "DrawRect", "drawing_DrawRect_1", "t").expect("trace");
        assert_eq!(
            path,
            dir.path().join("reports/drawing/DrawRect/drawing_DrawRect_1.ftrace")
        );
        let lines = bridge.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("shell bytrace -t 7 -b 307200 --overwrite ace app"));
        assert!(lines[0].ends_with("> /data/local/tmp/drawing_DrawRect_1.ftrace"));
        assert_eq!(lines[1], "shell sed -i '1,2d' /data/local/tmp/drawing_DrawRect_1.ftrace");
        assert!(lines[2].starts_with("file recv /data/local/tmp/drawing_DrawRect_1.ftrace "));
    }
}
