use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::app::bridge::channel::{BridgeCommand, DeviceBridge};
use crate::app::bridge::parse::parse_pid;
use crate::app::bridge::paths::{api_report_dir, device_tmp_path};
use crate::app::bridge::runner::run_command_to_end;
use crate::app::config::{BenchConfig, CounterBackend};
use crate::app::device::prep::REMOUNT_ROOT;
use crate::app::error::AppError;
use crate::app::metrics::parse::{file_valid, parse_counter_report};
use crate::app::models::CounterTotals;

pub fn get_pid(bridge: &dyn DeviceBridge, name: &str, trace_id: &str) -> Result<u32, AppError> {
    let output = bridge.execute_capture(&BridgeCommand::shell(format!("ps -ef | grep {name}")), trace_id)?;
    let pid = parse_pid(&output, name)
        .ok_or_else(|| AppError::dependency(format!("no running process named {name}"), trace_id))?;
    info!(trace_id = %trace_id, name = %name, pid, "resolved pid");
    Ok(pid)
}

pub const SIMPLEPERF_DEVICE_PATH: &str = "/data/simpleperf";

pub fn record_command(backend: CounterBackend, pid: u32, duration_secs: u64, data_name: &str) -> BridgeCommand {
    let output = device_tmp_path(&format!("{data_name}_report.data"));
    BridgeCommand::shell(match backend {
        CounterBackend::Hiperf => format!(
            "hiperf record -e hw-instructions,hw-cpu-cycles -f 1000 -s dwarf -p {pid} -d {duration_secs} -o {output}"
        ),
        CounterBackend::Simpleperf => format!(
            "{SIMPLEPERF_DEVICE_PATH} record -e instructions,cpu-cycles -f 1000 -g -p {pid} --duration {duration_secs} -o {output}"
        ),
    })
}

pub fn push_simpleperf_commands(local: &Path) -> Vec<BridgeCommand> {
    vec![
        BridgeCommand::shell(REMOUNT_ROOT),
        BridgeCommand::send(local, SIMPLEPERF_DEVICE_PATH),
        BridgeCommand::shell(format!("chmod +x {SIMPLEPERF_DEVICE_PATH}")),
    ]
}

/// Installs the host simpleperf binary on the device. No-op for hiperf, which ships with the system.
pub fn push_simpleperf(bridge: &dyn DeviceBridge, config: &BenchConfig, trace_id: &str) -> Result<(), AppError> {
    if config.counter_backend != CounterBackend::Simpleperf {
        return Ok(());
    }
    let local = config.simpleperf_binary();
    if !local.is_file() {
        return Err(AppError::validation(
            format!("simpleperf binary not found: {}", local.display()),
            trace_id,
        ));
    }
    for command in push_simpleperf_commands(&local) {
        bridge.execute_capture(&command, trace_id)?;
    }
    info!(trace_id = %trace_id, local = %local.display(), remote = SIMPLEPERF_DEVICE_PATH, "simpleperf pushed");
    Ok(())
}

/// Samples instructions and cycles of the running benchmark and pulls the data file.
pub fn collect_counters(
    bridge: &dyn DeviceBridge,
    config: &BenchConfig,
    api_name: &str,
    process_name: &str,
    data_name: &str,
    trace_id: &str,
) -> Result<PathBuf, AppError> {
    let dir = api_report_dir(&config.work_dir, &config.mode, api_name);
    fs::create_dir_all(&dir)
        .map_err(|err| AppError::io(format!("Failed to create {}: {err}", dir.display()), trace_id))?;
    let pid = get_pid(bridge, process_name, trace_id)?;
    bridge.execute_capture(
        &record_command(config.counter_backend, pid, config.test_time, data_name),
        trace_id,
    )?;
    let remote = device_tmp_path(&format!("{data_name}_report.data"));
    bridge.execute_capture(&BridgeCommand::recv(&remote, &dir), trace_id)?;
    Ok(dir.join(format!("{data_name}_report.data")))
}

pub fn render_generator(template: &str, input: &Path, output: &Path) -> String {
    template
        .replace("{input}", &input.to_string_lossy())
        .replace("{output}", &output.to_string_lossy())
}

/// Runs the configured report generator over a counter data file.
pub fn generate_report(
    template: &str,
    data_path: &Path,
    report_path: &Path,
    trace_id: &str,
) -> Result<PathBuf, AppError> {
    if template.trim().is_empty() {
        return Err(AppError::config("report_generator is not configured", trace_id));
    }
    if !file_valid(data_path) {
        return Err(AppError::log_missing(
            format!("counter data missing or empty: {}", data_path.display()),
            trace_id,
        ));
    }
    let command = render_generator(template, data_path, report_path);
    info!(trace_id = %trace_id, command = %command, "generating counter report");
    let output = run_command_to_end("sh", &["-c".to_string(), command], trace_id)?;
    if !output.success() {
        return Err(AppError::dependency(
            format!("report generator failed: {}", output.combined()),
            trace_id,
        ));
    }
    Ok(report_path.to_path_buf())
}

/// Generates the report next to `data_path` and reads instruction/cycle totals from it.
pub fn counter_totals(config: &BenchConfig, data_path: &Path, report_name: &str, trace_id: &str) -> Result<CounterTotals, AppError> {
    let report_path = data_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{report_name}.html"));
    generate_report(&config.report_generator, data_path, &report_path, trace_id)?;
    let text = fs::read(&report_path)
        .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
        .map_err(|err| AppError::io(format!("Failed to read {}: {err}", report_path.display()), trace_id))?;
    parse_counter_report(&text).map_err(|err| err.into_app_error(trace_id))
}
