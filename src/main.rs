use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use drawing_api_perf_lib::app::bridge::channel::DeviceChannel;
use drawing_api_perf_lib::app::config::{
    apply_env_overrides, default_config_path, load_config_from_path, validate_config, BenchConfig, CounterBackend,
};
use drawing_api_perf_lib::app::device::prep::{clear_soc_perf, lock_core_frequency};
use drawing_api_perf_lib::app::error::AppError;
use drawing_api_perf_lib::app::logging::init_logging;
use drawing_api_perf_lib::app::orchestrator::{
    result_workbook_path, run_all, DeviceSession, OrchestratorSummary, RunPolicy,
};
use drawing_api_perf_lib::app::report::api_list::read_api_list;
use drawing_api_perf_lib::app::report::writer::ResultWriter;

/// Drawing API performance bench: runs each selected API on a device over hdc and writes
/// per-run timings to a spreadsheet.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON config file; flags override its values
    #[arg(short, long, env = "DRAWING_PERF_CONFIG")]
    config: Option<PathBuf>,

    /// device id, if not set the bridge's default device is used
    #[arg(short, long)]
    device: Option<String>,

    /// drawing or skia
    #[arg(short, long)]
    mode: Option<String>,

    /// path to the hdc binary
    #[arg(long)]
    bridge: Option<PathBuf>,

    /// directory holding demo/, reports/ and the api list
    #[arg(short, long)]
    work_dir: Option<PathBuf>,

    /// api list workbook, relative to the work dir
    #[arg(long)]
    api_list: Option<PathBuf>,

    #[arg(long)]
    sheet: Option<String>,

    /// iterations passed to the benchmark binary
    #[arg(long)]
    test_count: Option<u32>,

    /// benchmark duration (seconds)
    #[arg(long)]
    test_time: Option<u64>,

    /// runs per api
    #[arg(short = 'n', long)]
    test_number: Option<usize>,

    /// reboot-and-retry cycles after failures
    #[arg(short, long)]
    retry_number: Option<usize>,

    /// seconds to wait for the device after a reboot
    #[arg(long)]
    wait_time: Option<u64>,

    /// hilog capture window (seconds)
    #[arg(long)]
    log_time: Option<u64>,

    /// capture instruction/cycle counters per run
    #[arg(long)]
    counters: bool,

    /// sample counters with a pushed simpleperf instead of hiperf
    #[arg(long)]
    simpleperf: bool,

    /// capture a bytrace per run
    #[arg(long)]
    trace: bool,

    /// empty vendor soc_perf configs before testing (reboots the device)
    #[arg(long)]
    clear_soc_perf: bool,

    /// leave cpu/gpu frequencies alone
    #[arg(long)]
    no_lock: bool,
}

impl Args {
    fn apply(&self, mut config: BenchConfig) -> BenchConfig {
        if let Some(device) = &self.device {
            config.device_id = device.clone();
        }
        if let Some(mode) = &self.mode {
            config.mode = mode.clone();
        }
        if let Some(bridge) = &self.bridge {
            config.bridge_path = bridge.to_string_lossy().to_string();
        }
        if let Some(work_dir) = &self.work_dir {
            config.work_dir = work_dir.clone();
        }
        if let Some(api_list) = &self.api_list {
            config.api_list_path = api_list.clone();
        }
        if let Some(sheet) = &self.sheet {
            config.api_list_sheet = sheet.clone();
        }
        if let Some(value) = self.test_count {
            config.test_count = value;
        }
        if let Some(value) = self.test_time {
            config.test_time = value;
        }
        if let Some(value) = self.test_number {
            config.test_number = value;
        }
        if let Some(value) = self.retry_number {
            config.retry_number = value;
        }
        if let Some(value) = self.wait_time {
            config.wait_time = value;
        }
        if let Some(value) = self.log_time {
            config.log_time = value;
        }
        config.collect_counters |= self.counters;
        if self.simpleperf {
            config.counter_backend = CounterBackend::Simpleperf;
        }
        config.collect_trace |= self.trace;
        config.clear_soc_perf |= self.clear_soc_perf;
        config
    }
}

#[derive(Serialize)]
struct RunSummary {
    tool: &'static str,
    status: &'static str,
    trace_id: String,
    mode: String,
    device_id: Option<String>,
    #[serde(flatten)]
    outcome: OrchestratorSummary,
}

fn build_config(args: &Args, trace_id: &str) -> Result<BenchConfig, AppError> {
    let config = match args.config.clone().or_else(default_config_path) {
        Some(path) => load_config_from_path(&path, trace_id)?,
        None => BenchConfig::default(),
    };
    let config = apply_env_overrides(config, |key| std::env::var(key).ok());
    validate_config(args.apply(config), trace_id)
}

fn run(args: &Args, config: BenchConfig, trace_id: &str) -> Result<RunSummary, AppError> {
    let channel = Arc::new(DeviceChannel::new(config.bridge_path.clone(), &config.device_id));
    match channel.list_targets(trace_id) {
        Ok(targets) if targets.is_empty() => warn!(trace_id = %trace_id, "no device attached"),
        Ok(targets) => info!(trace_id = %trace_id, targets = ?targets, "devices"),
        Err(err) => warn!(trace_id = %trace_id, error = %err, "unable to list devices"),
    }

    if args.no_lock {
        info!(trace_id = %trace_id, "frequency lock skipped");
        clear_soc_perf(channel.as_ref(), &config, trace_id)?;
    } else {
        lock_core_frequency(channel.as_ref(), &config, trace_id)?;
    }

    let apis = read_api_list(&config.api_list_file(), &config.api_list_sheet, &config.mode, trace_id)?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut writer = ResultWriter::create(
        &result_workbook_path(&config, &timestamp),
        &config.result_sheet_name(),
        trace_id,
    )?;

    let policy = RunPolicy::from_config(&config);
    let mode = config.mode.clone();
    let device_id = channel.device_id().map(str::to_string);
    let session = DeviceSession::new(Arc::clone(&channel), config);
    let outcome = run_all(&session, &apis, &policy, &mut writer, trace_id)?;

    Ok(RunSummary {
        tool: "drawing_api_perf",
        status: if outcome.all_passed() { "pass" } else { "fail" },
        trace_id: trace_id.to_string(),
        mode,
        device_id,
        outcome,
    })
}

fn main() -> ExitCode {
    let args = Args::parse();
    let trace_id = Uuid::new_v4().to_string();

    let config = match build_config(&args, &trace_id) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };
    if let Err(err) = init_logging(&config.work_dir.join("log"), &trace_id) {
        eprintln!("{err}");
        return ExitCode::from(2);
    }
    info!(
        trace_id = %trace_id,
        mode = %config.mode,
        device = %config.device_id,
        bridge = %config.bridge_path,
        test_number = config.test_number,
        retry_number = config.retry_number,
        "drawing api perf started"
    );

    match run(&args, config, &trace_id) {
        Ok(summary) => {
            let passed = summary.outcome.all_passed();
            match serde_json::to_string_pretty(&summary) {
                Ok(output) => println!("{output}"),
                Err(err) => warn!(trace_id = %trace_id, error = %err, "failed to render summary"),
            }
            if passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(err) => {
            error!(trace_id = %trace_id, code = %err.code, error = %err.error, "run aborted");
            eprintln!("{err}");
            if err.code == "ERR_CONFIG" || err.code == "ERR_VALIDATION" {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}
