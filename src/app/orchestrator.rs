use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::app::bench::runner::{ensure_demo_binary, push_and_run};
use crate::app::bridge::channel::{BridgeCommand, DeviceBridge};
use crate::app::bridge::paths::{host_file_name, mode_report_dir, run_artifact_name, DEVICE_TMP_DIR};
use crate::app::collect::counters::{collect_counters, counter_totals, push_simpleperf};
use crate::app::collect::hilog::collect_hilog;
use crate::app::collect::trace::catch_trace;
use crate::app::config::BenchConfig;
use crate::app::device::prep::{delete_hilog, lock_core_frequency, reboot_and_unlock, set_hilog};
use crate::app::error::AppError;
use crate::app::metrics::parse::{cal_api_time, per_call};
use crate::app::models::TestRunRecord;
use crate::app::report::writer::ResultWriter;

/// What the orchestrator needs from a device: one-off setup, a single measured run, and a
/// way back to a known state after failures.
pub trait BenchmarkSession {
    fn prepare(&self, trace_id: &str) -> Result<(), AppError>;
    fn measure(&self, api_name: &str, run_index: usize, trace_id: &str) -> Result<TestRunRecord, AppError>;
    fn recover(&self, trace_id: &str) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPolicy {
    pub test_number: usize,
    pub failure_threshold: usize,
    pub retry_number: usize,
}

impl RunPolicy {
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            test_number: config.test_number,
            failure_threshold: config.failure_threshold,
            retry_number: config.retry_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrchestratorSummary {
    pub workbook: PathBuf,
    /// First pass plus every retry pass that ran.
    pub passes: usize,
    pub retries: usize,
    pub failed_apis: Vec<String>,
}

impl OrchestratorSummary {
    pub fn all_passed(&self) -> bool {
        self.failed_apis.is_empty()
    }
}

/// Runs every API `test_number` times. Returns the APIs that reached the failure threshold;
/// the others get their run rows plus an average row written.
pub fn run_pass<S: BenchmarkSession + ?Sized>(
    session: &S,
    apis: &[String],
    policy: &RunPolicy,
    writer: &mut ResultWriter,
    trace_id: &str,
) -> Result<Vec<String>, AppError> {
    let mut retry = Vec::new();
    for api_name in apis {
        let mut records = Vec::new();
        let mut failed = 0usize;
        for run_index in 0..policy.test_number {
            match session.measure(api_name, run_index, trace_id) {
                Ok(record) => records.push(record),
                Err(err) => {
                    failed += 1;
                    error!(
                        trace_id = %trace_id,
                        api = %api_name,
                        run = run_index + 1,
                        code = %err.code,
                        error = %err.error,
                        "api test failed, please check"
                    );
                }
            }
        }
        if failed >= policy.failure_threshold {
            warn!(trace_id = %trace_id, api = %api_name, failed, "marked for retry");
            retry.push(api_name.clone());
            continue;
        }
        if let Some(average) = TestRunRecord::average(api_name, &records) {
            records.push(average);
        }
        writer.write_records(&records, trace_id)?;
    }
    info!(trace_id = %trace_id, retry = ?retry, "pass finished");
    Ok(retry)
}

/// First pass over `apis`, then up to `retry_number` recover-and-retry cycles over whatever
/// is still failing.
pub fn run_all<S: BenchmarkSession + ?Sized>(
    session: &S,
    apis: &[String],
    policy: &RunPolicy,
    writer: &mut ResultWriter,
    trace_id: &str,
) -> Result<OrchestratorSummary, AppError> {
    session.prepare(trace_id)?;
    let mut failing = run_pass(session, apis, policy, writer, trace_id)?;
    let mut retry_cycles = 0usize;

    if !failing.is_empty() && policy.retry_number > 0 {
        info!(trace_id = %trace_id, apis = ?failing, "please wait for the device reboot");
        for cycle in 1..=policy.retry_number {
            retry_cycles = cycle;
            if let Err(err) = session.recover(trace_id) {
                warn!(trace_id = %trace_id, cycle, error = %err, "device recovery reported an error");
            }
            failing = run_pass(session, &failing, policy, writer, trace_id)?;
            info!(trace_id = %trace_id, cycle, apis = ?failing, "retry pass finished");
            if failing.is_empty() {
                info!(trace_id = %trace_id, "all api tests finished");
                break;
            }
        }
    }
    if !failing.is_empty() {
        error!(trace_id = %trace_id, apis = ?failing, "retry test finished with failed apis, please confirm");
    }

    Ok(OrchestratorSummary {
        workbook: writer.path().to_path_buf(),
        passes: retry_cycles + 1,
        retries: retry_cycles,
        failed_apis: failing,
    })
}

/// Output workbook path: `reports/{mode}/{mode}_api_perf_test_result_{timestamp}.xlsx`.
pub fn result_workbook_path(config: &BenchConfig, timestamp: &str) -> PathBuf {
    mode_report_dir(&config.work_dir, &config.mode)
        .join(format!("{}_api_perf_test_result_{timestamp}.xlsx", config.mode))
}

fn join_worker<T>(handle: JoinHandle<Result<T, AppError>>, worker: &str, trace_id: &str) -> Result<T, AppError> {
    handle
        .join()
        .map_err(|_| AppError::system(format!("{worker} worker panicked"), trace_id))?
}

/// A physical device reached through a bridge.
pub struct DeviceSession<B: DeviceBridge + 'static> {
    bridge: Arc<B>,
    config: Arc<BenchConfig>,
}

impl<B: DeviceBridge + 'static> DeviceSession<B> {
    pub fn new(bridge: Arc<B>, config: BenchConfig) -> Self {
        Self {
            bridge,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    fn clear_tmp(&self, trace_id: &str) -> Result<String, AppError> {
        self.bridge
            .execute_capture(&BridgeCommand::shell(format!("rm -rf {DEVICE_TMP_DIR}/*")), trace_id)
    }

    /// One run: hilog and benchmark workers in parallel, then metrics from the pulled log.
    pub fn api_test(&self, api_name: &str, run_index: usize, trace_id: &str) -> Result<TestRunRecord, AppError> {
        let config = &self.config;
        let artifact = run_artifact_name(&config.mode, api_name, run_index);
        info!(trace_id = %trace_id, api = %api_name, run = run_index + 1, "run started");

        delete_hilog(self.bridge.as_ref(), trace_id)?;
        self.clear_tmp(trace_id)?;

        let hilog_handle = {
            let (bridge, config) = (Arc::clone(&self.bridge), Arc::clone(&self.config));
            let (api, name, trace) = (api_name.to_string(), artifact.clone(), trace_id.to_string());
            thread::spawn(move || collect_hilog(bridge.as_ref(), &config, &api, &name, &trace))
        };
        let demo_handle = {
            let (bridge, config) = (Arc::clone(&self.bridge), Arc::clone(&self.config));
            let (api, trace) = (api_name.to_string(), trace_id.to_string());
            thread::spawn(move || {
                push_and_run(
                    bridge.as_ref(),
                    &config.demo_binary(),
                    &api,
                    config.test_count,
                    config.test_time,
                    &trace,
                )
            })
        };
        thread::sleep(config.pacing.head_start());

        let counter_handle = config.collect_counters.then(|| {
            let (bridge, config) = (Arc::clone(&self.bridge), Arc::clone(&self.config));
            let (api, name, trace) = (api_name.to_string(), artifact.clone(), trace_id.to_string());
            thread::spawn(move || {
                let process = host_file_name(&config.demo_binary());
                collect_counters(bridge.as_ref(), &config, &api, &process, &name, &trace)
            })
        });
        let trace_handle = config.collect_trace.then(|| {
            let (bridge, config) = (Arc::clone(&self.bridge), Arc::clone(&self.config));
            let (api, name, trace) = (api_name.to_string(), artifact.clone(), trace_id.to_string());
            thread::spawn(move || catch_trace(bridge.as_ref(), &config, &api, &name, &trace))
        });

        let log_path = join_worker(hilog_handle, "hilog", trace_id);
        let demo = join_worker(demo_handle, "benchmark", trace_id);
        let counters = counter_handle.map(|handle| join_worker(handle, "counters", trace_id));
        if let Some(Err(err)) = trace_handle.map(|handle| join_worker(handle, "trace", trace_id)) {
            warn!(trace_id = %trace_id, api = %api_name, error = %err, "trace capture failed");
        }

        if let Err(err) = self.clear_tmp(trace_id) {
            warn!(trace_id = %trace_id, error = %err, "failed to clean device tmp dir");
        }
        thread::sleep(config.pacing.settle());

        demo?;
        let log_path = log_path?;
        let timing = cal_api_time(api_name, &log_path).map_err(|err| err.into_app_error(trace_id))?;

        let (instructions, cycles) = match counters {
            Some(data_path) => {
                let totals = counter_totals(config, &data_path?, &artifact, trace_id)?;
                (
                    per_call(totals.instructions, timing.total_count),
                    per_call(totals.cycles, timing.total_count),
                )
            }
            None => (0.0, 0.0),
        };

        Ok(TestRunRecord {
            api_name: api_name.to_string(),
            api_time: timing.api_time,
            total_count: timing.total_count as f64,
            instructions,
            cycles,
        })
    }
}

impl<B: DeviceBridge + 'static> BenchmarkSession for DeviceSession<B> {
    fn prepare(&self, trace_id: &str) -> Result<(), AppError> {
        ensure_demo_binary(&self.config.demo_binary(), trace_id)?;
        if self.config.collect_counters {
            push_simpleperf(self.bridge.as_ref(), &self.config, trace_id)?;
        }
        set_hilog(self.bridge.as_ref(), trace_id)
    }

    fn measure(&self, api_name: &str, run_index: usize, trace_id: &str) -> Result<TestRunRecord, AppError> {
        self.api_test(api_name, run_index, trace_id)
    }

    fn recover(&self, trace_id: &str) -> Result<(), AppError> {
        reboot_and_unlock(self.bridge.as_ref(), &self.config, trace_id)?;
        lock_core_frequency(self.bridge.as_ref(), &self.config, trace_id)
    }
}
