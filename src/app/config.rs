use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::error::AppError;

pub const CONFIG_PATH_ENV: &str = "DRAWING_PERF_CONFIG";
pub const DEVICE_ENV: &str = "DRAWING_PERF_DEVICE";
pub const MODE_ENV: &str = "DRAWING_PERF_MODE";
pub const BRIDGE_ENV: &str = "HDC_PATH";

pub const SUPPORTED_MODES: [&str; 2] = ["drawing", "skia"];
pub const DEFAULT_BRIDGE: &str = "hdc";

/// Which on-device sampler produces instruction/cycle counts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CounterBackend {
    #[default]
    Hiperf,
    /// Pushed from `simpleperf_path` before the first run.
    Simpleperf,
}

/// Fixed settle intervals between device stages, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PacingSettings {
    pub head_start_ms: u64,
    pub settle_ms: u64,
    pub unlock_ms: u64,
    pub log_clear_ms: u64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            head_start_ms: 1_000,
            settle_ms: 5_000,
            unlock_ms: 2_000,
            log_clear_ms: 1_000,
        }
    }
}

impl PacingSettings {
    pub fn immediate() -> Self {
        Self {
            head_start_ms: 0,
            settle_ms: 0,
            unlock_ms: 0,
            log_clear_ms: 0,
        }
    }

    pub fn head_start(&self) -> Duration {
        Duration::from_millis(self.head_start_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn unlock(&self) -> Duration {
        Duration::from_millis(self.unlock_ms)
    }

    pub fn log_clear(&self) -> Duration {
        Duration::from_millis(self.log_clear_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrequencySettings {
    pub cpu_cores: Vec<u32>,
    pub cpu_freq_khz: u64,
    pub cpu_governor: String,
    pub offline_cores: Vec<u32>,
    pub gpu_devfreq: String,
    pub gpu_freq_hz: u64,
}

impl Default for FrequencySettings {
    fn default() -> Self {
        Self {
            cpu_cores: vec![0, 1, 2, 3],
            cpu_freq_khz: 1_992_000,
            cpu_governor: "performance".to_string(),
            offline_cores: vec![1, 2, 3],
            gpu_devfreq: "fde60000.gpu".to_string(),
            gpu_freq_hz: 800_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UnlockSettings {
    pub start_x: u32,
    pub start_y: u32,
    pub end_x: u32,
    pub end_y: u32,
    pub swipe_speed: u32,
}

impl Default for UnlockSettings {
    fn default() -> Self {
        Self {
            start_x: 350,
            start_y: 1000,
            end_x: 350,
            end_y: 600,
            swipe_speed: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BenchConfig {
    pub bridge_path: String,
    pub device_id: String,
    pub mode: String,
    pub test_count: u32,
    /// Seconds the benchmark binary draws for.
    pub test_time: u64,
    pub test_number: usize,
    pub retry_number: usize,
    /// Seconds to wait for the device to come back after a reboot.
    pub wait_time: u64,
    /// Seconds of hilog capture per run.
    pub log_time: u64,
    pub trace_time: u64,
    pub failure_threshold: usize,
    pub work_dir: PathBuf,
    pub api_list_path: PathBuf,
    pub api_list_sheet: String,
    pub collect_trace: bool,
    pub collect_counters: bool,
    pub counter_backend: CounterBackend,
    /// Host copy of the simpleperf binary, relative to `work_dir` unless absolute.
    pub simpleperf_path: PathBuf,
    pub clear_soc_perf: bool,
    /// Shell template turning a counter data file into a report; `{input}` and `{output}` are
    /// substituted. Empty disables report generation.
    pub report_generator: String,
    pub pacing: PacingSettings,
    pub frequency: FrequencySettings,
    pub unlock: UnlockSettings,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            bridge_path: "hdc".to_string(),
            device_id: String::new(),
            mode: "drawing".to_string(),
            test_count: 10,
            test_time: 10,
            test_number: 5,
            retry_number: 2,
            wait_time: 60,
            log_time: 30,
            trace_time: 10,
            failure_threshold: 3,
            work_dir: PathBuf::from("."),
            api_list_path: PathBuf::from("oh_drawing_api.xlsx"),
            api_list_sheet: "oh_drawing_api".to_string(),
            collect_trace: false,
            collect_counters: false,
            counter_backend: CounterBackend::Hiperf,
            simpleperf_path: PathBuf::from("simpleperf/bin/android/arm64/simpleperf"),
            clear_soc_perf: false,
            report_generator: String::new(),
            pacing: PacingSettings::default(),
            frequency: FrequencySettings::default(),
            unlock: UnlockSettings::default(),
        }
    }
}

impl BenchConfig {
    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_time)
    }

    pub fn log_window(&self) -> Duration {
        Duration::from_secs(self.log_time)
    }

    /// Benchmark binary for the active mode: `demo/{mode}/{mode}_rs_demo`.
    pub fn demo_binary(&self) -> PathBuf {
        self.work_dir
            .join("demo")
            .join(&self.mode)
            .join(format!("{}_rs_demo", self.mode))
    }

    pub fn api_list_file(&self) -> PathBuf {
        if self.api_list_path.is_absolute() {
            self.api_list_path.clone()
        } else {
            self.work_dir.join(&self.api_list_path)
        }
    }

    pub fn simpleperf_binary(&self) -> PathBuf {
        if self.simpleperf_path.is_absolute() {
            self.simpleperf_path.clone()
        } else {
            self.work_dir.join(&self.simpleperf_path)
        }
    }

    pub fn result_sheet_name(&self) -> String {
        format!("{}_api_perf_test_result", self.mode)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir().map(|dir| dir.join("drawing_api_perf").join("config.json"))
}

pub fn load_config_from_path(path: &Path, trace_id: &str) -> Result<BenchConfig, AppError> {
    if !path.exists() {
        return Ok(BenchConfig::default());
    }
    let raw = fs::read_to_string(path).map_err(|err| {
        AppError::config(format!("Failed to read config {}: {err}", path.display()), trace_id)
    })?;
    serde_json::from_str::<BenchConfig>(&raw).map_err(|err| {
        AppError::config(format!("Failed to parse config {}: {err}", path.display()), trace_id)
    })
}

/// Environment values take precedence over the file; blank values are ignored.
pub fn apply_env_overrides<F>(mut config: BenchConfig, lookup: F) -> BenchConfig
where
    F: Fn(&str) -> Option<String>,
{
    let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    if let Some(device_id) = non_blank(DEVICE_ENV) {
        config.device_id = device_id.trim().to_string();
    }
    if let Some(mode) = non_blank(MODE_ENV) {
        config.mode = mode.trim().to_string();
    }
    if let Some(bridge) = non_blank(BRIDGE_ENV) {
        config.bridge_path = bridge;
    }
    config
}

/// Strips one pair of wrapping quotes; blank means the default `hdc`.
fn bridge_program(configured: &str) -> String {
    let trimmed = configured.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|quote| trimmed.strip_prefix(*quote)?.strip_suffix(*quote))
        .map(str::trim)
        .unwrap_or(trimmed);
    if unquoted.is_empty() {
        DEFAULT_BRIDGE.to_string()
    } else {
        unquoted.to_string()
    }
}

/// Bare names go through PATH at spawn time; anything with a separator must be an existing file.
fn check_bridge_program(program: &str) -> Result<(), String> {
    if !program.contains(['/', '\\']) {
        return Ok(());
    }
    let path = Path::new(program);
    if path.is_file() {
        Ok(())
    } else if path.is_dir() {
        Err(format!("bridge path {program} is a directory"))
    } else {
        Err(format!("bridge executable not found at {program}"))
    }
}

pub fn validate_config(mut config: BenchConfig, trace_id: &str) -> Result<BenchConfig, AppError> {
    config.mode = config.mode.trim().to_lowercase();
    if !SUPPORTED_MODES.contains(&config.mode.as_str()) {
        return Err(AppError::config(
            format!(
                "mode must be one of {}, got '{}'",
                SUPPORTED_MODES.join("/"),
                config.mode
            ),
            trace_id,
        ));
    }
    config.bridge_path = bridge_program(&config.bridge_path);
    check_bridge_program(&config.bridge_path).map_err(|message| AppError::config(message, trace_id))?;
    config.device_id = config.device_id.trim().to_string();
    if config.test_number == 0 {
        config.test_number = 5;
    }
    if config.test_count == 0 {
        config.test_count = 10;
    }
    if config.failure_threshold == 0 || config.failure_threshold > config.test_number {
        config.failure_threshold = config.test_number.min(3);
    }
    if config.api_list_sheet.trim().is_empty() {
        config.api_list_sheet = "oh_drawing_api".to_string();
    }
    Ok(config)
}
