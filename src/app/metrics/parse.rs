use std::fmt;
use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::info;

use crate::app::error::AppError;
use crate::app::models::{round2, ApiTiming, CounterTotals};

pub const MARK_STARTED: &str = "DrawingApiTest Started:";
pub const MARK_FINISHED: &str = "DrawingApiTest Finished:";
pub const MARK_CALL_COUNT: &str = "DrawingApiTest TotalApiCallCount:";

/// hiperf writes `"hw-cpu-cycles","eventCount":N`; simpleperf drops the `hw-` prefix and pads with spaces.
pub const CYCLES_PATTERN: &str = r#""(?:hw-)?cpu-cycles",\s*"eventCount":\s*(\d+)"#;
pub const INSTRUCTIONS_PATTERN: &str = r#""(?:hw-)?instructions",\s*"eventCount":\s*(\d+)"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    EmptyLog { path: String },
    IncompleteLog { missing: Vec<&'static str> },
    ZeroCallCount,
    NegativeElapsed { start: u64, end: u64 },
    IncompleteReport { missing: Vec<&'static str> },
}

impl fmt::Display for MetricsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyLog { path } => write!(f, "log file is missing or empty: {path}"),
            Self::IncompleteLog { missing } => {
                write!(f, "log is missing markers: {}", missing.join(", "))
            }
            Self::ZeroCallCount => write!(f, "total api call count is zero"),
            Self::NegativeElapsed { start, end } => {
                write!(f, "finished timestamp {end} precedes started timestamp {start}")
            }
            Self::IncompleteReport { missing } => {
                write!(f, "counter report is missing: {}", missing.join(", "))
            }
        }
    }
}

impl std::error::Error for MetricsError {}

impl MetricsError {
    pub fn into_app_error(self, trace_id: &str) -> AppError {
        AppError::metrics(self.to_string(), trace_id)
    }
}

/// First unsigned integer after `marker` on `line`, tolerating `[`/spaces around it.
pub fn value_after_marker(line: &str, marker: &str) -> Option<u64> {
    let index = line.find(marker)?;
    let rest = &line[index + marker.len()..];
    let start = rest.find(|c: char| c.is_ascii_digit())?;
    let digits: String = rest[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u64>().ok()
}

pub fn parse_api_timing(text: &str) -> Result<ApiTiming, MetricsError> {
    let mut start: Option<u64> = None;
    let mut end: Option<u64> = None;
    let mut total_count: Option<u64> = None;

    for line in text.lines() {
        if let Some(value) = value_after_marker(line, MARK_STARTED) {
            start = Some(value);
        }
        if let Some(value) = value_after_marker(line, MARK_FINISHED) {
            end = Some(value);
        }
        if let Some(value) = value_after_marker(line, MARK_CALL_COUNT) {
            total_count = Some(value);
        }
    }

    let (start, end, total_count) = match (start, end, total_count) {
        (Some(start), Some(end), Some(total_count)) => (start, end, total_count),
        _ => {
            let missing = [
                (start.is_none(), MARK_STARTED),
                (end.is_none(), MARK_FINISHED),
                (total_count.is_none(), MARK_CALL_COUNT),
            ]
            .into_iter()
            .filter_map(|(absent, marker)| absent.then_some(marker))
            .collect();
            return Err(MetricsError::IncompleteLog { missing });
        }
    };

    if total_count == 0 {
        return Err(MetricsError::ZeroCallCount);
    }
    if end < start {
        return Err(MetricsError::NegativeElapsed { start, end });
    }

    Ok(ApiTiming {
        start,
        end,
        total_count,
        api_time: round2((end - start) as f64 / total_count as f64),
    })
}

pub fn file_valid(path: &Path) -> bool {
    fs::metadata(path).map(|meta| meta.is_file() && meta.len() > 0).unwrap_or(false)
}

/// Reads a pulled hilog file and computes microseconds per call.
pub fn cal_api_time(api_name: &str, log_path: &Path) -> Result<ApiTiming, MetricsError> {
    if !file_valid(log_path) {
        return Err(MetricsError::EmptyLog {
            path: log_path.display().to_string(),
        });
    }
    let bytes = fs::read(log_path).map_err(|_| MetricsError::EmptyLog {
        path: log_path.display().to_string(),
    })?;
    let timing = parse_api_timing(&String::from_utf8_lossy(&bytes))?;
    info!(
        api = %api_name,
        start = timing.start,
        end = timing.end,
        total_count = timing.total_count,
        api_time_us = timing.api_time,
        "api time computed"
    );
    Ok(timing)
}

fn count_after(text: &str, pattern: &str) -> Option<u64> {
    let re = Regex::new(pattern).ok()?;
    re.captures(text)?.get(1)?.as_str().parse::<u64>().ok()
}

/// Instruction and cycle totals from a hiperf or simpleperf report.
pub fn parse_counter_report(text: &str) -> Result<CounterTotals, MetricsError> {
    let cycles = count_after(text, CYCLES_PATTERN);
    let instructions = count_after(text, INSTRUCTIONS_PATTERN);
    match (instructions, cycles) {
        (Some(instructions), Some(cycles)) => Ok(CounterTotals { instructions, cycles }),
        _ => {
            let mut missing = Vec::new();
            if instructions.is_none() {
                missing.push("instructions");
            }
            if cycles.is_none() {
                missing.push("cycles");
            }
            Err(MetricsError::IncompleteReport { missing })
        }
    }
}

pub fn per_call(count: u64, total_count: u64) -> f64 {
    if total_count == 0 {
        return 0.0;
    }
    round2(count as f64 / total_count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn hilog(start: &str, end: &str, count: &str) -> String {
        format!(
            "08-12 10:20:30.100  4321  4321 E C01400/DrawingTest: DrawingApiTest Started: [{start}]\n\
             08-12 10:20:30.150  4321  4321 I C01400/DrawingTest: frame 1\n\
             08-12 10:20:40.100  4321  4321 E C01400/DrawingTest: DrawingApiTest Finished: [{end}]\n\
             08-12 10:20:40.101  4321  4321 E C01400/DrawingTest: DrawingApiTest TotalApiCallCount: [{count}]\n\
             08-12 10:20:40.102  4321  4321 E C01400/DrawingTest: DrawingApiTest TotalApiCallTime: [9]\n"
        )
    }

    #[test]
    fn computes_time_per_call() {
        let timing = parse_api_timing(&hilog("100", "600", "50")).expect("timing");
        assert_eq!(timing.api_time, 10.0);
        assert_eq!(timing.total_count, 50);
    }

    #[test]
    fn rounds_to_two_decimals() {
        let timing = parse_api_timing(&hilog("0", "1000", "3")).expect("timing");
        assert_eq!(timing.api_time, 333.33);
    }

    #[test]
    fn ignores_digits_before_the_marker() {
        assert_eq!(value_after_marker("08-12 10:20 4321 DrawingApiTest Started: [77]", MARK_STARTED), Some(77));
        assert_eq!(value_after_marker("DrawingApiTest Started:", MARK_STARTED), None);
        assert_eq!(value_after_marker("unrelated 123", MARK_STARTED), None);
    }

    #[test]
    fn missing_marker_is_incomplete_log() {
        let text = "DrawingApiTest Started: [100]\nDrawingApiTest TotalApiCallCount: [50]\n";
        assert_eq!(
            parse_api_timing(text).unwrap_err(),
            MetricsError::IncompleteLog {
                missing: vec![MARK_FINISHED]
            }
        );
        match parse_api_timing("").unwrap_err() {
            MetricsError::IncompleteLog { missing } => assert_eq!(missing.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_count_and_reversed_clock_are_rejected() {
        assert_eq!(
            parse_api_timing(&hilog("100", "600", "0")).unwrap_err(),
            MetricsError::ZeroCallCount
        );
        assert_eq!(
            parse_api_timing(&hilog("600", "100", "5")).unwrap_err(),
            MetricsError::NegativeElapsed { start: 600, end: 100 }
        );
    }

    #[test]
    fn cal_api_time_requires_non_empty_file() {
        let dir = TempDir::new().expect("tmp");
        let empty = dir.path().join("empty.log");
        fs::write(&empty, "").expect("write");
        assert!(matches!(
            cal_api_time("DrawRect", &empty),
            Err(MetricsError::EmptyLog { .. })
        ));
        assert!(matches!(
            cal_api_time("DrawRect", &dir.path().join("absent.log")),
            Err(MetricsError::EmptyLog { .. })
        ));

        let log = dir.path().join("run.log");
        fs::write(&log, hilog("100", "600", "50")).expect("write");
        assert_eq!(cal_api_time("DrawRect", &log).expect("timing").api_time, 10.0);
    }

    #[test]
    fn parses_hiperf_and_simpleperf_reports() {
        let hiperf = r#"{"eventConfigName":"hw-cpu-cycles","eventCount":123456,"x":1},{"eventConfigName":"hw-instructions","eventCount":654321}"#;
        assert_eq!(
            parse_counter_report(hiperf).expect("hiperf"),
            CounterTotals { instructions: 654321, cycles: 123456 }
        );
        let simpleperf = r#"{"eventName": "cpu-cycles", "eventCount": 2000}, {"eventName": "instructions", "eventCount": 1000}"#;
        assert_eq!(
            parse_counter_report(simpleperf).expect("simpleperf"),
            CounterTotals { instructions: 1000, cycles: 2000 }
        );
        assert_eq!(
            parse_counter_report("nothing").unwrap_err(),
            MetricsError::IncompleteReport { missing: vec!["instructions", "cycles"] }
        );
    }

    #[test]
    fn per_call_divides_and_rounds() {
        assert_eq!(per_call(100_000, 3), 33333.33);
        assert_eq!(per_call(5, 0), 0.0);
    }

    #[test]
    fn errors_map_to_metrics_code() {
        let err = MetricsError::ZeroCallCount.into_app_error("trace-m");
        assert_eq!(err.code, "ERR_METRICS");
        assert_eq!(err.trace_id, "trace-m");
    }
}
