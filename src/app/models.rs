use serde::{Deserialize, Serialize};

pub const RESULT_HEADER: [&str; 5] = ["api_name", "api_time", "total_count", "instructions", "cycles"];

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One benchmark run of one API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestRunRecord {
    pub api_name: String,
    /// Microseconds per call.
    pub api_time: f64,
    pub total_count: f64,
    pub instructions: f64,
    pub cycles: f64,
}

impl TestRunRecord {
    /// Mean of `records`, labelled `{api}_ave`. `None` when there is nothing to average.
    pub fn average(api_name: &str, records: &[TestRunRecord]) -> Option<TestRunRecord> {
        if records.is_empty() {
            return None;
        }
        let n = records.len() as f64;
        let mean = |field: fn(&TestRunRecord) -> f64| round2(records.iter().map(field).sum::<f64>() / n);
        Some(TestRunRecord {
            api_name: format!("{api_name}_ave"),
            api_time: mean(|r: &TestRunRecord| r.api_time),
            total_count: mean(|r: &TestRunRecord| r.total_count),
            instructions: mean(|r: &TestRunRecord| r.instructions),
            cycles: mean(|r: &TestRunRecord| r.cycles),
        })
    }

    pub fn cells(&self) -> [String; 5] {
        [
            self.api_name.clone(),
            format_number(self.api_time),
            format_number(self.total_count),
            format_number(self.instructions),
            format_number(self.cycles),
        ]
    }
}

/// Integers print without a trailing `.0`, everything else with up to two decimals.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let text = format!("{value:.2}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApiTiming {
    pub start: u64,
    pub end: u64,
    pub total_count: u64,
    /// Microseconds per call, two decimals.
    pub api_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterTotals {
    pub instructions: u64,
    pub cycles: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(api_time: f64) -> TestRunRecord {
        TestRunRecord {
            api_name: "OH_Drawing_CanvasDrawRect".to_string(),
            api_time,
            total_count: 100.0,
            instructions: 500.0,
            cycles: 1000.0,
        }
    }

    #[test]
    fn average_of_three_runs() {
        let records = vec![record(8.0), record(10.0), record(12.0)];
        let average = TestRunRecord::average("OH_Drawing_CanvasDrawRect", &records).expect("avg");
        assert_eq!(average.api_time, 10.0);
        assert_eq!(average.total_count, 100.0);
        assert_eq!(average.api_name, "OH_Drawing_CanvasDrawRect_ave");
    }

    #[test]
    fn average_rounds_to_two_decimals() {
        let records = vec![record(1.0), record(1.0), record(2.0)];
        let average = TestRunRecord::average("x", &records).expect("avg");
        assert_eq!(average.api_time, 1.33);
    }

    #[test]
    fn average_of_nothing_is_none() {
        assert!(TestRunRecord::average("x", &[]).is_none());
    }

    #[test]
    fn numbers_render_compactly() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(10.5), "10.5");
        assert_eq!(format_number(3.14159), "3.14");
        assert_eq!(record(8.25).cells()[1], "8.25");
    }
}
