pub mod counters;
pub mod hilog;
pub mod trace;
