pub mod bench;
pub mod bridge;
pub mod collect;
pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod report;
