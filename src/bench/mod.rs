//! Benchmark harness for gateway logging thresholds.
//!
//! This module provides:
//! - Origin stub the gateway forwards to
//! - Scenario runner owning one origin and one gateway per scenario
//! - Descriptive statistics and baseline comparison
//! - Report generation

pub mod config;
pub mod memory;
pub mod origin;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod stats;
pub mod suite;

pub use config::BenchmarkConfig;
pub use origin::{OriginConfig, OriginFault, OriginStub};
pub use report::{Report, ReportEntry, ReportSink, Verdict};
pub use runner::ScenarioRunner;
pub use scenario::{Phase, Sample, Scenario};
pub use stats::{Comparison, ScenarioResult, StatisticsEngine};
pub use suite::BenchmarkSuite;
