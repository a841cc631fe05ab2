//! Logging thresholds, severities and per-scenario log dispatchers.
//!
//! Every scenario gets its own `tracing` dispatcher writing to a file whose
//! name is derived from the scenario's threshold. The dispatcher is never
//! installed globally; the gateway enters it around each request, so the
//! harness's own console output and the gateway's benchmarked output never mix.

pub mod sink;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing::Dispatch;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

pub use sink::LogSink;

/// Target used for the per-request severity probe events
pub const PROBE_TARGET: &str = "gateway_logbench::probe";

/// Target carrying critical events; `tracing` has no level above ERROR
pub const CRITICAL_TARGET: &str = "gateway_logbench::critical";

/// Minimum severity a gateway emits, ordered from most to least verbose
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum LoggingThreshold {
    Trace,
    Information,
    Warning,
    Error,
    Critical,
    None,
}

/// Severity of a single log call
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Information,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    /// Prefix put in front of every message logged at this severity
    pub fn tag(self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Information => "INFORMATION",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl LoggingThreshold {
    pub const ALL: [LoggingThreshold; 6] = [
        LoggingThreshold::Trace,
        LoggingThreshold::Information,
        LoggingThreshold::Warning,
        LoggingThreshold::Error,
        LoggingThreshold::Critical,
        LoggingThreshold::None,
    ];

    /// Human readable label, also used in file names
    pub fn label(self) -> &'static str {
        match self {
            LoggingThreshold::Trace => "Trace",
            LoggingThreshold::Information => "Information",
            LoggingThreshold::Warning => "Warning",
            LoggingThreshold::Error => "Error",
            LoggingThreshold::Critical => "Critical",
            LoggingThreshold::None => "None",
        }
    }

    /// Log file name for this threshold's sink
    pub fn sink_file_name(self) -> &'static str {
        match self {
            LoggingThreshold::Trace => "log_level_test_Trace.log",
            LoggingThreshold::Information => "log_level_test_Information.log",
            LoggingThreshold::Warning => "log_level_test_Warning.log",
            LoggingThreshold::Error => "log_level_test_Error.log",
            LoggingThreshold::Critical => "log_level_test_Critical.log",
            LoggingThreshold::None => "log_level_test_None.log",
        }
    }

    /// Full sink path inside `log_dir`
    pub fn sink_path(self, log_dir: &Path) -> PathBuf {
        log_dir.join(self.sink_file_name())
    }

    /// Whether a call at `severity` is emitted under this threshold
    pub fn admits(self, severity: Severity) -> bool {
        match self {
            LoggingThreshold::Trace => true,
            LoggingThreshold::Information => severity >= Severity::Information,
            LoggingThreshold::Warning => severity >= Severity::Warning,
            LoggingThreshold::Error => severity >= Severity::Error,
            LoggingThreshold::Critical => severity == Severity::Critical,
            LoggingThreshold::None => false,
        }
    }

    /// Per-layer filter implementing [`LoggingThreshold::admits`] for `tracing` events
    pub fn filter(self) -> Targets {
        match self {
            LoggingThreshold::Trace => Targets::new().with_default(LevelFilter::TRACE),
            LoggingThreshold::Information => Targets::new().with_default(LevelFilter::INFO),
            LoggingThreshold::Warning => Targets::new().with_default(LevelFilter::WARN),
            LoggingThreshold::Error => Targets::new().with_default(LevelFilter::ERROR),
            LoggingThreshold::Critical => Targets::new()
                .with_default(LevelFilter::OFF)
                .with_target(CRITICAL_TARGET, LevelFilter::ERROR),
            LoggingThreshold::None => Targets::new().with_default(LevelFilter::OFF),
        }
    }
}

impl std::fmt::Display for LoggingThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for LoggingThreshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" | "verbose" => Ok(LoggingThreshold::Trace),
            "information" | "info" => Ok(LoggingThreshold::Information),
            "warning" | "warn" => Ok(LoggingThreshold::Warning),
            "error" => Ok(LoggingThreshold::Error),
            "critical" | "fatal" => Ok(LoggingThreshold::Critical),
            "none" | "off" => Ok(LoggingThreshold::None),
            _ => Err(format!("Unknown logging threshold: {}", s)),
        }
    }
}

/// Build the dispatcher a gateway uses for one scenario
pub fn scenario_dispatch(threshold: LoggingThreshold, sink: &LogSink) -> Dispatch {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(sink.clone())
        .with_ansi(false)
        .with_target(true)
        .with_filter(threshold.filter());

    Dispatch::new(tracing_subscriber::registry().with(layer))
}

/// Install the console subscriber for the harness itself
pub fn init_console(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}
