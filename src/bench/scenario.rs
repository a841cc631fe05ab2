//! Scenario and sample types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::LoggingThreshold;

/// One benchmark configuration executed end-to-end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub label: String,
    pub threshold: LoggingThreshold,
    pub baseline: bool,
}

impl Scenario {
    /// Scenario labelled after its threshold
    pub fn new(threshold: LoggingThreshold) -> Self {
        Self {
            label: format!("LogLevel{}", threshold.label()),
            threshold,
            baseline: false,
        }
    }

    /// Mark this scenario as the reference all others are compared against
    pub fn as_baseline(mut self) -> Self {
        self.baseline = true;
        self
    }
}

/// Phase of a scenario's request loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Warmup,
    Measured,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Warmup => write!(f, "warm-up"),
            Phase::Measured => write!(f, "measured"),
        }
    }
}

/// One measured request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub elapsed: Duration,
    /// Resident memory growth across the request, when it could be observed
    pub allocated_bytes: Option<u64>,
    pub success: bool,
}

impl Sample {
    pub fn success(elapsed: Duration, allocated_bytes: Option<u64>) -> Self {
        Self {
            elapsed,
            allocated_bytes,
            success: true,
        }
    }

    pub fn failure(elapsed: Duration) -> Self {
        Self {
            elapsed,
            allocated_bytes: None,
            success: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_label_and_baseline() {
        let scenario = Scenario::new(LoggingThreshold::Critical).as_baseline();
        assert_eq!(scenario.label, "LogLevelCritical");
        assert!(scenario.baseline);
        assert!(!Scenario::new(LoggingThreshold::Trace).baseline);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Warmup.to_string(), "warm-up");
        assert_eq!(Phase::Measured.to_string(), "measured");
    }
}
