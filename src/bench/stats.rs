//! Descriptive statistics over measured samples and baseline comparison.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::scenario::{Sample, Scenario};
use crate::error::{BenchError, Result};

/// Default limit on the baseline's coefficient of variation
pub const DEFAULT_CV_THRESHOLD: f64 = 0.5;

/// Aggregated statistics of one scenario's measured phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub mean: Duration,
    pub std_dev: Duration,
    pub std_error: Duration,
    pub min: Duration,
    pub max: Duration,
    pub median: Duration,
    pub sample_count: usize,
    /// Mean resident memory growth per request, over samples that reported one
    pub mean_allocated_bytes: Option<f64>,
    /// `mean / baseline mean`, set once the baseline result exists
    pub ratio_to_baseline: Option<f64>,
}

impl ScenarioResult {
    /// Requests per second implied by the mean latency
    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.mean.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        1.0 / secs
    }

    /// Standard deviation relative to the mean
    pub fn coefficient_of_variation(&self) -> f64 {
        let mean = self.mean.as_secs_f64();
        if mean == 0.0 {
            return 0.0;
        }
        self.std_dev.as_secs_f64() / mean
    }
}

/// Outcome of comparing a candidate against the baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub ratio: f64,
    /// False when the baseline is too noisy for the ratio to mean anything
    pub significant: bool,
    pub baseline_cv: f64,
}

/// Aggregates samples and compares scenarios against the baseline
#[derive(Debug, Clone, Copy)]
pub struct StatisticsEngine {
    cv_threshold: f64,
}

impl Default for StatisticsEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CV_THRESHOLD)
    }
}

impl StatisticsEngine {
    pub fn new(cv_threshold: f64) -> Self {
        Self { cv_threshold }
    }

    pub fn cv_threshold(&self) -> f64 {
        self.cv_threshold
    }

    /// Index of the single baseline scenario
    ///
    /// Zero or several baselines are rejected before anything runs.
    pub fn baseline_index(scenarios: &[Scenario]) -> Result<usize> {
        let baselines: Vec<usize> = scenarios
            .iter()
            .enumerate()
            .filter(|(_, s)| s.baseline)
            .map(|(i, _)| i)
            .collect();

        match baselines.as_slice() {
            [] => Err(BenchError::BaselineMissing),
            [index] => Ok(*index),
            _ => Err(BenchError::BaselineDuplicate(
                baselines
                    .iter()
                    .map(|&i| scenarios[i].label.clone())
                    .collect(),
            )),
        }
    }

    /// Compute descriptive statistics over measured samples
    ///
    /// Every sample must be successful: a failed request invalidates the
    /// run instead of being dropped from the statistics.
    pub fn aggregate(&self, samples: &[Sample]) -> Result<ScenarioResult> {
        if samples.is_empty() {
            return Err(BenchError::Aggregation(
                "no successful samples to aggregate".to_string(),
            ));
        }
        if let Some(index) = samples.iter().position(|s| !s.success) {
            return Err(BenchError::Aggregation(format!(
                "sample {} is a failed request",
                index + 1
            )));
        }

        let mut nanos: Vec<u128> = samples.iter().map(|s| s.elapsed.as_nanos()).collect();
        nanos.sort_unstable();

        let count = nanos.len();
        let total: u128 = nanos.iter().sum();
        let mean_nanos = total / count as u128;

        let mean_f = total as f64 / count as f64;
        let variance = if count > 1 {
            nanos
                .iter()
                .map(|&n| (n as f64 - mean_f).powi(2))
                .sum::<f64>()
                / (count - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let std_error = std_dev / (count as f64).sqrt();

        let median_nanos = if count % 2 == 1 {
            nanos[count / 2]
        } else {
            (nanos[count / 2 - 1] + nanos[count / 2]) / 2
        };

        let allocations: Vec<u64> = samples.iter().filter_map(|s| s.allocated_bytes).collect();
        let mean_allocated_bytes = if allocations.is_empty() {
            None
        } else {
            Some(allocations.iter().sum::<u64>() as f64 / allocations.len() as f64)
        };

        Ok(ScenarioResult {
            mean: nanos_to_duration(mean_nanos),
            std_dev: Duration::from_secs_f64(std_dev / 1e9),
            std_error: Duration::from_secs_f64(std_error / 1e9),
            min: nanos_to_duration(nanos[0]),
            max: nanos_to_duration(nanos[count - 1]),
            median: nanos_to_duration(median_nanos),
            sample_count: count,
            mean_allocated_bytes,
            ratio_to_baseline: None,
        })
    }

    /// Ratio of candidate to baseline mean, with the baseline noise check
    pub fn compare(&self, baseline: &ScenarioResult, candidate: &ScenarioResult) -> Comparison {
        let base = baseline.mean.as_secs_f64();
        let cand = candidate.mean.as_secs_f64();
        let ratio = if base > 0.0 {
            cand / base
        } else if cand == 0.0 {
            1.0
        } else {
            f64::INFINITY
        };

        let baseline_cv = baseline.coefficient_of_variation();
        Comparison {
            ratio,
            significant: baseline_cv <= self.cv_threshold,
            baseline_cv,
        }
    }
}

fn nanos_to_duration(nanos: u128) -> Duration {
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LoggingThreshold;
    use proptest::prelude::*;

    fn samples_ms(values: &[u64]) -> Vec<Sample> {
        values
            .iter()
            .map(|&ms| Sample::success(Duration::from_millis(ms), None))
            .collect()
    }

    #[test]
    fn test_aggregate_basic_statistics() {
        let engine = StatisticsEngine::default();
        let result = engine.aggregate(&samples_ms(&[2, 4, 4, 4, 5, 5, 7, 9])).unwrap();

        assert_eq!(result.sample_count, 8);
        assert_eq!(result.mean, Duration::from_millis(5));
        assert_eq!(result.min, Duration::from_millis(2));
        assert_eq!(result.max, Duration::from_millis(9));
        assert_eq!(result.median, Duration::from_micros(4500));
        // Sample standard deviation of the classic data set: sqrt(32 / 7)
        let expected = (32.0f64 / 7.0).sqrt();
        assert!((result.std_dev.as_secs_f64() * 1000.0 - expected).abs() < 1e-5);
        assert!(result.ratio_to_baseline.is_none());
    }

    #[test]
    fn test_single_sample_has_zero_deviation() {
        let engine = StatisticsEngine::default();
        let result = engine.aggregate(&samples_ms(&[3])).unwrap();
        assert_eq!(result.std_dev, Duration::ZERO);
        assert_eq!(result.mean, result.min);
        assert_eq!(result.mean, result.max);
    }

    #[test]
    fn test_aggregate_empty_is_error() {
        let err = StatisticsEngine::default().aggregate(&[]).unwrap_err();
        assert!(matches!(err, BenchError::Aggregation(_)));
    }

    #[test]
    fn test_aggregate_rejects_failed_sample() {
        let mut samples = samples_ms(&[1, 2]);
        samples.push(Sample::failure(Duration::from_millis(3)));
        let err = StatisticsEngine::default().aggregate(&samples).unwrap_err();
        assert!(matches!(err, BenchError::Aggregation(_)));
    }

    #[test]
    fn test_mean_allocated_bytes() {
        let samples = vec![
            Sample::success(Duration::from_millis(1), Some(100)),
            Sample::success(Duration::from_millis(1), Some(300)),
            Sample::success(Duration::from_millis(1), None),
        ];
        let result = StatisticsEngine::default().aggregate(&samples).unwrap();
        assert_eq!(result.mean_allocated_bytes, Some(200.0));

        let result = StatisticsEngine::default()
            .aggregate(&samples_ms(&[1, 2]))
            .unwrap();
        assert_eq!(result.mean_allocated_bytes, None);
    }

    #[test]
    fn test_compare_with_itself_is_unity() {
        let engine = StatisticsEngine::default();
        let result = engine.aggregate(&samples_ms(&[10, 11, 12, 10, 11])).unwrap();
        let comparison = engine.compare(&result, &result);
        assert!((comparison.ratio - 1.0).abs() < 1e-12);
        assert!(comparison.significant);
    }

    #[test]
    fn test_compare_ratio() {
        let engine = StatisticsEngine::default();
        let baseline = engine.aggregate(&samples_ms(&[10, 10, 10])).unwrap();
        let candidate = engine.aggregate(&samples_ms(&[15, 15, 15])).unwrap();
        let comparison = engine.compare(&baseline, &candidate);
        assert!((comparison.ratio - 1.5).abs() < 1e-9);
        assert!(comparison.significant);
    }

    #[test]
    fn test_noisy_baseline_is_not_significant() {
        let engine = StatisticsEngine::default();
        let noisy: Vec<u64> = (0..20).map(|i| if i % 2 == 0 { 1 } else { 1000 }).collect();
        let baseline = engine.aggregate(&samples_ms(&noisy)).unwrap();

        for candidate in [&[5u64, 5, 5][..], &[1000, 1001, 999][..], &noisy[..]] {
            let candidate = engine.aggregate(&samples_ms(candidate)).unwrap();
            let comparison = engine.compare(&baseline, &candidate);
            assert!(!comparison.significant);
            assert!(comparison.baseline_cv > engine.cv_threshold());
        }
    }

    #[test]
    fn test_baseline_index() {
        let scenarios = vec![
            Scenario::new(LoggingThreshold::Trace),
            Scenario::new(LoggingThreshold::Critical).as_baseline(),
        ];
        assert_eq!(StatisticsEngine::baseline_index(&scenarios).unwrap(), 1);

        let none = vec![Scenario::new(LoggingThreshold::Trace)];
        assert!(matches!(
            StatisticsEngine::baseline_index(&none),
            Err(BenchError::BaselineMissing)
        ));

        let two = vec![
            Scenario::new(LoggingThreshold::Trace).as_baseline(),
            Scenario::new(LoggingThreshold::Error).as_baseline(),
        ];
        match StatisticsEngine::baseline_index(&two) {
            Err(BenchError::BaselineDuplicate(labels)) => {
                assert_eq!(labels, vec!["LogLevelTrace", "LogLevelError"]);
            }
            other => panic!("expected duplicate baseline error, got {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_mean_within_bounds(values in prop::collection::vec(1u64..5_000_000_000, 1..200)) {
            let samples: Vec<Sample> = values
                .iter()
                .map(|&n| Sample::success(Duration::from_nanos(n), None))
                .collect();
            let result = StatisticsEngine::default().aggregate(&samples).unwrap();

            prop_assert!(result.min <= result.mean);
            prop_assert!(result.mean <= result.max);
            prop_assert!(result.min <= result.median && result.median <= result.max);
            prop_assert!(result.std_dev >= Duration::ZERO);
            prop_assert_eq!(result.sample_count, values.len());
        }

        #[test]
        fn prop_self_comparison_is_unity(values in prop::collection::vec(1u64..1_000_000, 1..50)) {
            let samples: Vec<Sample> = values
                .iter()
                .map(|&n| Sample::success(Duration::from_micros(n), None))
                .collect();
            let engine = StatisticsEngine::default();
            let result = engine.aggregate(&samples).unwrap();
            let comparison = engine.compare(&result, &result);
            prop_assert!((comparison.ratio - 1.0).abs() < 1e-12);
        }
    }
}
