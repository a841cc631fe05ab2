//! Runs every scenario in order and builds the comparison report.

use super::config::BenchmarkConfig;
use super::report::{Report, ReportEntry, Verdict};
use super::runner::ScenarioRunner;
use super::scenario::Scenario;
use super::stats::{ScenarioResult, StatisticsEngine};
use crate::error::Result;

/// A validated set of scenarios sharing one configuration
pub struct BenchmarkSuite {
    runner: ScenarioRunner,
    scenarios: Vec<Scenario>,
    baseline: usize,
}

impl BenchmarkSuite {
    /// Validate the scenario set; nothing is bound here
    pub fn new(config: BenchmarkConfig, scenarios: Vec<Scenario>) -> Result<Self> {
        let baseline = StatisticsEngine::baseline_index(&scenarios)?;
        let runner = ScenarioRunner::new(config)?;
        Ok(Self {
            runner,
            scenarios,
            baseline,
        })
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn baseline(&self) -> &Scenario {
        &self.scenarios[self.baseline]
    }

    /// Run all scenarios sequentially
    ///
    /// A failing scenario becomes a failed entry; the remaining scenarios
    /// still run.
    pub async fn run(&self) -> Report {
        let mut outcomes = Vec::with_capacity(self.scenarios.len());
        for scenario in &self.scenarios {
            let outcome = self.runner.run(scenario).await;
            if let Err(e) = &outcome {
                tracing::error!("Scenario {} failed: {}", scenario.label, e);
            }
            outcomes.push(outcome);
        }
        self.build_report(outcomes)
    }

    /// Attach ratios and verdicts to raw scenario outcomes
    fn build_report(&self, outcomes: Vec<Result<ScenarioResult>>) -> Report {
        let engine = self.runner.engine();
        let baseline_label = &self.baseline().label;
        let baseline_result = outcomes[self.baseline].as_ref().ok().cloned();

        let entries = self
            .scenarios
            .iter()
            .zip(outcomes)
            .map(|(scenario, outcome)| {
                let (result, verdict) = match (outcome, &baseline_result) {
                    (Err(e), _) => (None, Verdict::Fail(e.to_string())),
                    (Ok(result), None) => (
                        Some(result),
                        Verdict::Fail(format!("baseline {} did not complete", baseline_label)),
                    ),
                    (Ok(mut result), Some(baseline)) => {
                        let comparison = engine.compare(baseline, &result);
                        result.ratio_to_baseline = Some(comparison.ratio);
                        let verdict = if comparison.significant {
                            Verdict::Pass
                        } else {
                            Verdict::Fail(format!(
                                "baseline {} coefficient of variation {:.3} exceeds {:.3}",
                                baseline_label,
                                comparison.baseline_cv,
                                engine.cv_threshold()
                            ))
                        };
                        (Some(result), verdict)
                    }
                };

                ReportEntry {
                    label: scenario.label.clone(),
                    threshold: scenario.threshold,
                    baseline: scenario.baseline,
                    result,
                    verdict,
                }
            })
            .collect();

        Report::new(engine.cv_threshold(), entries)
    }
}
