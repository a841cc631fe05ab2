//! Scenario runner: owns one origin and one gateway for the length of a
//! scenario and drives sequential traffic through them.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use reqwest::Method;

use super::config::BenchmarkConfig;
use super::memory::{self, MemoryProbe};
use super::origin::OriginStub;
use super::scenario::{Phase, Sample, Scenario};
use super::stats::{ScenarioResult, StatisticsEngine};
use crate::error::{BenchError, Result};
use crate::gateway::{GatewayHarness, GatewaySettings};

/// Runs one scenario at a time against freshly started servers
pub struct ScenarioRunner {
    config: BenchmarkConfig,
    client: reqwest::Client,
    method: Method,
    engine: StatisticsEngine,
}

impl ScenarioRunner {
    /// Create a new scenario runner
    ///
    /// The client keeps at most one idle connection per host so every
    /// measured request reuses the same connection.
    pub fn new(config: BenchmarkConfig) -> Result<Self> {
        config.validate()?;

        let method = config
            .upstream_methods
            .first()
            .map(|m| Method::from_bytes(m.to_uppercase().as_bytes()))
            .transpose()
            .map_err(|e| BenchError::Config(format!("Invalid upstream method: {}", e)))?
            .unwrap_or(Method::GET);

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| BenchError::Internal(anyhow::anyhow!("Failed to create HTTP client: {}", e)))?;

        let engine = StatisticsEngine::new(config.cv_threshold);

        Ok(Self {
            config,
            client,
            method,
            engine,
        })
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn engine(&self) -> &StatisticsEngine {
        &self.engine
    }

    /// Run a scenario end-to-end and aggregate its measured samples
    ///
    /// Both servers are stopped before this returns, whatever the outcome.
    pub async fn run(&self, scenario: &Scenario) -> Result<ScenarioResult> {
        tracing::info!("Running scenario {} ({})", scenario.label, scenario.threshold);

        let mut origin = OriginStub::new(self.config.origin_config());
        let origin_addr = origin.start().await?;

        let mut gateway = match self.start_gateway(scenario, origin_addr).await {
            Ok(gateway) => gateway,
            Err(e) => {
                if let Err(stop_err) = origin.stop().await {
                    tracing::warn!("Failed to stop origin after gateway start failure: {}", stop_err);
                }
                return Err(e);
            }
        };

        let outcome = match gateway.url() {
            Some(url) => self.drive(&url).await,
            None => Err(BenchError::Internal(anyhow::anyhow!("Gateway has no bound address"))),
        };

        // Gateway first: it holds connections into the origin
        let gateway_stopped = gateway.stop().await;
        let origin_stopped = origin.stop().await;

        let samples = settle(outcome, [gateway_stopped, origin_stopped])?;

        let result = self.engine.aggregate(&samples)?;
        tracing::info!(
            "  mean: {:.1}us, stddev: {:.1}us, n: {}",
            micros(result.mean),
            micros(result.std_dev),
            result.sample_count
        );
        Ok(result)
    }

    /// Build the scenario's route and start its gateway
    async fn start_gateway(
        &self,
        scenario: &Scenario,
        origin_addr: SocketAddr,
    ) -> Result<GatewayHarness> {
        let route = self.config.route(origin_addr.port())?;
        route.write_document(&self.config.routing_document_path(scenario.threshold))?;

        let mut gateway = GatewayHarness::new(GatewaySettings {
            url: self.config.gateway_url(),
            route,
            threshold: scenario.threshold,
            sink_path: scenario.threshold.sink_path(&self.config.log_dir),
            request_timeout: self.config.request_timeout(),
            shutdown_grace: self.config.shutdown_grace,
        });
        gateway.start().await?;
        Ok(gateway)
    }

    /// Warm up, then measure; the first failed request aborts the scenario
    async fn drive(&self, gateway_url: &str) -> Result<Vec<Sample>> {
        let url = format!("{}{}", gateway_url, self.config.request_path());

        for iteration in 1..=self.config.warmup_requests {
            self.execute_request(&url, Phase::Warmup, iteration).await?;
        }

        let mut probe = self.config.track_memory.then(MemoryProbe::new);
        let mut samples = Vec::with_capacity(self.config.measured_requests);

        for iteration in 1..=self.config.measured_requests {
            let before = probe.as_mut().and_then(MemoryProbe::resident_bytes);
            let elapsed = self.execute_request(&url, Phase::Measured, iteration).await?;
            let after = probe.as_mut().and_then(MemoryProbe::resident_bytes);

            samples.push(Sample::success(elapsed, memory::growth(before, after)));
        }

        Ok(samples)
    }

    /// Send one request and drain its body; returns the full round-trip time
    async fn execute_request(&self, url: &str, phase: Phase, iteration: usize) -> Result<Duration> {
        let start = Instant::now();

        let response = self.client.request(self.method.clone(), url).send().await?;
        let status = response.status();
        response.bytes().await?;

        let elapsed = start.elapsed();

        if !status.is_success() {
            return Err(BenchError::RequestFailure {
                phase,
                iteration,
                status: status.as_u16(),
            });
        }
        Ok(elapsed)
    }
}

fn micros(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000_000.0
}

/// Combine a scenario outcome with the results of stopping its servers
///
/// Called only once every server has been stopped. A failed outcome wins and
/// teardown errors are logged; otherwise the first teardown error is returned.
fn settle<T>(outcome: Result<T>, teardown: [Result<()>; 2]) -> Result<T> {
    match outcome {
        Ok(value) => {
            for stopped in teardown {
                stopped?;
            }
            Ok(value)
        }
        Err(e) => {
            for stopped in teardown {
                if let Err(stop_err) = stopped {
                    tracing::warn!("Teardown after failed scenario: {}", stop_err);
                }
            }
            Err(e)
        }
    }
}
