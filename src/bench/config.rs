//! Configuration structs for benchmarking.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::origin::{OriginConfig, OriginFault};
use super::stats::DEFAULT_CV_THRESHOLD;
use crate::error::{BenchError, Result};
use crate::gateway::RouteSpec;
use crate::logging::LoggingThreshold;
use crate::utils::SHUTDOWN_GRACE;

/// Placeholder a catch-all upstream template ends with
const CATCH_ALL: &str = "{everything}";

/// Configuration shared by every scenario of a benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Host both servers bind to and the route points at
    pub host: String,
    /// Origin port (0 picks a fresh port per scenario)
    pub origin_port: u16,
    /// Gateway port (0 picks a fresh port per scenario)
    pub gateway_port: u16,
    /// Upstream path template registered on the gateway
    pub upstream_path: String,
    /// Upstream methods accepted by the route; the first one drives traffic
    pub upstream_methods: Vec<String>,
    /// Downstream path template the gateway forwards to
    pub downstream_path: String,
    /// Status the origin answers with
    pub origin_status: u16,
    /// Body the origin answers with
    pub origin_body: String,
    /// Optional failure injected at the origin
    pub origin_fault: Option<OriginFault>,
    /// Request from which the origin stops answering
    pub origin_stall_from: Option<usize>,
    /// Requests issued before measuring
    pub warmup_requests: usize,
    /// Requests measured per scenario
    pub measured_requests: usize,
    /// Client request timeout in seconds
    pub timeout_secs: u64,
    /// Directory receiving per-threshold log files and routing documents
    pub log_dir: PathBuf,
    /// Record best-effort memory growth per sample
    pub track_memory: bool,
    /// How long each server may take to drain when stopped
    pub shutdown_grace: Duration,
    /// Maximum coefficient of variation tolerated on the baseline
    pub cv_threshold: f64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            origin_port: 0,
            gateway_port: 0,
            upstream_path: "/".to_string(),
            upstream_methods: vec!["Get".to_string()],
            downstream_path: "/".to_string(),
            origin_status: 201,
            origin_body: String::new(),
            origin_fault: None,
            origin_stall_from: None,
            warmup_requests: 20,
            measured_requests: 200,
            timeout_secs: 30,
            log_dir: PathBuf::from("logs"),
            track_memory: true,
            shutdown_grace: SHUTDOWN_GRACE,
            cv_threshold: DEFAULT_CV_THRESHOLD,
        }
    }
}

impl BenchmarkConfig {
    /// Check values that would otherwise only fail once servers are running
    pub fn validate(&self) -> Result<()> {
        if self.measured_requests == 0 {
            return Err(BenchError::Config(
                "At least one measured request is required".to_string(),
            ));
        }
        if !self.cv_threshold.is_finite() || self.cv_threshold <= 0.0 {
            return Err(BenchError::Config(format!(
                "CV threshold must be a positive number, got {}",
                self.cv_threshold
            )));
        }
        if !(100..=999).contains(&self.origin_status) {
            return Err(BenchError::Config(format!(
                "Invalid origin status code: {}",
                self.origin_status
            )));
        }
        if self.host.is_empty() {
            return Err(BenchError::Config("Host must not be empty".to_string()));
        }
        if self.upstream_methods.is_empty() {
            return Err(BenchError::Config(
                "At least one upstream method is required".to_string(),
            ));
        }
        for path in [&self.upstream_path, &self.downstream_path] {
            if !path.starts_with('/') {
                return Err(BenchError::Config(format!(
                    "Path must start with '/': {}",
                    path
                )));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn origin_url(&self) -> String {
        format!("http://{}:{}", self.host, self.origin_port)
    }

    pub fn gateway_url(&self) -> String {
        format!("http://{}:{}", self.host, self.gateway_port)
    }

    /// Path the client requests on the gateway
    pub fn request_path(&self) -> String {
        self.upstream_path.replace(CATCH_ALL, "")
    }

    /// Origin settings for one scenario
    pub fn origin_config(&self) -> OriginConfig {
        OriginConfig {
            url: self.origin_url(),
            base_path: self
                .downstream_path
                .strip_suffix(CATCH_ALL)
                .unwrap_or(&self.downstream_path)
                .to_string(),
            status: self.origin_status,
            body: self.origin_body.clone(),
            fault: self.origin_fault,
            stall_from: self.origin_stall_from,
            shutdown_grace: self.shutdown_grace,
        }
    }

    /// Fresh route pointing at an origin bound to `origin_port`
    pub fn route(&self, origin_port: u16) -> Result<RouteSpec> {
        RouteSpec::builder()
            .upstream_path(self.upstream_path.clone())
            .upstream_methods(self.upstream_methods.iter().cloned())
            .downstream_host(self.host.clone())
            .downstream_port(origin_port)
            .downstream_scheme("http")
            .downstream_path(self.downstream_path.clone())
            .build()
    }

    /// Routing document path for a threshold
    pub fn routing_document_path(&self, threshold: LoggingThreshold) -> PathBuf {
        self.log_dir
            .join(format!("gateway_{}.json", threshold.label()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        BenchmarkConfig::default().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = BenchmarkConfig {
            measured_requests: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BenchmarkConfig {
            cv_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BenchmarkConfig {
            origin_status: 1000,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BenchmarkConfig {
            upstream_path: "relative".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_urls() {
        let config = BenchmarkConfig {
            origin_port: 51879,
            gateway_port: 5000,
            ..Default::default()
        };
        assert_eq!(config.origin_url(), "http://127.0.0.1:51879");
        assert_eq!(config.gateway_url(), "http://127.0.0.1:5000");
    }

    #[test]
    fn test_catch_all_paths() {
        let config = BenchmarkConfig {
            upstream_path: "/api/{everything}".to_string(),
            downstream_path: "/v1/{everything}".to_string(),
            ..Default::default()
        };
        assert_eq!(config.request_path(), "/api/");
        assert_eq!(config.origin_config().base_path, "/v1/");
    }

    #[test]
    fn test_route_points_at_origin_port() {
        let route = BenchmarkConfig::default().route(40000).unwrap();
        assert_eq!(route.downstream().port, 40000);
        assert_eq!(route.downstream().host, "127.0.0.1");
        assert_eq!(route.downstream_scheme(), "http");
    }

    #[test]
    fn test_routing_document_path_per_threshold() {
        let config = BenchmarkConfig::default();
        assert_eq!(
            config.routing_document_path(LoggingThreshold::Warning),
            PathBuf::from("logs/gateway_Warning.json")
        );
    }
}
