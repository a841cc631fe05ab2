use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::bench::{BenchmarkConfig, Scenario};
use crate::error::{BenchError, Result};
use crate::logging::LoggingThreshold;

/// Gateway logging threshold benchmark
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Logging thresholds to benchmark, comma separated
    #[arg(
        short = 't',
        long,
        env = "BENCH_THRESHOLDS",
        default_value = "Critical,Error,Warning,Information,Trace"
    )]
    pub thresholds: String,

    /// Threshold every other scenario is compared against
    #[arg(short = 'b', long, env = "BENCH_BASELINE", default_value = "Critical")]
    pub baseline: String,

    /// Requests issued before measuring
    #[arg(short = 'w', long, env = "BENCH_WARMUP", default_value = "20")]
    pub warmup: usize,

    /// Measured requests per scenario
    #[arg(short = 'n', long, env = "BENCH_ITERATIONS", default_value = "200")]
    pub iterations: usize,

    /// Host both servers bind to
    #[arg(short = 'H', long, env = "BENCH_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Gateway port (0 = random per scenario)
    #[arg(long, env = "BENCH_GATEWAY_PORT", default_value = "0")]
    pub gateway_port: u16,

    /// Origin port (0 = random per scenario)
    #[arg(long, env = "BENCH_ORIGIN_PORT", default_value = "0")]
    pub origin_port: u16,

    /// Upstream path template registered on the gateway
    #[arg(long, env = "BENCH_UPSTREAM_PATH", default_value = "/")]
    pub upstream_path: String,

    /// Downstream path template the gateway forwards to
    #[arg(long, env = "BENCH_DOWNSTREAM_PATH", default_value = "/")]
    pub downstream_path: String,

    /// Status the origin answers with
    #[arg(long, env = "BENCH_ORIGIN_STATUS", default_value = "201")]
    pub origin_status: u16,

    /// Body the origin answers with
    #[arg(long, env = "BENCH_ORIGIN_BODY", default_value = "")]
    pub origin_body: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "BENCH_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// How long a stopping server may take to drain, in milliseconds
    #[arg(long, env = "BENCH_SHUTDOWN_GRACE_MS", default_value = "5000")]
    pub shutdown_grace_ms: u64,

    /// Maximum coefficient of variation tolerated on the baseline
    #[arg(long, env = "BENCH_CV_THRESHOLD", default_value = "0.5")]
    pub cv_threshold: f64,

    /// Directory for per-threshold log files and routing documents
    #[arg(long, env = "BENCH_LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// Skip memory diagnostics
    #[arg(long)]
    pub skip_memory: bool,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Also write the report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Harness log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub thresholds: Vec<LoggingThreshold>,
    pub baseline: LoggingThreshold,
    pub bench: BenchmarkConfig,

    // Output
    pub json: bool,
    pub output: Option<PathBuf>,
    pub log_level: String,
}

impl Config {
    /// Load configuration with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let thresholds = parse_thresholds(&args.thresholds)?;
        let baseline: LoggingThreshold = args.baseline.parse().map_err(BenchError::Config)?;

        let config = Config {
            thresholds,
            baseline,
            bench: BenchmarkConfig {
                host: args.host,
                origin_port: args.origin_port,
                gateway_port: args.gateway_port,
                upstream_path: args.upstream_path,
                downstream_path: args.downstream_path,
                origin_status: args.origin_status,
                origin_body: args.origin_body,
                warmup_requests: args.warmup,
                measured_requests: args.iterations,
                timeout_secs: args.request_timeout,
                log_dir: args.log_dir,
                track_memory: !args.skip_memory,
                cv_threshold: args.cv_threshold,
                shutdown_grace: Duration::from_millis(args.shutdown_grace_ms),
                ..Default::default()
            },
            json: args.json,
            output: args.output,
            log_level: args.log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.thresholds.is_empty() {
            return Err(BenchError::Config(
                "At least one logging threshold is required".to_string(),
            ));
        }

        // Duplicates would write to the same sink file
        let mut seen = HashSet::new();
        for threshold in &self.thresholds {
            if !seen.insert(threshold) {
                return Err(BenchError::Config(format!(
                    "Duplicate logging threshold: {}",
                    threshold
                )));
            }
        }

        if !self.thresholds.contains(&self.baseline) {
            return Err(BenchError::BaselineMissing);
        }

        if self.bench.gateway_port != 0 && self.bench.gateway_port == self.bench.origin_port {
            return Err(BenchError::Config(format!(
                "Gateway and origin cannot share port {}",
                self.bench.gateway_port
            )));
        }

        self.bench.validate()
    }

    /// One scenario per threshold, in the configured order
    pub fn scenarios(&self) -> Vec<Scenario> {
        self.thresholds
            .iter()
            .map(|&threshold| {
                let scenario = Scenario::new(threshold);
                if threshold == self.baseline {
                    scenario.as_baseline()
                } else {
                    scenario
                }
            })
            .collect()
    }
}

fn parse_thresholds(list: &str) -> Result<Vec<LoggingThreshold>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(BenchError::Config))
        .collect()
}
