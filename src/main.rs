use anyhow::{bail, Context, Result};

use gateway_logbench::bench::{BenchmarkSuite, ReportSink};
use gateway_logbench::config::Config;
use gateway_logbench::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = Config::load()?;

    logging::init_console(&config.log_level);

    print_startup_banner(&config);

    // Baseline problems surface here, before any server starts
    let suite = BenchmarkSuite::new(config.bench.clone(), config.scenarios())?;
    tracing::info!(
        "Running {} scenarios against baseline {}",
        suite.scenarios().len(),
        suite.baseline().label
    );

    let report = tokio::select! {
        report = suite.run() => report,
        _ = shutdown_signal() => {
            bail!("Benchmark interrupted");
        }
    };

    let sink = ReportSink::new(config.bench.track_memory);
    if config.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", sink.render(&report));
    }

    if let Some(path) = &config.output {
        sink.write_to(&report, path, config.json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        tracing::info!("Report written to {}", path.display());
    }

    let failed = report.failures().count();
    if failed > 0 {
        bail!("{} of {} scenarios failed", failed, report.entries.len());
    }

    Ok(())
}

/// Print startup banner with configuration
fn print_startup_banner(config: &Config) {
    let thresholds: Vec<String> = config.thresholds.iter().map(|t| t.to_string()).collect();

    println!();
    println!("  Gateway logging benchmark {}", env!("CARGO_PKG_VERSION"));
    println!("  Thresholds:  {}", thresholds.join(", "));
    println!("  Baseline:    {}", config.baseline);
    println!(
        "  Requests:    {} warm-up + {} measured per scenario",
        config.bench.warmup_requests, config.bench.measured_requests
    );
    println!("  Log dir:     {}", config.bench.log_dir.display());
    println!();
}

/// Resolve when the user asks to stop
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C signal, stopping benchmark...");
}
