//! Lifecycle owner of one gateway runtime instance.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use super::proxy::{GatewayRuntime, SeverityProbe};
use super::route::RouteSpec;
use crate::error::{BenchError, Result};
use crate::logging::{self, LogSink, LoggingThreshold};
use crate::utils::{self, ServerHandle};

/// Settings for one gateway instance
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// URL to bind, e.g. `http://127.0.0.1:5000` (port 0 picks a free port)
    pub url: String,
    pub route: RouteSpec,
    pub threshold: LoggingThreshold,
    pub sink_path: PathBuf,
    /// Timeout for the gateway's own downstream calls
    pub request_timeout: Duration,
    /// How long `stop` waits for in-flight requests before aborting
    pub shutdown_grace: Duration,
}

/// Gateway runtime bound to a URL, logging at a fixed threshold into its own sink
pub struct GatewayHarness {
    settings: GatewaySettings,
    server: Option<ServerHandle>,
    sink: Option<LogSink>,
}

impl GatewayHarness {
    pub fn new(settings: GatewaySettings) -> Self {
        Self {
            settings,
            server: None,
            sink: None,
        }
    }

    /// Open the sink, configure the route and start serving
    ///
    /// Returns once the listener is bound. On failure nothing is left open.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.server.is_some() {
            return Err(BenchError::Config(format!(
                "Gateway already running on {}",
                self.settings.url
            )));
        }

        let threshold = self.settings.threshold;
        let sink = LogSink::create(&self.settings.sink_path)?;

        let (runtime, listener) = match self.prepare(&sink).await {
            Ok(prepared) => prepared,
            Err(e) => {
                if let Err(close_err) = sink.close() {
                    tracing::warn!("Failed to close sink after failed start: {}", close_err);
                }
                return Err(e);
            }
        };

        let server = ServerHandle::spawn(listener, runtime.router())?;
        let addr = server.addr();

        tracing::debug!(
            "Gateway listening on {} (threshold: {}, sink: {})",
            addr,
            threshold,
            self.settings.sink_path.display()
        );

        self.server = Some(server);
        self.sink = Some(sink);
        Ok(addr)
    }

    async fn prepare(&self, sink: &LogSink) -> Result<(GatewayRuntime, TcpListener)> {
        let dispatch = logging::scenario_dispatch(self.settings.threshold, sink);
        let runtime = GatewayRuntime::new(
            self.settings.route.clone(),
            dispatch,
            self.settings.request_timeout,
        )?
        .with_interceptor(Arc::new(SeverityProbe::default()));

        let listener = utils::bind_url(&self.settings.url).await?;
        Ok((runtime, listener))
    }

    /// Address the gateway is bound to, if running
    pub fn addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(ServerHandle::addr)
    }

    pub fn url(&self) -> Option<String> {
        self.addr().map(utils::http_url)
    }

    pub fn threshold(&self) -> LoggingThreshold {
        self.settings.threshold
    }

    /// Drain and stop the server, then flush and close the sink
    ///
    /// Shutting the server down drops the runtime (router, client and
    /// dispatcher), so nothing can log into the sink once it is closed.
    /// Safe to call repeatedly and on a gateway that never started. Both the
    /// server and the sink are always attempted; failures are reported together.
    pub async fn stop(&mut self) -> Result<()> {
        let mut failures = Vec::new();

        if let Some(mut server) = self.server.take() {
            if let Err(e) = server.shutdown(self.settings.shutdown_grace).await {
                failures.push(e);
            }
        }

        if let Some(sink) = self.sink.take() {
            if let Err(e) = sink.close() {
                failures.push(e.to_string());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BenchError::Teardown(format!("gateway: {}", failures.join("; "))))
        }
    }
}
