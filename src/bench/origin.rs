//! Origin stub answering every request under a base path with a fixed response.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};
use crate::utils::{self, ServerHandle, SHUTDOWN_GRACE};

/// Injected failure: from the Nth request on, answer with `status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginFault {
    /// 1-based request number at which the fault starts
    pub from_request: usize,
    pub status: u16,
}

/// Configuration for the origin stub
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginConfig {
    /// URL to bind (port 0 for random)
    pub url: String,
    /// Path prefix the stub answers on
    pub base_path: String,
    /// Status returned for every matching request
    pub status: u16,
    /// Body returned for every matching request
    pub body: String,
    /// Optional injected failure
    pub fault: Option<OriginFault>,
    /// From this 1-based request on, never answer
    pub stall_from: Option<usize>,
    /// How long `stop` waits for in-flight requests before aborting
    pub shutdown_grace: Duration,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:0".to_string(),
            base_path: "/".to_string(),
            status: 201,
            body: String::new(),
            fault: None,
            stall_from: None,
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }
}

struct OriginState {
    base_path: String,
    status: StatusCode,
    body: Bytes,
    fault: Option<(usize, StatusCode)>,
    stall_from: Option<usize>,
    requests: AtomicUsize,
}

/// Synthetic downstream for the gateway
pub struct OriginStub {
    config: OriginConfig,
    server: Option<ServerHandle>,
    state: Option<Arc<OriginState>>,
}

impl OriginStub {
    /// Create a stub; nothing is bound until [`OriginStub::start`]
    pub fn new(config: OriginConfig) -> Self {
        Self {
            config,
            server: None,
            state: None,
        }
    }

    /// Bind and start answering; returns the bound address
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.server.is_some() {
            return Err(BenchError::Config(format!(
                "Origin already running on {}",
                self.config.url
            )));
        }

        let status = parse_status(self.config.status)?;
        let fault = self
            .config
            .fault
            .map(|f| parse_status(f.status).map(|status| (f.from_request, status)))
            .transpose()?;

        let state = Arc::new(OriginState {
            base_path: self.config.base_path.clone(),
            status,
            body: Bytes::from(self.config.body.clone()),
            fault,
            stall_from: self.config.stall_from,
            requests: AtomicUsize::new(0),
        });

        let listener = utils::bind_url(&self.config.url).await?;
        let app = Router::new()
            .fallback(handle_request)
            .with_state(state.clone());
        let server = ServerHandle::spawn(listener, app)?;
        let addr = server.addr();

        tracing::debug!("Origin stub listening on {}", addr);

        self.server = Some(server);
        self.state = Some(state);
        Ok(addr)
    }

    /// Get the stub's address, if running
    pub fn addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(ServerHandle::addr)
    }

    /// Get the stub's URL, if running
    pub fn url(&self) -> Option<String> {
        self.addr().map(utils::http_url)
    }

    /// Requests answered since the last start
    pub fn request_count(&self) -> usize {
        self.state
            .as_ref()
            .map(|s| s.requests.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Stop the stub and release its port; a no-op when not running
    pub async fn stop(&mut self) -> Result<()> {
        match self.server.take() {
            Some(mut server) => server
                .shutdown(self.config.shutdown_grace)
                .await
                .map_err(|e| BenchError::Teardown(format!("origin: {}", e))),
            None => Ok(()),
        }
    }
}

fn parse_status(status: u16) -> Result<StatusCode> {
    StatusCode::from_u16(status)
        .map_err(|_| BenchError::Config(format!("Invalid origin status code: {}", status)))
}

/// Whether `path` lies under `base`, on a segment boundary
fn under_base_path(path: &str, base: &str) -> bool {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return true;
    }
    match path.strip_prefix(base) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Answer any request under the base path
async fn handle_request(State(state): State<Arc<OriginState>>, request: Request) -> Response {
    if !under_base_path(request.uri().path(), &state.base_path) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let number = state.requests.fetch_add(1, Ordering::Relaxed) + 1;
    if state.stall_from.is_some_and(|from| number >= from) {
        return std::future::pending().await;
    }
    let status = match state.fault {
        Some((from_request, fault_status)) if number >= from_request => fault_status,
        _ => state.status,
    };

    (status, state.body.clone()).into_response()
}
