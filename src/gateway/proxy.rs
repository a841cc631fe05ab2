//! Minimal gateway runtime: one forwarding route plus a per-request
//! interception hook, with all request-time logging routed to a
//! scenario-scoped dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    middleware::{self as axum_middleware, Next},
    response::{IntoResponse, Response},
    Router,
};
use http_body_util::BodyExt;
use tower_http::trace::TraceLayer;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use super::route::RouteSpec;
use crate::error::{BenchError, Result};
use crate::logging::{Severity, CRITICAL_TARGET, PROBE_TARGET};

/// Headers that describe a single hop and must not be forwarded
static HOP_BY_HOP: [header::HeaderName; 8] = [
    header::CONNECTION,
    header::HOST,
    header::TRANSFER_ENCODING,
    header::CONTENT_LENGTH,
    header::UPGRADE,
    header::TE,
    header::TRAILER,
    header::PROXY_AUTHORIZATION,
];

/// Hook invoked once for every request the gateway receives, before routing
///
/// Runs inside the scenario's dispatcher, so any `tracing` call made here is
/// filtered and written exactly like the runtime's own logging.
pub trait RequestInterceptor: Send + Sync + 'static {
    fn on_request(&self, method: &Method, uri: &Uri);
}

/// Interceptor issuing one log call at every severity level
///
/// Whether each call is emitted depends only on the scenario's threshold, so
/// a benchmark sees the cost of the filtering decision at every level.
#[derive(Debug, Default)]
pub struct SeverityProbe {
    next_id: AtomicU64,
}

impl SeverityProbe {
    /// Issue the log call for one severity
    ///
    /// `tracing` has no critical level: critical calls are ERROR events on
    /// [`CRITICAL_TARGET`].
    pub fn emit(severity: Severity, request_id: u64, method: &Method, uri: &Uri) {
        let tag = severity.tag();
        match severity {
            Severity::Trace => {
                tracing::trace!(target: PROBE_TARGET, request_id, %method, %uri, "{}: severity probe", tag)
            }
            Severity::Debug => {
                tracing::debug!(target: PROBE_TARGET, request_id, %method, %uri, "{}: severity probe", tag)
            }
            Severity::Information => {
                tracing::info!(target: PROBE_TARGET, request_id, %method, %uri, "{}: severity probe", tag)
            }
            Severity::Warning => {
                tracing::warn!(target: PROBE_TARGET, request_id, %method, %uri, "{}: severity probe", tag)
            }
            Severity::Error => tracing::error!(
                target: PROBE_TARGET,
                request_id,
                %method,
                %uri,
                error = "test",
                "{}: severity probe",
                tag
            ),
            Severity::Critical => tracing::error!(
                target: CRITICAL_TARGET,
                request_id,
                %method,
                %uri,
                error = "test",
                "{}: severity probe",
                tag
            ),
        }
    }
}

impl RequestInterceptor for SeverityProbe {
    fn on_request(&self, method: &Method, uri: &Uri) {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        for severity in Severity::ALL {
            Self::emit(severity, request_id, method, uri);
        }
    }
}

/// Shared state of a running gateway
#[derive(Clone)]
struct RuntimeState {
    route: Arc<RouteSpec>,
    client: reqwest::Client,
    dispatch: Dispatch,
    interceptor: Option<Arc<dyn RequestInterceptor>>,
}

/// Gateway runtime forwarding a single route to its downstream
pub struct GatewayRuntime {
    state: RuntimeState,
}

impl GatewayRuntime {
    /// Create a runtime for `route` whose request-time logging goes to `dispatch`
    pub fn new(route: RouteSpec, dispatch: Dispatch, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| BenchError::Internal(anyhow::anyhow!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            state: RuntimeState {
                route: Arc::new(route),
                client,
                dispatch,
                interceptor: None,
            },
        })
    }

    /// Install the per-request interception hook
    pub fn with_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.state.interceptor = Some(interceptor);
        self
    }

    pub fn route(&self) -> &RouteSpec {
        &self.state.route
    }

    /// Build the router serving this runtime
    pub fn router(&self) -> Router {
        // Layers run outermost-last: the dispatcher must be entered before
        // the trace layer opens its span.
        Router::new()
            .fallback(forward)
            .layer(TraceLayer::new_for_http())
            .layer(axum_middleware::from_fn_with_state(
                self.state.clone(),
                intercept,
            ))
            .with_state(self.state.clone())
    }
}

/// Enter the scenario dispatcher and run the interception hook
async fn intercept(State(state): State<RuntimeState>, request: Request, next: Next) -> Response {
    let interceptor = state.interceptor.clone();

    async move {
        if let Some(interceptor) = interceptor {
            interceptor.on_request(request.method(), request.uri());
        }
        next.run(request).await
    }
    .with_subscriber(state.dispatch)
    .await
}

/// Forward a request along the configured route
async fn forward(State(state): State<RuntimeState>, request: Request) -> Response {
    let route = &state.route;

    let Some(downstream_path) = route
        .resolve(request.uri().path())
        .filter(|_| route.accepts_method(request.method()))
    else {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "No route matches upstream request"
        );
        return StatusCode::NOT_FOUND.into_response();
    };

    let url = route.downstream_url(&downstream_path, request.uri().query());
    let (parts, body) = request.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read upstream request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    tracing::debug!(method = %parts.method, url = %url, "Forwarding request downstream");

    let result = state
        .client
        .request(parts.method, &url)
        .headers(strip_hop_by_hop(parts.headers))
        .body(body)
        .send()
        .await;

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, url = %url, "Downstream request failed");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let status = response.status();
    let headers = strip_hop_by_hop(response.headers().clone());
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, url = %url, "Failed to read downstream response");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    tracing::debug!(status = %status, bytes = bytes.len(), "Downstream responded");

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn strip_hop_by_hop(mut headers: HeaderMap) -> HeaderMap {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
    headers
}
