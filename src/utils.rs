// Socket and server lifecycle helpers shared by the origin stub and the gateway harness

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{BenchError, Result};

/// How long a stopping server may take to drain open connections
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Bind a listener for an `http://host:port` URL
///
/// The socket is bound before this returns, so callers can hand the address
/// out immediately. Port 0 picks an ephemeral port; read it back from
/// `listener.local_addr()`.
pub async fn bind_url(url: &str) -> Result<TcpListener> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| BenchError::Config(format!("Invalid URL '{}': {}", url, e)))?;

    if parsed.scheme() != "http" {
        return Err(BenchError::Config(format!(
            "Unsupported scheme '{}' in {}",
            parsed.scheme(),
            url
        )));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| BenchError::Config(format!("URL has no host: {}", url)))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = parsed.port_or_known_default().unwrap_or(80);

    TcpListener::bind((host.as_str(), port))
        .await
        .map_err(|source| BenchError::Bind {
            addr: format!("{}:{}", host, port),
            source,
        })
}

/// Base URL for a bound address
pub fn http_url(addr: SocketAddr) -> String {
    format!("http://{}", addr)
}

/// Whether no listener currently holds `port` on loopback
pub async fn port_is_free(port: u16) -> bool {
    bind_url(&format!("http://127.0.0.1:{}", port)).await.is_ok()
}

/// A spawned axum server with a graceful shutdown trigger
///
/// Dropping the handle signals shutdown but does not wait for it; call
/// [`ServerHandle::shutdown`] to wait until the listener is released.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl ServerHandle {
    /// Serve `router` on an already bound listener
    pub fn spawn(listener: TcpListener, router: Router) -> Result<Self> {
        let addr = listener
            .local_addr()
            .map_err(|e| BenchError::Internal(anyhow::anyhow!(e)))?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting, drain connections and release the listener
    ///
    /// A server that does not drain within `grace` is aborted and reported.
    pub async fn shutdown(&mut self, grace: Duration) -> std::result::Result<(), String> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(format!("server on {} failed: {}", self.addr, e)),
            Ok(Err(e)) => Err(format!("server task on {} panicked: {}", self.addr, e)),
            Err(_) => {
                // Wait for the cancelled task so the listener is closed on return
                task.abort();
                let _ = task.await;
                Err(format!(
                    "server on {} did not drain within {:?}",
                    self.addr, grace
                ))
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = bind_url("http://127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.port() > 0);
        assert!(!port_is_free(addr.port()).await);

        drop(listener);
        assert!(port_is_free(addr.port()).await);
    }

    #[tokio::test]
    async fn test_bind_same_url_twice_fails() {
        let first = bind_url("http://127.0.0.1:0").await.unwrap();
        let url = http_url(first.local_addr().unwrap());

        let err = bind_url(&url).await.unwrap_err();
        assert!(matches!(err, BenchError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_rejects_invalid_urls() {
        assert!(matches!(
            bind_url("not a url").await.unwrap_err(),
            BenchError::Config(_)
        ));
        assert!(matches!(
            bind_url("https://127.0.0.1:0").await.unwrap_err(),
            BenchError::Config(_)
        ));
    }

    #[tokio::test]
    async fn test_server_handle_releases_listener() {
        let listener = bind_url("http://127.0.0.1:0").await.unwrap();
        let router = Router::new().route("/", axum::routing::get(|| async { "ok" }));
        let mut server = ServerHandle::spawn(listener, router).unwrap();
        let port = server.addr().port();

        let body = reqwest::get(http_url(server.addr()))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");

        server.shutdown(SHUTDOWN_GRACE).await.unwrap();
        assert!(port_is_free(port).await);

        // Second shutdown is a no-op
        server.shutdown(SHUTDOWN_GRACE).await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_times_out_on_stuck_handler() {
        let listener = bind_url("http://127.0.0.1:0").await.unwrap();
        let (entered_tx, entered_rx) = oneshot::channel::<()>();
        let entered_tx = std::sync::Arc::new(std::sync::Mutex::new(Some(entered_tx)));
        let router = Router::new().route(
            "/",
            axum::routing::get(move || {
                let entered_tx = entered_tx.clone();
                async move {
                    if let Some(tx) = entered_tx.lock().unwrap().take() {
                        let _ = tx.send(());
                    }
                    std::future::pending::<&'static str>().await
                }
            }),
        );
        let mut server = ServerHandle::spawn(listener, router).unwrap();
        let port = server.addr().port();

        let url = http_url(server.addr());
        let request = tokio::spawn(async move { reqwest::get(url).await });
        entered_rx.await.unwrap();

        let err = server
            .shutdown(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.contains("did not drain"));
        assert!(port_is_free(port).await);

        request.abort();
    }

    #[test]
    fn test_http_url() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(http_url(addr), "http://127.0.0.1:5000");
    }
}
