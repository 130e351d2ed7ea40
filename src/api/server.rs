//! API server lifecycle: bind, serve, stop on Ctrl-C or an explicit
//! shutdown signal.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::api::router::api_router;
use crate::core_state::CoreState;

/// Handle to a server running in a background task.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl ApiServer {
    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
        if let Err(e) = self.task.await {
            tracing::error!("API server task failed: {e}");
        }
    }
}

/// Bind `addr` and serve the API in a background task.
pub async fn start_api_server(core: Arc<CoreState>, addr: SocketAddr) -> Result<ApiServer, String> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind API server on {addr}: {e}"))?;
    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    let app = api_router(core);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            tokio::select! {
                _ = shutdown_rx => {}
                _ = tokio::signal::ctrl_c() => tracing::info!("Ctrl-C received"),
            }
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("API server error: {e}");
        }
        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

/// Serve until the process is interrupted.
pub async fn serve_until_interrupted(core: Arc<CoreState>, addr: SocketAddr) -> Result<(), String> {
    let ApiServer { task, shutdown_tx, .. } = start_api_server(core, addr).await?;
    let result = task.await.map_err(|e| format!("API server task failed: {e}"));
    // Dropping the sender earlier would read as a shutdown request.
    drop(shutdown_tx);
    result
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::pharmacy::{MockTransport, RetryPolicy};

    #[tokio::test]
    async fn server_answers_health_and_shuts_down() {
        let tmp = tempfile::tempdir().unwrap();
        let core = Arc::new(CoreState::with_transport(
            tmp.path().join("medsync.db"),
            Arc::new(MockTransport::new()),
            RetryPolicy::new(1, Duration::ZERO),
        ));
        let server = start_api_server(core, "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        assert_ne!(server.addr.port(), 0);

        let mut stream = tokio::net::TcpStream::connect(server.addr).await.unwrap();
        stream
            .write_all(b"GET /api/health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"status\":\"ok\""));

        server.shutdown().await;
    }
}
