//! Liveness endpoint and keep-alive pinger for hosts that idle a service
//! after a stretch without inbound traffic.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const HEALTH_BODY: &str = "ProductivityPal Discord Bot is running!";

pub fn router() -> Router {
    Router::new().route("/", get(|| async { HEALTH_BODY }))
}

/// Bind `0.0.0.0:port` and serve the health route in the background.
pub async fn spawn_server(port: u16) -> anyhow::Result<JoinHandle<()>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("🌐 Health endpoint listening on http://{addr}");
    Ok(serve(listener))
}

fn serve(listener: TcpListener) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router()).await {
            tracing::error!("❌ Health server stopped: {e}");
        }
    })
}

/// GET `url` every `every`, logging the status. Runs until aborted.
pub fn spawn_keep_alive(url: String, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        tracing::info!(
            "Keep-alive service started (interval: {} minutes)",
            every.as_secs() / 60
        );
        loop {
            match client.get(&url).send().await {
                Ok(resp) => tracing::info!("Keep-alive ping sent. Status code: {}", resp.status().as_u16()),
                Err(e) => tracing::warn!("⚠️ Keep-alive error: {e}"),
            }
            tokio::time::sleep(every).await;
        }
    })
}
