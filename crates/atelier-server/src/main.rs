//! Server entry point: Axum router, WebSocket upgrade, and bind logic.

mod protocol;
mod sink;
mod workflows;
mod ws;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use atelier_nodes::NodeRegistry;

const DEFAULT_PORT: u16 = 9300;
const PORT_PROBE_LIMIT: u16 = 16;

/// Shared server state.
pub struct AppState {
    pub registry: Arc<NodeRegistry>,
    pub output_dir: PathBuf,
}

async fn health() -> &'static str {
    "ok"
}

/// Binds the listener. An explicit port is respected (and busy is an
/// error); otherwise the default port is probed upward until one is free.
async fn bind_listener(host: &str, explicit: Option<u16>) -> Result<TcpListener> {
    if let Some(port) = explicit {
        return Ok(TcpListener::bind((host, port)).await?);
    }

    for offset in 0..PORT_PROBE_LIMIT {
        let port = DEFAULT_PORT + offset;
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                if offset > 0 {
                    warn!("Port {} was busy, using {}", DEFAULT_PORT, port);
                }
                return Ok(listener);
            }
            Err(_) => continue,
        }
    }
    anyhow::bail!(
        "no free port in {}..{}",
        DEFAULT_PORT,
        DEFAULT_PORT + PORT_PROBE_LIMIT
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().expect("valid filter")),
        )
        .compact()
        .init();

    let state = Arc::new(AppState {
        registry: Arc::new(NodeRegistry::with_defaults()),
        output_dir: std::env::var("ATELIER_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("Output")),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let host = std::env::var("ATELIER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let explicit = std::env::var("ATELIER_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok());

    let listener = bind_listener(&host, explicit).await?;
    info!("atelier-server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn explicit_port_is_respected_even_when_busy() {
        let holder = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = holder.local_addr().unwrap().port();

        let err = bind_listener("127.0.0.1", Some(port)).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn probing_skips_busy_default_port() {
        let _holder = TcpListener::bind(("127.0.0.1", DEFAULT_PORT)).await;
        // Whether or not the default port was free to hold, probing finds a
        // listener somewhere in the window.
        let listener = bind_listener("127.0.0.1", None).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!((DEFAULT_PORT..DEFAULT_PORT + PORT_PROBE_LIMIT).contains(&port));
    }
}
