//! HTTP control surface for the federation
//!
//! Thin JSON layer over [`Federation`]: each route runs one workflow
//! operation on the blocking pool and maps its result to a JSON body.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::env_setting;
use crate::federation::Federation;

/// Server address
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_setting("API_PORT", |p| p.parse::<u16>()).unwrap_or(5000),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Serve an already built federation until ctrl+c
pub async fn serve(config: &ServerConfig, federation: Federation) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    info!(
        hospitals = federation.config().n_hospitals,
        models_dir = %federation.config().models_dir.display(),
        "Initializing federation"
    );

    let state = Arc::new(AppState::new(federation));
    let app = create_router(state);

    let addr: SocketAddr = config.address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        pid = std::process::id(),
        started_at = %start_time.to_rfc3339(),
        "Server listening and ready to accept connections"
    );

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl+c");
            return;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received, stopping server gracefully");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
