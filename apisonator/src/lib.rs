//! HTTP adapter exposing the legacy `authorize.xml` / `authrep.xml` endpoints
//! in front of a 3scale backend.

pub mod config;
pub mod errors;
pub mod flusher;
pub mod metrics_defs;
pub mod response;
pub mod server;
pub mod translate;

#[cfg(test)]
mod testutils;

use crate::config::Config;
use crate::errors::{ApisonatorError, Result};
use crate::server::Server;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::future::Future;
use std::sync::Arc;

/// Serves the adapter until a listener fails or `shutdown` resolves, then
/// stops the background flusher before returning.
pub async fn run(config: Config, shutdown: impl Future<Output = ()>) -> Result<()> {
    let server = Arc::new(Server::new(&config)?);
    tracing::info!(upstream = %config.upstream, "connected to upstream");

    let serve = serve(&config, server.clone());

    let result = tokio::select! {
        result = serve => result,
        _ = shutdown => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    };

    server.stop().await;
    result
}

async fn serve(config: &Config, server: Arc<Server>) -> Result<()> {
    let listener = &config.listener;
    let main_task = run_http_service(&listener.host, listener.port, server.clone());

    match &config.admin_listener {
        Some(admin_listener) => {
            let admin_service: AdminService<_, ApisonatorError> =
                AdminService::new(move || server.is_ready());
            let admin_task =
                run_http_service(&admin_listener.host, admin_listener.port, admin_service);
            tokio::try_join!(main_task, admin_task)?;
        }
        None => main_task.await?,
    }

    Ok(())
}
