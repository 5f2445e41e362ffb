use anyhow::{Context, Result};
use axum::Router;
use std::{io::ErrorKind, path::Path};
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;

mod config;
mod context;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use crate::{
    config::AppConfig,
    context::AppContext,
    services::{datasource, fixtures},
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env_and_args()?;
    tracing::info!("Starting fixture-server with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)
            .await
            .with_context(|| format!("creating storage directory {}", cfg.storage_dir))?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Memory datasource ---
    tracing::debug!("Connecting to datasource {}", cfg.database_url);
    let db = datasource::connect(&cfg.database_url).await?;
    datasource::run_migrations(&db).await?;

    let ctx = AppContext::new(db, cfg.storage_dir.clone());
    if cfg.seed {
        fixtures::seed_widgets(&ctx.widgets).await?;
    }

    // --- Build routers ---
    let rest: Router = routes::routes::rest_routes().with_state(ctx);
    let remoting: Router = routes::routes::remoting_routes();

    // --- Start both servers ---
    let rest_listener = bind_listener(&cfg, cfg.addr(), cfg.port).await?;
    let remoting_listener = bind_listener(&cfg, cfg.remoting_addr(), cfg.remoting_port).await?;
    tracing::info!("REST server listening on http://{}", rest_listener.local_addr()?);
    tracing::info!(
        "Remoting server listening on http://{}",
        remoting_listener.local_addr()?
    );

    tokio::try_join!(
        async { axum::serve(rest_listener, rest).await.context("REST server failed") },
        async {
            axum::serve(remoting_listener, remoting)
                .await
                .context("remoting server failed")
        },
    )?;

    Ok(())
}

/// Bind `host:port`, falling back to loopback when a wildcard host is refused.
async fn bind_listener(cfg: &AppConfig, addr: String, port: u16) -> Result<TcpListener> {
    match TcpListener::bind(&addr).await {
        Ok(listener) => Ok(listener),
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            Ok(TcpListener::bind(&fallback_addr).await?)
        }
        Err(err) => Err(err).with_context(|| format!("binding {}", addr)),
    }
}
