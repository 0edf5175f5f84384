//! SkillShare authentication server.
//!
//! Serves the `skillshare-axum` routes over a SQLite database. Configuration
//! comes from flags or the environment; see `--help`.

mod config;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use skillshare::{LogResetTokenSender, SkillShareBuilder};
use skillshare_axum::CookieConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,skillshare=debug")),
        )
        .init();

    let config = ServerConfig::parse();
    config.validate()?;
    info!(?config, "Starting SkillShare auth server");

    let skillshare = SkillShareBuilder::new()
        .with_sqlite(&config.database_url)
        .await
        .with_context(|| format!("Failed to open {}", config.database_url))?
        .with_jwt(config.jwt_config()?)
        .with_lockout_config(config.lockout_config()?)
        .with_reset_sender(Arc::new(LogResetTokenSender::new(&config.reset_url_base)))
        .apply_migrations(true)
        .build()
        .await?;
    info!("Database migrations completed");

    let cookie_config = if config.insecure_cookies {
        CookieConfig::development()
    } else {
        CookieConfig::default()
    };

    let auth_routes = skillshare_axum::routes(Arc::new(skillshare))
        .with_cookie_config(cookie_config)
        .build();
    let app = Router::new().nest(&config.base_path, auth_routes);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    info!("Listening on http://{}{}", config.bind, config.base_path);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
