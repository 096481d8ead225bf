//! # courierd
//!
//! Courier push server binary: loads settings, starts the listener and the
//! optional admin endpoint, and stops gracefully on ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use courier_server::admin::{self, AdminState};
use courier_server::{DrainHandler, ServerConfig, ServerLifecycle};
use courier_settings::CourierSettings;
use tokio_util::sync::CancellationToken;

/// Courier push server.
#[derive(Parser, Debug)]
#[command(name = "courierd", about = "Courier push server")]
struct Cli {
    /// Settings file (defaults to `~/.courier/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Port for `/health` and `/metrics` (overrides settings).
    #[arg(long)]
    admin_port: Option<u16>,

    /// Log filter, e.g. `debug` or `courier_server=trace` (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn load_settings(&self) -> Result<CourierSettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(courier_settings::settings_path);
        let mut settings = courier_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        self.apply(&mut settings);
        settings.validate().context("Invalid command-line overrides")?;
        Ok(settings)
    }

    fn apply(&self, settings: &mut CourierSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(admin_port) = self.admin_port {
            settings.server.admin_port = Some(admin_port);
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.load_settings()?;

    courier_logging::init_subscriber(&settings.logging.level, settings.logging.format);

    let metrics = match courier_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder unavailable");
            None
        }
    };

    let config = ServerConfig::from(&settings.server);
    let lifecycle = Arc::new(ServerLifecycle::new(config.clone(), Arc::new(DrainHandler)));

    let addr = lifecycle
        .start()
        .await
        .with_context(|| format!("Failed to start listener on port {}", config.port))?;
    tracing::info!(%addr, "courierd started");

    let admin_shutdown = CancellationToken::new();
    let admin_task = match config.admin_port {
        Some(admin_port) => {
            let listener =
                match tokio::net::TcpListener::bind((config.host.as_str(), admin_port)).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        lifecycle.stop().await;
                        return Err(e).with_context(|| format!("Failed to bind admin port {admin_port}"));
                    }
                };
            let state = AdminState::new(Arc::clone(&lifecycle), metrics);
            Some(tokio::spawn(admin::serve(
                listener,
                state,
                admin_shutdown.clone(),
            )))
        }
        None => None,
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    lifecycle.stop().await;

    admin_shutdown.cancel();
    if let Some(task) = admin_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "admin server exited with error"),
            Err(e) => tracing::warn!(error = %e, "admin server task failed"),
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
