use std::{process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use hubitat_agent::{
    app::{Delivery, Orchestrator, RunOutcome},
    config::{Config, Mode},
    db::{self, PgBootstrap, PgReadingSink},
    hubitat::HubClient,
};
use tokio::{signal, sync::watch};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("invalid configuration")?;

    // RUST_LOG wins; otherwise info, or debug with HUBITAT_DEBUG
    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    info!(mode = %config.mode, debug = config.debug, "Starting hubitat agent");

    // Resolve the hub endpoint before touching the database so a bad hub
    // configuration fails fast.
    let delivery = match config.mode {
        Mode::Pull => {
            let hub = HubClient::new(&config.hub, config.hub_timeout)
                .context("invalid hub configuration")?;
            info!(
                url = %hub.endpoint_for_display(),
                interval_secs = config.poll_interval.as_secs(),
                run_once = config.run_once,
                "Pull mode"
            );
            Delivery::Pull {
                source: Arc::new(hub),
                interval: config.poll_interval,
                once: config.run_once,
            }
        }
        Mode::Push => Delivery::Push {
            bind_addr: config.server_addr(),
        },
    };

    let pool = db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("failed to connect to the database")?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    let orchestrator = Orchestrator::new(
        Arc::new(PgBootstrap::new(pool.clone())),
        Arc::new(PgReadingSink::new(pool)),
        delivery,
    );

    match orchestrator.run(stop_rx).await? {
        RunOutcome::Completed => Ok(ExitCode::SUCCESS),
        RunOutcome::Failed => Ok(ExitCode::FAILURE),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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
