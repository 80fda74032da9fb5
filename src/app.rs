use std::{sync::Arc, time::Duration};

use tokio::{net::TcpListener, sync::watch};
use tracing::{error, info};

use crate::{
    api,
    db::{BootstrapError, ReadingSink, SchemaBootstrap},
    hubitat::DeviceSource,
    ingest::Poller,
};

/// How readings arrive once bootstrap is done.
pub enum Delivery {
    Pull {
        source: Arc<dyn DeviceSource>,
        interval: Duration,
        /// Run a single cycle and report its outcome instead of looping.
        once: bool,
    },
    Push {
        /// `host:port` for the event listener.
        bind_addr: String,
    },
}

/// What the process should report on exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// The one-shot pull cycle failed to fetch or write.
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("push listener failed: {0}")]
    Listener(#[from] std::io::Error),
}

/// Top-level driver: runs the schema bootstrap once, then hands over to the
/// selected delivery mode until it finishes or `shutdown` fires.
pub struct Orchestrator {
    bootstrap: Arc<dyn SchemaBootstrap>,
    sink: Arc<dyn ReadingSink>,
    delivery: Delivery,
}

impl Orchestrator {
    pub fn new(
        bootstrap: Arc<dyn SchemaBootstrap>,
        sink: Arc<dyn ReadingSink>,
        delivery: Delivery,
    ) -> Self {
        Self { bootstrap, sink, delivery }
    }

    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<RunOutcome, OrchestratorError> {
        // No "already bootstrapped" check: the bootstrap is idempotent and
        // runs on every start.
        self.bootstrap
            .bootstrap()
            .await
            .inspect_err(|e| error!(error = %e, "Schema bootstrap failed, stopping"))?;

        match self.delivery {
            Delivery::Pull { source, interval, once } => {
                let poller = Poller::new(source, self.sink, interval);
                if once {
                    info!("Running a single poll cycle");
                    return Ok(match poller.run_once().await {
                        Ok(_) => RunOutcome::Completed,
                        Err(_) => RunOutcome::Failed,
                    });
                }
                poller.run(shutdown).await;
                Ok(RunOutcome::Completed)
            }

            Delivery::Push { bind_addr } => {
                let listener = TcpListener::bind(&bind_addr).await?;
                info!(addr = %listener.local_addr()?, "Event listener started");
                serve(listener, self.sink, shutdown).await?;
                Ok(RunOutcome::Completed)
            }
        }
    }
}

async fn serve(
    listener: TcpListener,
    sink: Arc<dyn ReadingSink>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, api::router(sink))
        .with_graceful_shutdown(async move {
            // Either a `true` or a dropped sender ends the wait.
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;
    info!("Event listener stopped");
    Ok(())
}
