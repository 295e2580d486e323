use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use rbacsync_core::SyncConfig;
use rbacsync_sync::{resolver, Counters, CyclePlan, CycleReport, KubeStore, Reconciler};

use crate::error::{io_err, DaemonError};
use crate::http::{self, HttpState};
use crate::status::{DaemonStatus, SharedStatus};

/// Start the daemon and block the current thread until it exits.
pub fn start_blocking(config: SyncConfig, log_json: bool) -> Result<(), DaemonError> {
    init_tracing(log_json);
    block_on(run(config))
}

/// Run a single reconciliation cycle against the configured cluster.
pub fn sync_blocking(config: SyncConfig) -> Result<CycleReport, DaemonError> {
    block_on(async move {
        config.validate()?;
        let reconciler = build_reconciler(&config, Arc::new(Counters::new()?)).await?;
        Ok(reconciler.run_cycle().await?)
    })
}

/// Compute what a cycle would change without mutating anything.
pub fn plan_blocking(config: SyncConfig) -> Result<CyclePlan, DaemonError> {
    block_on(async move {
        config.validate()?;
        let reconciler = build_reconciler(&config, Arc::new(Counters::new()?)).await?;
        Ok(reconciler.plan_cycle().await?)
    })
}

fn block_on<T>(
    future: impl std::future::Future<Output = Result<T, DaemonError>>,
) -> Result<T, DaemonError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio runtime", e))?;
    runtime.block_on(future)
}

/// Wire the production store and directory into a reconciler.
pub async fn build_reconciler(
    config: &SyncConfig,
    counters: Arc<Counters>,
) -> Result<Reconciler, DaemonError> {
    let store = KubeStore::connect(config.kubeconfig.as_deref()).await?;
    let resolver = resolver::from_source(&config.directory)?;
    Ok(Reconciler::new(
        Arc::new(store),
        resolver,
        counters,
        config.defaults.clone(),
    ))
}

/// Run the daemon: scheduler, HTTP surface and signal handler.
pub async fn run(config: SyncConfig) -> Result<(), DaemonError> {
    config.validate()?;

    let counters = Arc::new(Counters::new()?);
    let reconciler = build_reconciler(&config, counters.clone()).await?;
    let status = DaemonStatus::shared(Utc::now());

    tracing::info!(
        interval_secs = config.update_interval.as_secs(),
        bind_address = %config.bind_address,
        "starting rbac-sync daemon"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let scheduler_handle = {
        let shutdown = shutdown_tx.clone();
        let status = status.clone();
        let interval = config.update_interval;
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = scheduler_task(reconciler, interval, status, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let http_handle = {
        let shutdown = shutdown_tx.clone();
        let state = HttpState {
            counters: counters.clone(),
            status: status.clone(),
        };
        let addr = config.bind_address;
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = http::serve(addr, state, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok::<(), DaemonError>(()),
                signal = wait_for_signal() => {
                    let name = signal?;
                    tracing::info!(signal = name, "received signal, shutting down");
                    let _ = shutdown.send(());
                    Ok(())
                }
            }
        })
    };

    let (scheduler_result, http_result, signal_result) =
        tokio::join!(scheduler_handle, http_handle, signal_handle);

    handle_join("scheduler", scheduler_result)?;
    handle_join("http_server", http_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("rbac-sync daemon stopped");
    Ok(())
}

/// One cycle, then sleep, until shutdown. A cycle in flight always finishes;
/// shutdown is only observed while sleeping.
async fn scheduler_task(
    reconciler: Reconciler,
    interval: Duration,
    status: SharedStatus,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        match reconciler.run_cycle().await {
            Ok(report) => status.write().await.record_report(report),
            Err(error) => {
                tracing::error!(%error, "reconciliation cycle aborted");
                status
                    .write()
                    .await
                    .record_abort(Utc::now(), error.to_string());
            }
        }

        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str, DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).map_err(|e| io_err("SIGTERM handler", e))?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.map_err(|e| io_err("ctrl-c handler", e))?;
            Ok("ctrl-c")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str, DaemonError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| io_err("ctrl-c handler", e))?;
    Ok("ctrl-c")
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Task {
            task,
            reason: err.to_string(),
        }),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info`
/// level. Logs go to stderr so command output on stdout stays parseable.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
