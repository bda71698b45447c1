use super::ensure_database_dir;
use deal_cluster_core::AppConfig;
use deal_cluster_orchestrator::{ClusterDatabase, ClusterScheduler, ReconciliationEngine};
use deal_cluster_threecommas::ThreeCommasClient;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

async fn build_scheduler(config_path: &Path, config: &AppConfig) -> anyhow::Result<ClusterScheduler> {
    ensure_database_dir(&config.database.url)?;
    let database = ClusterDatabase::new(&config.database.url, config.database.max_connections).await?;
    let client = ThreeCommasClient::from_config(&config.threecommas)?;
    let engine = ReconciliationEngine::new(database, Arc::new(client));

    Ok(ClusterScheduler::new(config_path, engine, config))
}

/// Runs reconciliation cycles until SIGINT or SIGTERM.
///
/// The signal is honoured once the running cycle has finished.
pub async fn run(config_path: &Path, config: &AppConfig) -> anyhow::Result<()> {
    tracing::info!(
        "Starting deal cluster daemon with config: {}",
        config_path.display()
    );

    let scheduler = build_scheduler(config_path, config).await?;
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(stop_rx));

    shutdown_signal().await?;

    // The scheduler may already have exited, in which case nobody listens.
    let _ = stop_tx.send(true);
    handle.await?;

    tracing::info!("Deal cluster daemon stopped");
    Ok(())
}

/// Runs a single cycle.
///
/// # Errors
///
/// Fails if the configuration cannot be reloaded or a cluster was aborted by
/// a store failure. Skipped clusters and bots are only logged.
pub async fn once(config_path: &Path, config: &AppConfig) -> anyhow::Result<()> {
    let mut scheduler = build_scheduler(config_path, config).await?;
    let summary = scheduler.run_cycle().await;
    scheduler.engine().database().close().await;

    if !summary.config_loaded {
        anyhow::bail!("configuration could not be reloaded from {}", config_path.display());
    }
    if !summary.failed.is_empty() {
        anyhow::bail!("cluster(s) aborted: {}", summary.failed.join(", "));
    }

    tracing::info!(
        "Reconciled {} cluster(s), skipped {}",
        summary.reports.len(),
        summary.skipped.len()
    );
    Ok(())
}

async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, stopping after the current cycle");
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Received SIGINT (Ctrl+C), stopping after the current cycle");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C, stopping after the current cycle");
    }

    Ok(())
}
