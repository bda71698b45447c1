//! Periodic cycle over every configured cluster.

use crate::engine::{ClusterContext, ClusterReport, ReconciliationEngine};
use crate::error::ReconcileError;
use deal_cluster_core::{AppConfig, ConfigLoader};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;

/// Outcome of one cycle across all clusters.
#[derive(Debug, Default)]
pub struct CycleSummary {
    pub reports: Vec<ClusterReport>,
    /// Clusters whose configuration was rejected.
    pub skipped: Vec<String>,
    /// Clusters aborted by a store failure.
    pub failed: Vec<String>,
    /// False when the configuration file could not be reloaded at all.
    pub config_loaded: bool,
}

/// Reloads the configuration and reconciles each cluster, once per interval.
///
/// Errors never end the loop: an invalid cluster is skipped, a store failure
/// aborts only that cluster, and an unreadable configuration skips the
/// cycle. Only the shutdown signal stops it, and only between cycles.
pub struct ClusterScheduler {
    config_path: PathBuf,
    engine: ReconciliationEngine,
    interval: Duration,
}

impl ClusterScheduler {
    /// Creates a scheduler; `initial` provides the interval used until the
    /// first reload.
    #[must_use]
    pub fn new(config_path: impl Into<PathBuf>, engine: ReconciliationEngine, initial: &AppConfig) -> Self {
        Self {
            config_path: config_path.into(),
            engine: engine.with_pruning(initial.settings.prune_inactive_deals),
            interval: initial.settings.interval(),
        }
    }

    /// Current wait between cycles.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub const fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    /// Runs a single cycle over all clusters in configuration order.
    pub async fn run_cycle(&mut self) -> CycleSummary {
        let mut summary = CycleSummary::default();

        let config = match ConfigLoader::load_from(&self.config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Skipping cycle, configuration could not be reloaded: {}", e);
                return summary;
            }
        };
        summary.config_loaded = true;
        self.interval = config.settings.interval();
        self.engine.set_pruning(config.settings.prune_inactive_deals);

        for (name, parsed) in config.clusters() {
            let cluster = match parsed {
                Ok(cluster) => cluster,
                Err(e) => {
                    let err = ReconcileError::ConfigInvalid(e);
                    tracing::error!("Skipping cluster '{}': {}", name, err);
                    summary.skipped.push(name);
                    continue;
                }
            };

            let ctx = ClusterContext::new(name.clone(), &cluster);
            match self.engine.reconcile_cluster(&ctx).await {
                Ok(report) => summary.reports.push(report),
                Err(e) => {
                    tracing::error!("Cluster '{}' aborted, retrying next cycle: {}", name, e);
                    summary.failed.push(name);
                }
            }
        }

        summary
    }

    /// Runs cycles until `shutdown` turns true or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let summary = self.run_cycle().await;
            tracing::info!(
                "Cycle finished: {} cluster(s) reconciled, {} skipped, {} failed; next run in {}s",
                summary.reports.len(),
                summary.skipped.len(),
                summary.failed.len(),
                self.interval.as_secs()
            );

            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                () = stop_requested(&mut shutdown) => break,
            }
        }

        tracing::info!("Cluster scheduler stopped");
    }
}

async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also ends the wait.
    let _ = shutdown.wait_for(|stop| *stop).await;
}
