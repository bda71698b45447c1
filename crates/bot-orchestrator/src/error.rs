//! Errors raised while reconciling a cluster.

use deal_cluster_core::{BotServiceError, ConfigError};
use thiserror::Error;

/// Failure taxonomy of a reconciliation cycle.
///
/// Only [`ReconcileError::StoreUnavailable`] aborts a cluster. Fetch and push
/// failures are confined to the bot they concern, and a
/// [`ReconcileError::ConfigInvalid`] cluster is skipped for the cycle.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("fetch failed: {0}")]
    FetchFailure(#[source] BotServiceError),

    #[error("push failed: {0}")]
    PushFailure(#[source] BotServiceError),

    #[error("deal store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(#[from] ConfigError),
}

impl From<sqlx::migrate::MigrateError> for ReconcileError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::StoreUnavailable(sqlx::Error::from(err))
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
