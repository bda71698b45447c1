//! Error types shared across the deal cluster crates.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file could not be read or did not match the expected shape.
    #[error("failed to load configuration: {0}")]
    Load(Box<figment::Error>),

    /// A process-wide setting is out of range.
    #[error("invalid setting `{key}`: {reason}")]
    InvalidSetting {
        /// Dotted key of the offending setting.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A cluster table is malformed; only that cluster is affected.
    #[error("invalid cluster `{cluster}`: {reason}")]
    InvalidCluster {
        /// Cluster name.
        cluster: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The template could not be written.
    #[error("failed to write configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn invalid_setting(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_cluster(cluster: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCluster {
            cluster: cluster.into(),
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

/// Errors reported by a [`crate::BotService`] implementation.
#[derive(Debug, Error)]
pub enum BotServiceError {
    /// The bot snapshot could not be fetched.
    #[error(
        "error occurred reading bot {bot_id}: {}",
        .message.as_deref().unwrap_or("no details returned")
    )]
    Query {
        /// Bot that was queried.
        bot_id: i64,
        /// Message from the service, when it sent one.
        message: Option<String>,
    },

    /// The new pair list was not accepted.
    #[error("error occurred updating bot {bot_id}: {message}")]
    Update {
        /// Bot that was updated.
        bot_id: i64,
        /// Failure description.
        message: String,
    },
}

impl BotServiceError {
    pub fn query(bot_id: i64, message: Option<String>) -> Self {
        Self::Query { bot_id, message }
    }

    pub fn update(bot_id: i64, message: impl Into<String>) -> Self {
        Self::Update {
            bot_id,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_error_uses_service_message() {
        let err = BotServiceError::query(42, Some("Not Found".to_string()));
        let display = err.to_string();
        assert!(display.contains("42"));
        assert!(display.contains("Not Found"));
    }

    #[test]
    fn query_error_without_message_is_generic() {
        let err = BotServiceError::query(7, None);
        assert!(err.to_string().contains("no details returned"));
        assert!(matches!(err, BotServiceError::Query { bot_id: 7, message: None }));
    }

    #[test]
    fn invalid_cluster_names_cluster() {
        let err = ConfigError::invalid_cluster("cluster_a", "botids is empty");
        assert!(err.to_string().contains("cluster_a"));
        assert!(err.to_string().contains("botids is empty"));
    }
}
