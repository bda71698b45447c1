use crate::error::ConfigError;
use figment::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub threecommas: ThreeCommasConfig,
    /// Cluster tables keyed by cluster name, kept raw so that each one is
    /// validated on its own by [`AppConfig::clusters`].
    #[serde(default)]
    pub clusters: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Seconds between two reconciliation cycles.
    #[serde(default = "default_time_interval")]
    pub timeinterval: u64,
    #[serde(default)]
    pub debug: bool,
    /// Delete a bot's inactive deals before recording its next snapshot.
    #[serde(default)]
    pub prune_inactive_deals: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ThreeCommasConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// A validated cluster table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(rename = "botids")]
    pub bot_ids: Vec<i64>,
    #[serde(rename = "max-same-deals")]
    pub max_same_deals: u32,
}

const fn default_time_interval() -> u64 {
    86_400
}

fn default_database_url() -> String {
    "sqlite://data/deal_cluster.sqlite3".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

fn default_api_url() -> String {
    "https://api.3commas.io".to_string()
}

const fn default_requests_per_minute() -> u32 {
    60
}

const fn default_timeout_secs() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeinterval: default_time_interval(),
            debug: false,
            prune_inactive_deals: false,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for ThreeCommasConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            api_secret: String::new(),
            requests_per_minute: default_requests_per_minute(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Settings {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.timeinterval)
    }
}

impl AppConfig {
    /// Checks the process-wide settings. Cluster tables are not checked here.
    ///
    /// # Errors
    ///
    /// Returns an error if a global setting is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.timeinterval == 0 {
            return Err(ConfigError::invalid_setting(
                "settings.timeinterval",
                "must be at least 1 second",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid_setting(
                "database.max-connections",
                "must be at least 1",
            ));
        }
        if self.threecommas.requests_per_minute == 0 {
            return Err(ConfigError::invalid_setting(
                "threecommas.requests-per-minute",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Parses and validates every cluster table, in name order.
    ///
    /// A malformed table yields an `Err` for that cluster only.
    #[must_use]
    pub fn clusters(&self) -> Vec<(String, Result<ClusterConfig, ConfigError>)> {
        self.clusters
            .iter()
            .map(|(name, raw)| {
                let parsed = raw
                    .deserialize::<ClusterConfig>()
                    .map_err(|e| ConfigError::invalid_cluster(name, e.to_string()))
                    .and_then(|cluster| cluster.validate(name).map(|()| cluster));
                (name.clone(), parsed)
            })
            .collect()
    }
}

impl ClusterConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidCluster` if the threshold is below 1 or
    /// the bot id list is empty, non-positive, or contains duplicates.
    pub fn validate(&self, cluster: &str) -> Result<(), ConfigError> {
        if self.max_same_deals < 1 {
            return Err(ConfigError::invalid_cluster(
                cluster,
                "max-same-deals must be at least 1",
            ));
        }
        if self.bot_ids.is_empty() {
            return Err(ConfigError::invalid_cluster(cluster, "botids is empty"));
        }
        if let Some(id) = self.bot_ids.iter().find(|id| **id <= 0) {
            return Err(ConfigError::invalid_cluster(
                cluster,
                format!("bot id {id} is not a positive integer"),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(id) = self.bot_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(ConfigError::invalid_cluster(
                cluster,
                format!("bot id {id} is listed more than once"),
            ));
        }
        Ok(())
    }
}
