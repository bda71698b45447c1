use crate::config::AppConfig;
use crate::error::ConfigError;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/deal_cluster.toml";

/// Prefix for environment overrides. Nested keys are separated by `__` and
/// single underscores stand for dashes, e.g. `DEAL_CLUSTER_THREECOMMAS__API_KEY`.
pub const ENV_PREFIX: &str = "DEAL_CLUSTER_";

/// Template written when no configuration exists yet.
pub const CONFIG_TEMPLATE: &str = r#"# DCA deal cluster configuration.
# Reloaded at the start of every cycle, so cluster edits apply without a restart.

[settings]
# Seconds between reconciliation cycles.
timeinterval = 86400
debug = false
# Delete a bot's closed deals instead of keeping them for audit.
prune-inactive-deals = false

[database]
url = "sqlite://data/deal_cluster.sqlite3"
max-connections = 5

[threecommas]
api-url = "https://api.3commas.io"
api-key = "Your 3Commas API Key"
api-secret = "Your 3Commas API Secret"
requests-per-minute = 60
timeout-secs = 30

# One table per cluster. A pair is disabled for every bot in the cluster once
# `max-same-deals` of its deals are active.
[clusters.default]
botids = [12345, 67890]
max-same-deals = 1
"#;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by merging the TOML file with environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, cannot be parsed, or a global
    /// setting is invalid.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let config: AppConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .split("__")
                    .map(|key| key.as_str().replace('_', "-").into()),
            )
            .extract()?;

        config.validate()?;
        tracing::debug!(
            "Loaded configuration from {} ({} cluster(s))",
            path.display(),
            config.clusters.len()
        );
        Ok(config)
    }

    /// Writes [`CONFIG_TEMPLATE`] to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file already exists or cannot be written.
    pub fn write_template(path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(CONFIG_TEMPLATE.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn template_round_trips_through_loader() {
        Jail::expect_with(|jail| {
            jail.create_file("deal_cluster.toml", CONFIG_TEMPLATE)?;

            let config = ConfigLoader::load_from("deal_cluster.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.settings.timeinterval, 86_400);
            assert_eq!(config.threecommas.api_key, "Your 3Commas API Key");

            let clusters = config.clusters();
            assert_eq!(clusters.len(), 1);
            let cluster = clusters[0].1.as_ref().map_err(|e| e.to_string())?;
            assert_eq!(cluster.bot_ids, vec![12345, 67890]);
            assert_eq!(cluster.max_same_deals, 1);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("deal_cluster.toml", CONFIG_TEMPLATE)?;
            jail.set_env("DEAL_CLUSTER_SETTINGS__TIMEINTERVAL", "60");
            jail.set_env("DEAL_CLUSTER_THREECOMMAS__API_SECRET", "from-env");

            let config = ConfigLoader::load_from("deal_cluster.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.settings.timeinterval, 60);
            assert_eq!(config.threecommas.api_secret, "from-env");
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_reported() {
        Jail::expect_with(|_jail| {
            let err = ConfigLoader::load_from("absent.toml").unwrap_err();
            assert!(matches!(err, ConfigError::NotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn bad_cluster_leaves_file_loadable() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "deal_cluster.toml",
                r#"
                [settings]
                timeinterval = 120

                [clusters.broken]
                botids = "12345"
                max-same-deals = 1

                [clusters.fine]
                botids = [1, 2, 3]
                max-same-deals = 2
                "#,
            )?;

            let config = ConfigLoader::load_from("deal_cluster.toml").map_err(|e| e.to_string())?;
            let clusters = config.clusters();
            assert_eq!(clusters[0].0, "broken");
            assert!(clusters[0].1.is_err());
            assert_eq!(clusters[1].0, "fine");
            assert!(clusters[1].1.is_ok());
            Ok(())
        });
    }

    #[test]
    fn write_template_refuses_to_overwrite() {
        Jail::expect_with(|_jail| {
            ConfigLoader::write_template("config/deal_cluster.toml").map_err(|e| e.to_string())?;
            assert!(Path::new("config/deal_cluster.toml").exists());
            assert!(ConfigLoader::write_template("config/deal_cluster.toml").is_err());
            Ok(())
        });
    }
}
