pub mod bot;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod traits;

pub use bot::{BotId, BotSnapshot, DealId, DealSnapshot};
pub use config::{AppConfig, ClusterConfig, DatabaseConfig, Settings, ThreeCommasConfig};
pub use config_loader::{ConfigLoader, CONFIG_TEMPLATE, DEFAULT_CONFIG_PATH, ENV_PREFIX};
pub use error::{BotServiceError, ConfigError};
pub use traits::BotService;
