use clap::{Parser, Subcommand};
use deal_cluster_core::{AppConfig, ConfigError, ConfigLoader, DEFAULT_CONFIG_PATH};
use std::path::{Path, PathBuf};

mod commands;

#[derive(Parser)]
#[command(name = "deal-cluster")]
#[command(
    about = "Limits how many bots of a 3Commas cluster hold deals on the same pair",
    long_about = None
)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Optional log file path (logs to file instead of stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile all clusters every `timeinterval` seconds until stopped
    Run,
    /// Reconcile all clusters once and exit
    Once,
    /// Write an example config file
    Init,
    /// Show stored pair states and active deal counts
    Status {
        /// Only show this cluster
        #[arg(long)]
        cluster: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_file = cli.log_file.as_deref();

    if matches!(cli.command, Commands::Init) {
        init_logging(false, log_file)?;
        ConfigLoader::write_template(&cli.config)?;
        tracing::info!("Wrote example config to {}", cli.config.display());
        return Ok(());
    }

    let Some(config) = prepare(&cli.config, log_file)? else {
        return Ok(());
    };

    match cli.command {
        Commands::Run => commands::run(&cli.config, &config).await?,
        Commands::Once => commands::once(&cli.config, &config).await?,
        Commands::Status { cluster } => commands::status(&config, cluster.as_deref()).await?,
        Commands::Init => {}
    }

    Ok(())
}

/// Loads the config and installs logging.
///
/// Returns `None` when the file did not exist: a template is written in its
/// place and the program should stop.
fn prepare(config_path: &Path, log_file: Option<&Path>) -> anyhow::Result<Option<AppConfig>> {
    match ConfigLoader::load_from(config_path) {
        Ok(config) => {
            init_logging(config.settings.debug, log_file)?;
            Ok(Some(config))
        }
        Err(ConfigError::NotFound(path)) => {
            init_logging(false, log_file)?;
            ConfigLoader::write_template(&path)?;
            tracing::info!(
                "Created example config file {}, edit it and restart the program",
                path.display()
            );
            Ok(None)
        }
        Err(e) => {
            init_logging(false, log_file)?;
            Err(e.into())
        }
    }
}

fn init_logging(debug: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter(debug)));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

const fn default_filter(debug: bool) -> &'static str {
    if debug {
        "debug,sqlx=warn,hyper_util=info"
    } else {
        "info"
    }
}
