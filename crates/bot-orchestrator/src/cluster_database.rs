use crate::aggregator::ClusterAggregator;
use crate::deal_store::DealStore;
use crate::error::Result;
use crate::pair_ledger::PairLedger;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// `SQLite` database holding observed deals and per-bot pair state.
///
/// The pool is shared by the [`DealStore`], [`PairLedger`] and
/// [`ClusterAggregator`] handles, which are cheap to clone.
#[derive(Debug, Clone)]
pub struct ClusterDatabase {
    pool: SqlitePool,
}

impl ClusterDatabase {
    /// Opens (creating if missing) the database at `database_url` and runs
    /// migrations.
    ///
    /// # Arguments
    ///
    /// * `database_url` - `SQLite` URL (e.g., `sqlite://data/deal_cluster.sqlite3`)
    /// * `max_connections` - Pool size
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReconcileError::StoreUnavailable`] if the connection
    /// or migrations fail.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Opened deal database at {}", database_url);
        Ok(Self { pool })
    }

    /// Creates an in-memory database.
    ///
    /// A single connection that never expires keeps the data alive for the
    /// lifetime of the pool.
    ///
    /// # Errors
    ///
    /// Returns error if connection fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    #[must_use]
    pub fn deal_store(&self) -> DealStore {
        DealStore::new(self.pool.clone())
    }

    #[must_use]
    pub fn pair_ledger(&self) -> PairLedger {
        PairLedger::new(self.pool.clone())
    }

    #[must_use]
    pub fn aggregator(&self) -> ClusterAggregator {
        ClusterAggregator::new(self.pool.clone())
    }

    /// Closes the pool, waiting for checked-out connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
