use crate::error::Result;
use sqlx::sqlite::SqlitePool;
use std::collections::BTreeMap;

/// Active deal count per pair, keyed by pair name.
pub type PairUsage = BTreeMap<String, u32>;

/// Cluster-wide view over the deal store.
#[derive(Debug, Clone)]
pub struct ClusterAggregator {
    pool: SqlitePool,
}

impl ClusterAggregator {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Counts the active deals of `cluster_id` per pair.
    ///
    /// Pairs without an active deal are absent from the result. Deals of
    /// other clusters never contribute.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn compute_usage(&self, cluster_id: &str) -> Result<PairUsage> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r"
            SELECT pair, COUNT(deal_id)
            FROM deals
            WHERE cluster_id = ?1 AND active = 1
            GROUP BY pair
            ",
        )
        .bind(cluster_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(pair, count)| (pair, u32::try_from(count).unwrap_or(u32::MAX)))
            .collect())
    }
}
