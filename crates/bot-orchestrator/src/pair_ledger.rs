//! Per-bot allowed pairs within a cluster, each with an enabled flag.

use crate::error::Result;
use deal_cluster_core::BotId;
use sqlx::sqlite::SqlitePool;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::BTreeSet;

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PairEntry {
    pub cluster_id: String,
    pub bot_id: BotId,
    pub pair: String,
    pub enabled: bool,
    /// Position in which the bot first reported the pair.
    pub insertion_order: i64,
}

/// Rows added and removed by [`PairLedger::assert_candidate_pairs`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerChange {
    pub added: usize,
    pub removed: usize,
}

#[derive(Debug, Clone)]
pub struct PairLedger {
    pool: SqlitePool,
}

impl PairLedger {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Makes the ledger for `(cluster_id, bot_id)` hold exactly `pairs`.
    ///
    /// Pairs not yet present are appended, in the given order, as enabled.
    /// Existing entries keep their enabled flag and position. Enabled entries
    /// no longer among `pairs` are removed. Disabled entries are kept even
    /// when the bot stops listing them: the bot service only holds the pairs
    /// last pushed, so a disabled pair has to stay here to be pushed back
    /// once it is enabled again.
    ///
    /// # Errors
    ///
    /// Returns error if the transaction fails; the ledger is unchanged then.
    pub async fn assert_candidate_pairs(
        &self,
        cluster_id: &str,
        bot_id: BotId,
        pairs: &[String],
    ) -> Result<LedgerChange> {
        let mut change = LedgerChange::default();
        let mut tx = self.pool.begin().await?;

        for pair in pairs {
            let result = sqlx::query(
                r"
                INSERT INTO bot_pairs (cluster_id, bot_id, pair, enabled)
                VALUES (?1, ?2, ?3, 1)
                ON CONFLICT(cluster_id, bot_id, pair) DO NOTHING
                ",
            )
            .bind(cluster_id)
            .bind(bot_id)
            .bind(pair)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                tracing::debug!("Added pair {} for bot {} in cluster '{}'", pair, bot_id, cluster_id);
                change.added += 1;
            }
        }

        let mut stale = QueryBuilder::<Sqlite>::new("DELETE FROM bot_pairs WHERE cluster_id = ");
        stale.push_bind(cluster_id);
        stale.push(" AND bot_id = ");
        stale.push_bind(bot_id);
        stale.push(" AND enabled = 1");
        if !pairs.is_empty() {
            stale.push(" AND pair NOT IN (");
            let mut list = stale.separated(", ");
            for pair in pairs {
                list.push_bind(pair.as_str());
            }
            list.push_unseparated(")");
        }

        let removed = stale.build().execute(&mut *tx).await?.rows_affected();
        change.removed = usize::try_from(removed).unwrap_or(usize::MAX);

        tx.commit().await?;

        if change.removed > 0 {
            tracing::info!(
                "Bot {} in cluster '{}': dropped {} pair(s) it no longer trades",
                bot_id,
                cluster_id,
                change.removed
            );
        }

        Ok(change)
    }

    /// Sets the enabled flag on every entry of the cluster whose pair is in
    /// `pairs`, across all bots. Returns how many entries actually flipped.
    ///
    /// An empty set is a no-op.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    pub async fn set_enabled(
        &self,
        cluster_id: &str,
        pairs: &BTreeSet<String>,
        enabled: bool,
    ) -> Result<u64> {
        if pairs.is_empty() {
            return Ok(0);
        }

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE bot_pairs SET enabled = ");
        query.push_bind(enabled);
        query.push(" WHERE cluster_id = ");
        query.push_bind(cluster_id);
        query.push(" AND enabled <> ");
        query.push_bind(enabled);
        query.push(" AND pair IN (");
        let mut list = query.separated(", ");
        for pair in pairs {
            list.push_bind(pair.as_str());
        }
        list.push_unseparated(")");

        let flipped = query.build().execute(&self.pool).await?.rows_affected();
        Ok(flipped)
    }

    /// Enabled pairs of a bot in the order the bot first reported them.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn enabled_pairs_for(&self, cluster_id: &str, bot_id: BotId) -> Result<Vec<String>> {
        let pairs = sqlx::query_scalar::<_, String>(
            r"
            SELECT pair FROM bot_pairs
            WHERE cluster_id = ?1 AND bot_id = ?2 AND enabled = 1
            ORDER BY insertion_order ASC
            ",
        )
        .bind(cluster_id)
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(pairs)
    }

    /// Distinct pairs held by any bot of the cluster.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn tracked_pairs(&self, cluster_id: &str) -> Result<BTreeSet<String>> {
        let pairs = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT pair FROM bot_pairs WHERE cluster_id = ?1",
        )
        .bind(cluster_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(pairs.into_iter().collect())
    }

    /// All entries of a bot, enabled or not, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn entries_for(&self, cluster_id: &str, bot_id: BotId) -> Result<Vec<PairEntry>> {
        let entries = sqlx::query_as::<_, PairEntry>(
            r"
            SELECT cluster_id, bot_id, pair, enabled, insertion_order
            FROM bot_pairs
            WHERE cluster_id = ?1 AND bot_id = ?2
            ORDER BY insertion_order ASC
            ",
        )
        .bind(cluster_id)
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use crate::ClusterDatabase;
    use std::collections::BTreeSet;

    fn pairs(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn set(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn candidates_are_added_enabled_in_order() {
        let db = ClusterDatabase::in_memory().await.unwrap();
        let ledger = db.pair_ledger();

        let change = ledger
            .assert_candidate_pairs("c1", 1, &pairs(&["USDT_ETH", "USDT_BTC", "USDT_ADA"]))
            .await
            .unwrap();
        assert_eq!(change.added, 3);
        assert_eq!(
            ledger.enabled_pairs_for("c1", 1).await.unwrap(),
            vec!["USDT_ETH", "USDT_BTC", "USDT_ADA"]
        );
    }

    #[tokio::test]
    async fn reasserting_keeps_flags_and_order() {
        let db = ClusterDatabase::in_memory().await.unwrap();
        let ledger = db.pair_ledger();
        let candidates = pairs(&["USDT_ETH", "USDT_BTC"]);

        ledger.assert_candidate_pairs("c1", 1, &candidates).await.unwrap();
        ledger.set_enabled("c1", &set(&["USDT_ETH"]), false).await.unwrap();

        let change = ledger.assert_candidate_pairs("c1", 1, &candidates).await.unwrap();
        assert_eq!(change, super::LedgerChange::default());

        let entries = ledger.entries_for("c1", 1).await.unwrap();
        assert_eq!(entries[0].pair, "USDT_ETH");
        assert!(!entries[0].enabled);
        assert!(entries[1].enabled);
    }

    #[tokio::test]
    async fn dropped_candidates_are_removed() {
        let db = ClusterDatabase::in_memory().await.unwrap();
        let ledger = db.pair_ledger();

        ledger
            .assert_candidate_pairs("c1", 1, &pairs(&["USDT_ETH", "USDT_BTC"]))
            .await
            .unwrap();
        let change = ledger
            .assert_candidate_pairs("c1", 1, &pairs(&["USDT_BTC", "USDT_SOL"]))
            .await
            .unwrap();

        assert_eq!(change.added, 1);
        assert_eq!(change.removed, 1);
        assert_eq!(
            ledger.enabled_pairs_for("c1", 1).await.unwrap(),
            vec!["USDT_BTC", "USDT_SOL"]
        );
    }

    #[tokio::test]
    async fn disabled_pairs_survive_when_bot_stops_listing_them() {
        let db = ClusterDatabase::in_memory().await.unwrap();
        let ledger = db.pair_ledger();

        ledger
            .assert_candidate_pairs("c1", 1, &pairs(&["USDT_BTC", "USDT_ETH", "USDT_SOL"]))
            .await
            .unwrap();
        ledger.set_enabled("c1", &set(&["USDT_BTC"]), false).await.unwrap();

        // The service now only lists what was last pushed.
        let change = ledger
            .assert_candidate_pairs("c1", 1, &pairs(&["USDT_ETH"]))
            .await
            .unwrap();
        assert_eq!(change.removed, 1);

        let entries = ledger.entries_for("c1", 1).await.unwrap();
        let kept: Vec<_> = entries.iter().map(|e| (e.pair.as_str(), e.enabled)).collect();
        assert_eq!(kept, vec![("USDT_BTC", false), ("USDT_ETH", true)]);
        assert_eq!(ledger.tracked_pairs("c1").await.unwrap(), set(&["USDT_BTC", "USDT_ETH"]));

        ledger.set_enabled("c1", &set(&["USDT_BTC"]), true).await.unwrap();
        assert_eq!(
            ledger.enabled_pairs_for("c1", 1).await.unwrap(),
            vec!["USDT_BTC", "USDT_ETH"]
        );
    }

    #[tokio::test]
    async fn set_enabled_spans_bots_but_not_clusters() {
        let db = ClusterDatabase::in_memory().await.unwrap();
        let ledger = db.pair_ledger();
        let candidates = pairs(&["USDT_ETH", "USDT_BTC"]);

        ledger.assert_candidate_pairs("c1", 1, &candidates).await.unwrap();
        ledger.assert_candidate_pairs("c1", 2, &candidates).await.unwrap();
        ledger.assert_candidate_pairs("c2", 1, &candidates).await.unwrap();

        let flipped = ledger.set_enabled("c1", &set(&["USDT_BTC"]), false).await.unwrap();
        assert_eq!(flipped, 2);

        assert_eq!(ledger.enabled_pairs_for("c1", 1).await.unwrap(), vec!["USDT_ETH"]);
        assert_eq!(ledger.enabled_pairs_for("c1", 2).await.unwrap(), vec!["USDT_ETH"]);
        assert_eq!(
            ledger.enabled_pairs_for("c2", 1).await.unwrap(),
            vec!["USDT_ETH", "USDT_BTC"]
        );
    }

    #[tokio::test]
    async fn set_enabled_counts_only_real_flips() {
        let db = ClusterDatabase::in_memory().await.unwrap();
        let ledger = db.pair_ledger();
        ledger
            .assert_candidate_pairs("c1", 1, &pairs(&["USDT_ETH", "USDT_BTC"]))
            .await
            .unwrap();

        assert_eq!(ledger.set_enabled("c1", &set(&["USDT_ETH"]), true).await.unwrap(), 0);
        assert_eq!(ledger.set_enabled("c1", &BTreeSet::new(), false).await.unwrap(), 0);
        assert_eq!(ledger.set_enabled("c1", &set(&["USDT_ETH", "USDT_XRP"]), false).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn tracked_pairs_are_distinct_per_cluster() {
        let db = ClusterDatabase::in_memory().await.unwrap();
        let ledger = db.pair_ledger();
        ledger.assert_candidate_pairs("c1", 1, &pairs(&["USDT_ETH", "USDT_BTC"])).await.unwrap();
        ledger.assert_candidate_pairs("c1", 2, &pairs(&["USDT_BTC", "USDT_SOL"])).await.unwrap();
        ledger.assert_candidate_pairs("c2", 3, &pairs(&["USDT_XRP"])).await.unwrap();

        assert_eq!(
            ledger.tracked_pairs("c1").await.unwrap(),
            set(&["USDT_BTC", "USDT_ETH", "USDT_SOL"])
        );
    }

    #[tokio::test]
    async fn pair_names_with_quotes_are_bound_safely() {
        let db = ClusterDatabase::in_memory().await.unwrap();
        let ledger = db.pair_ledger();
        let odd = "USDT_'); DROP TABLE bot_pairs; --".to_string();

        ledger
            .assert_candidate_pairs("c1", 1, &[odd.clone(), "USDT_BTC".to_string()])
            .await
            .unwrap();
        ledger.set_enabled("c1", &BTreeSet::from([odd.clone()]), false).await.unwrap();

        assert_eq!(ledger.enabled_pairs_for("c1", 1).await.unwrap(), vec!["USDT_BTC"]);
        assert_eq!(ledger.entries_for("c1", 1).await.unwrap()[0].pair, odd);
    }
}
