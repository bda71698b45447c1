//! Persistent record of every deal observed per bot.
//!
//! A deal is keyed by its service-assigned id. Deals that disappear from a
//! bot's snapshot are flagged inactive rather than deleted, unless pruning is
//! requested for the snapshot.

use crate::error::Result;
use deal_cluster_core::{BotId, DealId, DealSnapshot};
use sqlx::sqlite::SqlitePool;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashSet;

/// A stored deal.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DealRecord {
    pub deal_id: DealId,
    pub pair: String,
    pub cluster_id: String,
    pub bot_id: BotId,
    pub active: bool,
}

/// What a snapshot changed in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotOutcome {
    /// Deals seen for the first time.
    pub opened: usize,
    /// Stored inactive deals that were observed again.
    pub reopened: usize,
    /// Stored active deals the snapshot no longer reports.
    pub closed: usize,
    /// Active deals observed again.
    pub unchanged: usize,
    /// Inactive deals deleted before the snapshot was applied.
    pub pruned: usize,
}

impl SnapshotOutcome {
    /// True when the snapshot left the store as it was.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.opened == 0 && self.reopened == 0 && self.closed == 0 && self.pruned == 0
    }
}

#[derive(Debug, Clone)]
pub struct DealStore {
    pool: SqlitePool,
}

impl DealStore {
    pub(crate) const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Records the set of deals a bot currently reports as open.
    ///
    /// New deals are inserted as active, stored inactive deals that show up
    /// again are re-activated, and active deals of this bot missing from
    /// `observed` are flagged inactive. An empty `observed` closes every
    /// active deal of the bot. The whole snapshot is applied in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReconcileError::StoreUnavailable`] on any database
    /// failure; nothing is written in that case.
    pub async fn record_bot_snapshot(
        &self,
        bot_id: BotId,
        cluster_id: &str,
        observed: &[DealSnapshot],
    ) -> Result<SnapshotOutcome> {
        self.apply_snapshot(bot_id, cluster_id, observed, false).await
    }

    /// Like [`Self::record_bot_snapshot`], but first deletes the bot's
    /// inactive deals inside the same transaction.
    ///
    /// Deals the snapshot closes stay until the next pruning pass.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReconcileError::StoreUnavailable`] on any database
    /// failure; neither the prune nor the snapshot is written then.
    pub async fn prune_and_record(
        &self,
        bot_id: BotId,
        cluster_id: &str,
        observed: &[DealSnapshot],
    ) -> Result<SnapshotOutcome> {
        self.apply_snapshot(bot_id, cluster_id, observed, true).await
    }

    async fn apply_snapshot(
        &self,
        bot_id: BotId,
        cluster_id: &str,
        observed: &[DealSnapshot],
        prune: bool,
    ) -> Result<SnapshotOutcome> {
        let now = chrono::Utc::now().timestamp();
        let mut outcome = SnapshotOutcome::default();
        let mut seen: HashSet<DealId> = HashSet::with_capacity(observed.len());

        let mut tx = self.pool.begin().await?;

        if prune {
            let pruned = sqlx::query("DELETE FROM deals WHERE bot_id = ?1 AND active = 0")
                .bind(bot_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            outcome.pruned = usize::try_from(pruned).unwrap_or(usize::MAX);
        }

        for deal in observed {
            if !seen.insert(deal.id) {
                continue;
            }

            let existing = sqlx::query_as::<_, (bool,)>("SELECT active FROM deals WHERE deal_id = ?1")
                .bind(deal.id)
                .fetch_optional(&mut *tx)
                .await?;

            match existing {
                None => {
                    sqlx::query(
                        r"
                        INSERT INTO deals (deal_id, pair, cluster_id, bot_id, active, first_seen_at, updated_at)
                        VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
                        ",
                    )
                    .bind(deal.id)
                    .bind(&deal.pair)
                    .bind(cluster_id)
                    .bind(bot_id)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;

                    tracing::info!("New deal found {}/{} on bot {}", deal.id, deal.pair, bot_id);
                    outcome.opened += 1;
                }
                Some((false,)) => {
                    sqlx::query("UPDATE deals SET active = 1, updated_at = ?1 WHERE deal_id = ?2")
                        .bind(now)
                        .bind(deal.id)
                        .execute(&mut *tx)
                        .await?;

                    tracing::info!("Deal {}/{} on bot {} is open again", deal.id, deal.pair, bot_id);
                    outcome.reopened += 1;
                }
                Some((true,)) => {
                    tracing::debug!("Deal {} already registered and still active", deal.id);
                    outcome.unchanged += 1;
                }
            }
        }

        let mut closing = QueryBuilder::<Sqlite>::new("UPDATE deals SET active = 0, updated_at = ");
        closing.push_bind(now);
        closing.push(" WHERE bot_id = ");
        closing.push_bind(bot_id);
        closing.push(" AND active = 1");
        if !seen.is_empty() {
            closing.push(" AND deal_id NOT IN (");
            let mut ids = closing.separated(", ");
            for id in &seen {
                ids.push_bind(*id);
            }
            ids.push_unseparated(")");
        }

        let closed = closing.build().execute(&mut *tx).await?.rows_affected();
        outcome.closed = usize::try_from(closed).unwrap_or(usize::MAX);

        tx.commit().await?;

        if outcome.closed > 0 {
            tracing::info!("Bot {}: {} deal(s) no longer active", bot_id, outcome.closed);
        }

        Ok(outcome)
    }

    /// All stored deals of a bot, active or not, ordered by deal id.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn deals_for_bot(&self, bot_id: BotId) -> Result<Vec<DealRecord>> {
        let deals = sqlx::query_as::<_, DealRecord>(
            r"
            SELECT deal_id, pair, cluster_id, bot_id, active
            FROM deals
            WHERE bot_id = ?1
            ORDER BY deal_id
            ",
        )
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(deals)
    }
}
