//! Per-cluster reconciliation: fetch, record, aggregate, decide, push.

use crate::aggregator::PairUsage;
use crate::cluster_database::ClusterDatabase;
use crate::error::{ReconcileError, Result};
use deal_cluster_core::{BotId, BotService, BotSnapshot, ClusterConfig};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Configuration of one cluster, frozen for the duration of its pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterContext {
    pub cluster_id: String,
    pub bot_ids: Vec<BotId>,
    /// Active deals on one pair at which the pair is disabled cluster-wide.
    pub max_same_deals: u32,
}

impl ClusterContext {
    #[must_use]
    pub fn new(cluster_id: impl Into<String>, config: &ClusterConfig) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            bot_ids: config.bot_ids.clone(),
            max_same_deals: config.max_same_deals,
        }
    }
}

/// Pairs to enable and disable for a whole cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairDecision {
    pub enable: BTreeSet<String>,
    pub disable: BTreeSet<String>,
}

impl PairDecision {
    /// Applies the threshold to `usage`.
    ///
    /// A pair with `count >= max_same_deals` is disabled, any other pair is
    /// enabled. Pairs in `tracked` without usage count as zero. Each pair
    /// lands on exactly one side.
    #[must_use]
    pub fn decide(usage: &PairUsage, tracked: &BTreeSet<String>, max_same_deals: u32) -> Self {
        let mut decision = Self::default();

        for (pair, count) in usage {
            if *count >= max_same_deals {
                decision.disable.insert(pair.clone());
            } else {
                decision.enable.insert(pair.clone());
            }
        }

        for pair in tracked {
            if !usage.contains_key(pair) {
                decision.enable.insert(pair.clone());
            }
        }

        decision
    }
}

/// What happened to one configured bot during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotOutcome {
    /// The snapshot could not be fetched; the bot kept its ledger state.
    Skipped { bot_id: BotId, message: String },
    /// The enabled pair list was accepted by the bot service.
    Pushed { bot_id: BotId, pairs: Vec<String> },
    /// The pair list was computed but the update was rejected.
    PushFailed {
        bot_id: BotId,
        pairs: Vec<String>,
        message: String,
    },
}

impl BotOutcome {
    #[must_use]
    pub const fn bot_id(&self) -> BotId {
        match self {
            Self::Skipped { bot_id, .. }
            | Self::Pushed { bot_id, .. }
            | Self::PushFailed { bot_id, .. } => *bot_id,
        }
    }
}

/// Result of reconciling one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterReport {
    pub cluster_id: String,
    pub usage: PairUsage,
    pub decision: PairDecision,
    /// One entry per configured bot, in configuration order.
    pub bots: Vec<BotOutcome>,
}

impl ClusterReport {
    #[must_use]
    pub fn outcome(&self, bot_id: BotId) -> Option<&BotOutcome> {
        self.bots.iter().find(|outcome| outcome.bot_id() == bot_id)
    }

    /// Pair list pushed to `bot_id`, whether or not the push succeeded.
    #[must_use]
    pub fn pushed_pairs(&self, bot_id: BotId) -> Option<&[String]> {
        match self.outcome(bot_id)? {
            BotOutcome::Pushed { pairs, .. } | BotOutcome::PushFailed { pairs, .. } => Some(pairs),
            BotOutcome::Skipped { .. } => None,
        }
    }
}

/// Drives the reconciliation of a cluster against the bot service.
///
/// The engine owns the only handles that mutate the deal store and pair
/// ledger. Bot failures are confined to the bot; a store failure aborts the
/// cluster before anything is pushed.
pub struct ReconciliationEngine {
    db: ClusterDatabase,
    bots: Arc<dyn BotService>,
    prune_inactive_deals: bool,
}

impl ReconciliationEngine {
    #[must_use]
    pub fn new(db: ClusterDatabase, bots: Arc<dyn BotService>) -> Self {
        Self {
            db,
            bots,
            prune_inactive_deals: false,
        }
    }

    /// Deletes each bot's inactive deals before recording its snapshot.
    #[must_use]
    pub fn with_pruning(mut self, prune_inactive_deals: bool) -> Self {
        self.prune_inactive_deals = prune_inactive_deals;
        self
    }

    pub fn set_pruning(&mut self, prune_inactive_deals: bool) {
        self.prune_inactive_deals = prune_inactive_deals;
    }

    #[must_use]
    pub const fn database(&self) -> &ClusterDatabase {
        &self.db
    }

    /// Runs one full pass over the cluster.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::StoreUnavailable`] if the store fails at
    /// any step. State committed before the failure is kept and no bot is
    /// updated.
    pub async fn reconcile_cluster(&self, ctx: &ClusterContext) -> Result<ClusterReport> {
        let deal_store = self.db.deal_store();
        let ledger = self.db.pair_ledger();

        tracing::info!(
            "Processing cluster '{}' ({} bot(s), max-same-deals {})",
            ctx.cluster_id,
            ctx.bot_ids.len(),
            ctx.max_same_deals
        );

        let mut answered: Vec<(BotId, BotSnapshot)> = Vec::with_capacity(ctx.bot_ids.len());
        let mut skipped: Vec<BotOutcome> = Vec::new();

        for &bot_id in &ctx.bot_ids {
            let bot = match self.bots.fetch_bot(bot_id).await {
                Ok(bot) => bot,
                Err(e) => {
                    let err = ReconcileError::FetchFailure(e);
                    tracing::error!("Cluster '{}': skipping bot {}: {}", ctx.cluster_id, bot_id, err);
                    skipped.push(BotOutcome::Skipped {
                        bot_id,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            let recorded = if self.prune_inactive_deals {
                deal_store
                    .prune_and_record(bot_id, &ctx.cluster_id, &bot.active_deals)
                    .await?
            } else {
                deal_store
                    .record_bot_snapshot(bot_id, &ctx.cluster_id, &bot.active_deals)
                    .await?
            };
            if recorded.pruned > 0 {
                tracing::info!("Cleaned {} inactive deal(s) of bot {}", recorded.pruned, bot_id);
            }
            tracing::debug!(
                "Bot \"{}\" ({}): {} opened, {} reopened, {} closed, {} unchanged",
                bot.name,
                bot_id,
                recorded.opened,
                recorded.reopened,
                recorded.closed,
                recorded.unchanged
            );

            let candidates = bot.candidate_pairs();
            ledger
                .assert_candidate_pairs(&ctx.cluster_id, bot_id, &candidates)
                .await?;
            tracing::info!("Saved {} pair(s) for bot \"{}\" ({})", candidates.len(), bot.name, bot_id);

            answered.push((bot_id, bot));
        }

        let usage = self.db.aggregator().compute_usage(&ctx.cluster_id).await?;
        if usage.is_empty() {
            tracing::info!("No active deals in cluster '{}'", ctx.cluster_id);
        } else {
            tracing::info!("Active deals per pair in cluster '{}':", ctx.cluster_id);
            for (pair, count) in &usage {
                tracing::info!("  {}: {}", pair, count);
            }
        }

        let tracked = ledger.tracked_pairs(&ctx.cluster_id).await?;
        let decision = PairDecision::decide(&usage, &tracked, ctx.max_same_deals);

        let enabled = ledger.set_enabled(&ctx.cluster_id, &decision.enable, true).await?;
        let disabled = ledger.set_enabled(&ctx.cluster_id, &decision.disable, false).await?;
        if !decision.enable.is_empty() {
            tracing::info!(
                "Enabling for cluster '{}': {}",
                ctx.cluster_id,
                join(&decision.enable)
            );
        }
        if !decision.disable.is_empty() {
            tracing::info!(
                "Disabling for cluster '{}': {}",
                ctx.cluster_id,
                join(&decision.disable)
            );
        }
        tracing::debug!(
            "Cluster '{}': {} ledger entr(ies) enabled, {} disabled",
            ctx.cluster_id,
            enabled,
            disabled
        );

        let mut pushed: Vec<BotOutcome> = Vec::with_capacity(answered.len());
        for (bot_id, bot) in &answered {
            let pairs = ledger.enabled_pairs_for(&ctx.cluster_id, *bot_id).await?;
            if pairs.is_empty() {
                tracing::warn!(
                    "Bot \"{}\" ({}) has no enabled pairs left in cluster '{}'",
                    bot.name,
                    bot_id,
                    ctx.cluster_id
                );
            }

            match self.bots.update_bot_pairs(bot, &pairs).await {
                Ok(()) => pushed.push(BotOutcome::Pushed {
                    bot_id: *bot_id,
                    pairs,
                }),
                Err(e) => {
                    let err = ReconcileError::PushFailure(e);
                    tracing::error!("Cluster '{}': {}", ctx.cluster_id, err);
                    pushed.push(BotOutcome::PushFailed {
                        bot_id: *bot_id,
                        pairs,
                        message: err.to_string(),
                    });
                }
            }
        }

        let mut bots: Vec<BotOutcome> = skipped.into_iter().chain(pushed).collect();
        bots.sort_by_key(|outcome| {
            ctx.bot_ids
                .iter()
                .position(|id| *id == outcome.bot_id())
                .unwrap_or(usize::MAX)
        });

        Ok(ClusterReport {
            cluster_id: ctx.cluster_id.clone(),
            usage,
            decision,
            bots,
        })
    }
}

fn join(pairs: &BTreeSet<String>) -> String {
    pairs.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(entries: &[(&str, u32)]) -> PairUsage {
        entries.iter().map(|(p, c)| ((*p).to_string(), *c)).collect()
    }

    fn set(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn threshold_is_inclusive() {
        let decision = PairDecision::decide(&usage(&[("BTC_USDT", 2), ("ETH_USDT", 1)]), &BTreeSet::new(), 2);
        assert_eq!(decision.disable, set(&["BTC_USDT"]));
        assert_eq!(decision.enable, set(&["ETH_USDT"]));
    }

    #[test]
    fn tracked_pairs_without_usage_are_enabled() {
        let decision = PairDecision::decide(
            &usage(&[("BTC_USDT", 1)]),
            &set(&["BTC_USDT", "ETH_USDT", "SOL_USDT"]),
            1,
        );
        assert_eq!(decision.disable, set(&["BTC_USDT"]));
        assert_eq!(decision.enable, set(&["ETH_USDT", "SOL_USDT"]));
    }

    #[test]
    fn sets_are_always_disjoint() {
        let u = usage(&[("A", 0), ("B", 1), ("C", 3), ("D", 7)]);
        let tracked = set(&["A", "B", "C", "D", "E"]);
        for k in 1..=8 {
            let decision = PairDecision::decide(&u, &tracked, k);
            assert!(decision.enable.is_disjoint(&decision.disable), "overlap at k={k}");
            assert_eq!(decision.enable.len() + decision.disable.len(), 5);
        }
    }

    #[test]
    fn context_snapshots_cluster_config() {
        let config = ClusterConfig {
            bot_ids: vec![1, 2],
            max_same_deals: 3,
        };
        let ctx = ClusterContext::new("c1", &config);
        assert_eq!(ctx.cluster_id, "c1");
        assert_eq!(ctx.bot_ids, vec![1, 2]);
        assert_eq!(ctx.max_same_deals, 3);
    }

    #[test]
    fn report_lookups() {
        let report = ClusterReport {
            cluster_id: "c1".to_string(),
            usage: PairUsage::new(),
            decision: PairDecision::default(),
            bots: vec![
                BotOutcome::Skipped {
                    bot_id: 1,
                    message: "down".to_string(),
                },
                BotOutcome::Pushed {
                    bot_id: 2,
                    pairs: vec!["ETH_USDT".to_string()],
                },
            ],
        };
        assert_eq!(report.pushed_pairs(1), None);
        assert_eq!(report.pushed_pairs(2), Some(&["ETH_USDT".to_string()][..]));
        assert!(report.outcome(3).is_none());
    }
}
