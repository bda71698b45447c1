//! Deal tracking and pair reconciliation for clusters of DCA bots.
//!
//! A cluster is a group of bots sharing candidate pairs. Each cycle the
//! [`ReconciliationEngine`] records every bot's open deals, counts active
//! deals per pair across the cluster, and disables a pair for all bots once
//! `max-same-deals` of them are open.

pub mod aggregator;
pub mod cluster_database;
pub mod deal_store;
pub mod engine;
pub mod error;
pub mod pair_ledger;
pub mod scheduler;

pub use aggregator::{ClusterAggregator, PairUsage};
pub use cluster_database::ClusterDatabase;
pub use deal_store::{DealRecord, DealStore, SnapshotOutcome};
pub use engine::{BotOutcome, ClusterContext, ClusterReport, PairDecision, ReconciliationEngine};
pub use error::{ReconcileError, Result};
pub use pair_ledger::{LedgerChange, PairEntry, PairLedger};
pub use scheduler::{ClusterScheduler, CycleSummary};
