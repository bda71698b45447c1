use super::ensure_database_dir;
use deal_cluster_core::{AppConfig, BotId, ClusterConfig};
use deal_cluster_orchestrator::{ClusterDatabase, PairEntry, PairUsage};
use std::fmt::Write;

/// Prints the last-known ledger and current usage of each configured cluster.
///
/// Reads the database only; the bot service is never contacted.
pub async fn status(config: &AppConfig, only: Option<&str>) -> anyhow::Result<()> {
    ensure_database_dir(&config.database.url)?;
    let database = ClusterDatabase::new(&config.database.url, config.database.max_connections).await?;
    let ledger = database.pair_ledger();
    let aggregator = database.aggregator();

    let mut shown = 0;
    for (name, parsed) in config.clusters() {
        if only.is_some_and(|wanted| wanted != name) {
            continue;
        }
        shown += 1;

        let cluster = match parsed {
            Ok(cluster) => cluster,
            Err(e) => {
                println!("Cluster '{name}': {e}\n");
                continue;
            }
        };

        let usage = aggregator.compute_usage(&name).await?;
        let mut bots = Vec::with_capacity(cluster.bot_ids.len());
        for bot_id in &cluster.bot_ids {
            bots.push((*bot_id, ledger.entries_for(&name, *bot_id).await?));
        }

        println!("{}", render_cluster(&name, &cluster, &usage, &bots)?);
    }

    database.close().await;

    match only {
        Some(wanted) if shown == 0 => anyhow::bail!("cluster '{wanted}' is not configured"),
        None if shown == 0 => println!("No clusters configured"),
        _ => {}
    }
    Ok(())
}

fn render_cluster(
    name: &str,
    cluster: &ClusterConfig,
    usage: &PairUsage,
    bots: &[(BotId, Vec<PairEntry>)],
) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(out, "Cluster '{name}' (max-same-deals {})", cluster.max_same_deals)?;

    if usage.is_empty() {
        writeln!(out, "  No active deals")?;
    } else {
        writeln!(out, "  Active deals per pair:")?;
        for (pair, count) in usage {
            let marker = if *count >= cluster.max_same_deals { "  (limit reached)" } else { "" };
            writeln!(out, "    {pair:<16} {count}{marker}")?;
        }
    }

    for (bot_id, entries) in bots {
        if entries.is_empty() {
            writeln!(out, "  Bot {bot_id}: no pairs recorded")?;
            continue;
        }
        let enabled = entries.iter().filter(|entry| entry.enabled).count();
        writeln!(out, "  Bot {bot_id}: {enabled}/{} pairs enabled", entries.len())?;
        for entry in entries {
            let state = if entry.enabled { "enabled" } else { "disabled" };
            writeln!(out, "    {:<16} {state}", entry.pair)?;
        }
    }

    Ok(out)
}
