//! Wire types for the 3Commas bot endpoints.

use deal_cluster_core::{BotSnapshot, DealSnapshot};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Bot settings that the update endpoint requires alongside `pairs`.
///
/// They are copied from the fetched bot so that only the pair list changes.
pub const UPDATE_ECHO_FIELDS: &[&str] = &[
    "base_order_volume",
    "base_order_volume_type",
    "take_profit",
    "take_profit_type",
    "safety_order_volume",
    "safety_order_volume_type",
    "martingale_volume_coefficient",
    "martingale_step_coefficient",
    "max_safety_orders",
    "active_safety_orders_count",
    "safety_order_step_percentage",
    "max_active_deals",
    "strategy_list",
    "close_strategy_list",
    "stop_loss_percentage",
    "stop_loss_type",
    "cooldown",
    "trailing_enabled",
    "trailing_deviation",
    "leverage_type",
    "leverage_custom_value",
    "min_volume_btc_24h",
    "profit_currency",
    "start_order_type",
];

/// Raw bot from `GET /ver1/bots/{id}/show`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawBot {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pairs: Vec<String>,
    #[serde(default)]
    pub active_deals: Vec<RawDeal>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawDeal {
    pub id: i64,
    pub pair: String,
}

impl From<RawBot> for BotSnapshot {
    fn from(raw: RawBot) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            active_deals: raw
                .active_deals
                .into_iter()
                .map(|deal| DealSnapshot {
                    id: deal.id,
                    pair: deal.pair,
                })
                .collect(),
            pairs: raw.pairs,
            attributes: raw.attributes,
        }
    }
}

/// Error body returned by 3Commas on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawApiError {
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub msg: Option<String>,
}

impl RawApiError {
    /// Most descriptive message available.
    pub fn message(self) -> Option<String> {
        self.error_description.or(self.msg).or(self.error)
    }
}

/// Builds the body for `PATCH /ver1/bots/{id}/update`.
#[must_use]
pub fn update_payload(bot: &BotSnapshot, pairs: &[String]) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("bot_id".to_string(), Value::from(bot.id));
    payload.insert("name".to_string(), Value::from(bot.name.clone()));
    payload.insert(
        "pairs".to_string(),
        Value::Array(pairs.iter().cloned().map(Value::from).collect()),
    );

    for field in UPDATE_ECHO_FIELDS {
        if let Some(value) = bot.attributes.get(*field) {
            if !value.is_null() {
                payload.insert((*field).to_string(), value.clone());
            }
        }
    }

    payload
}
