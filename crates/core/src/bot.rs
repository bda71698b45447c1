use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier assigned to a bot by the bot service.
pub type BotId = i64;

/// Identifier assigned to a deal by the bot service.
pub type DealId = i64;

/// An open deal as reported in a bot snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DealSnapshot {
    pub id: DealId,
    pub pair: String,
}

/// State of one bot as returned by the bot service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSnapshot {
    pub id: BotId,
    pub name: String,
    pub active_deals: Vec<DealSnapshot>,
    /// Candidate pairs from the bot's own configuration.
    pub pairs: Vec<String>,
    /// Remaining bot settings, echoed back when the pair list is updated.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl BotSnapshot {
    #[must_use]
    pub fn new(id: BotId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            active_deals: Vec::new(),
            pairs: Vec::new(),
            attributes: Map::new(),
        }
    }

    #[must_use]
    pub fn with_pairs<I, S>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pairs = pairs.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_deal(mut self, id: DealId, pair: impl Into<String>) -> Self {
        self.active_deals.push(DealSnapshot {
            id,
            pair: pair.into(),
        });
        self
    }

    /// Candidate pairs with duplicates removed, keeping first occurrence order.
    #[must_use]
    pub fn candidate_pairs(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.pairs
            .iter()
            .filter(|pair| seen.insert(pair.as_str()))
            .cloned()
            .collect()
    }
}
