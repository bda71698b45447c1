use crate::bot::{BotId, BotSnapshot};
use crate::error::BotServiceError;
use async_trait::async_trait;

/// Remote service that owns the bots of a cluster.
#[async_trait]
pub trait BotService: Send + Sync {
    /// Fetches the bot's open deals and candidate pairs.
    async fn fetch_bot(&self, bot_id: BotId) -> Result<BotSnapshot, BotServiceError>;

    /// Replaces the bot's allowed pair list. Re-sending the same list is safe.
    async fn update_bot_pairs(
        &self,
        bot: &BotSnapshot,
        pairs: &[String],
    ) -> Result<(), BotServiceError>;
}
