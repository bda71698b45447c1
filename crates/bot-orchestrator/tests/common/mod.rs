#![allow(dead_code)]

use async_trait::async_trait;
use deal_cluster_core::{BotId, BotService, BotServiceError, BotSnapshot};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};

/// In-memory bot service recording every pushed pair list.
///
/// A successful push replaces the stored bot's pairs, as the live service does.
#[derive(Default)]
pub struct MockBotService {
    bots: Mutex<HashMap<BotId, BotSnapshot>>,
    failing_fetch: Mutex<HashSet<BotId>>,
    failing_push: Mutex<HashSet<BotId>>,
    pushes: Mutex<Vec<(BotId, Vec<String>)>>,
}

impl MockBotService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bot(&self, bot: BotSnapshot) {
        self.bots.lock().unwrap().insert(bot.id, bot);
    }

    /// Drops every active deal of the bot, leaving its pairs as last pushed.
    pub fn close_deals(&self, bot_id: BotId) {
        if let Some(bot) = self.bots.lock().unwrap().get_mut(&bot_id) {
            bot.active_deals.clear();
        }
    }

    pub fn pairs_of(&self, bot_id: BotId) -> Option<Vec<String>> {
        self.bots.lock().unwrap().get(&bot_id).map(|bot| bot.pairs.clone())
    }

    pub fn fail_fetch(&self, bot_id: BotId) {
        self.failing_fetch.lock().unwrap().insert(bot_id);
    }

    pub fn fail_push(&self, bot_id: BotId) {
        self.failing_push.lock().unwrap().insert(bot_id);
    }

    pub fn recover(&self, bot_id: BotId) {
        self.failing_fetch.lock().unwrap().remove(&bot_id);
        self.failing_push.lock().unwrap().remove(&bot_id);
    }

    pub fn pushes(&self) -> Vec<(BotId, Vec<String>)> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn push_count(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }

    pub fn last_push(&self, bot_id: BotId) -> Option<Vec<String>> {
        self.pushes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| *id == bot_id)
            .map(|(_, pairs)| pairs.clone())
    }
}

#[async_trait]
impl BotService for MockBotService {
    async fn fetch_bot(&self, bot_id: BotId) -> Result<BotSnapshot, BotServiceError> {
        if self.failing_fetch.lock().unwrap().contains(&bot_id) {
            return Err(BotServiceError::query(bot_id, Some("Bot is unavailable".to_string())));
        }
        self.bots
            .lock()
            .unwrap()
            .get(&bot_id)
            .cloned()
            .ok_or_else(|| BotServiceError::query(bot_id, None))
    }

    async fn update_bot_pairs(&self, bot: &BotSnapshot, pairs: &[String]) -> Result<(), BotServiceError> {
        if self.failing_push.lock().unwrap().contains(&bot.id) {
            return Err(BotServiceError::update(bot.id, "Validation failed"));
        }
        if let Some(stored) = self.bots.lock().unwrap().get_mut(&bot.id) {
            stored.pairs = pairs.to_vec();
        }
        self.pushes.lock().unwrap().push((bot.id, pairs.to_vec()));
        Ok(())
    }
}

pub fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

/// Collects formatted log output for assertions.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Installs a subscriber writing into this buffer for the current thread.
    pub fn capture(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
