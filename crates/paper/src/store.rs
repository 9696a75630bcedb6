use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{BotRun, BotRunId, BotStatus, BotStore, Error, Result, TradeRecord, TradeStore};

/// In-memory bot and trade storage for paper trading and tests.
///
/// Clones share the same underlying data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    bots: Arc<RwLock<HashMap<BotRunId, BotRun>>>,
    trades: Arc<RwLock<Vec<TradeRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_bot(&self, bot: BotRun) {
        info!(bot_id = bot.id, strategy = %bot.strategy, symbol = %bot.symbol, "Bot registered");
        self.bots.write().await.insert(bot.id, bot);
    }

    /// Flip a bot to STOPPED the way an operator would. The runner notices on
    /// its next cycle.
    pub async fn request_stop(&self, id: BotRunId) -> Result<()> {
        let mut bots = self.bots.write().await;
        let bot = bots.get_mut(&id).ok_or(Error::BotNotFound(id))?;
        bot.status = BotStatus::Stopped;
        Ok(())
    }

    /// Trades of one bot, oldest first.
    pub async fn trades(&self, bot_run_id: BotRunId) -> Vec<TradeRecord> {
        self.trades
            .read()
            .await
            .iter()
            .filter(|t| t.bot_run_id == bot_run_id)
            .cloned()
            .collect()
    }

    pub async fn bot_runs(&self) -> Vec<BotRun> {
        let mut runs: Vec<BotRun> = self.bots.read().await.values().cloned().collect();
        runs.sort_by_key(|b| b.id);
        runs
    }
}

#[async_trait]
impl TradeStore for MemoryStore {
    async fn trade_history(&self, bot_run_id: BotRunId) -> Result<Vec<TradeRecord>> {
        Ok(self.trades(bot_run_id).await)
    }

    async fn write_trade(&self, trade: &TradeRecord) -> Result<()> {
        debug!(bot_id = trade.bot_run_id, trade_id = %trade.id, "Trade stored");
        self.trades.write().await.push(trade.clone());
        Ok(())
    }
}

#[async_trait]
impl BotStore for MemoryStore {
    async fn bot_run(&self, id: BotRunId) -> Result<BotRun> {
        self.bots
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::BotNotFound(id))
    }

    async fn bot_status(&self, id: BotRunId) -> Result<BotStatus> {
        Ok(self.bot_run(id).await?.status)
    }

    async fn write_bot_stopped(&self, id: BotRunId, at: DateTime<Utc>) -> Result<()> {
        let mut bots = self.bots.write().await;
        let bot = bots.get_mut(&id).ok_or(Error::BotNotFound(id))?;
        bot.status = BotStatus::Stopped;
        bot.stopped_at.get_or_insert(at);
        Ok(())
    }
}
