use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{BotRun, BotRunId, BotStatus, Candle, Result, TradeRecord};

/// Source of market candles.
///
/// Implementations may fail transiently; the bot runner retries with a
/// bounded policy before treating the failure as fatal.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Return up to `limit` most recent candles, oldest first.
    async fn fetch_candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>>;
}

/// Trade ledger of the surrounding application.
///
/// The runner reads history to recompute equity and writes one record per
/// executed trade. A failed write must surface as `Err`.
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn trade_history(&self, bot_run_id: BotRunId) -> Result<Vec<TradeRecord>>;

    async fn write_trade(&self, record: &TradeRecord) -> Result<()>;
}

/// Bot run records owned by the surrounding application.
#[async_trait]
pub trait BotStore: Send + Sync {
    async fn bot_run(&self, id: BotRunId) -> Result<BotRun>;

    async fn bot_status(&self, id: BotRunId) -> Result<BotStatus>;

    async fn write_bot_stopped(&self, id: BotRunId, at: DateTime<Utc>) -> Result<()>;
}
