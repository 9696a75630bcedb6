use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, StrategyParams};

/// One OHLCV bar as returned by a candle source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Trailing window of candles used for one strategy evaluation.
///
/// Stored as parallel sequences, oldest first. All five sequences always
/// have the same non-zero length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleWindow {
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
}

impl CandleWindow {
    pub fn new(
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
        volume: Vec<f64>,
    ) -> Result<Self> {
        let len = close.len();
        if len == 0 {
            return Err(Error::InvalidWindow("window is empty".into()));
        }
        if [open.len(), high.len(), low.len(), volume.len()]
            .iter()
            .any(|&l| l != len)
        {
            return Err(Error::InvalidWindow(format!(
                "sequence lengths differ: open={} high={} low={} close={} volume={}",
                open.len(),
                high.len(),
                low.len(),
                len,
                volume.len()
            )));
        }
        Ok(Self { open, high, low, close, volume })
    }

    pub fn from_candles(candles: &[Candle]) -> Result<Self> {
        Self::new(
            candles.iter().map(|c| c.open).collect(),
            candles.iter().map(|c| c.high).collect(),
            candles.iter().map(|c| c.low).collect(),
            candles.iter().map(|c| c.close).collect(),
            candles.iter().map(|c| c.volume).collect(),
        )
    }

    /// Window where open/high/low all equal the close. Handy for strategies
    /// that only look at closes.
    pub fn from_closes(closes: &[f64], volume: f64) -> Result<Self> {
        Self::new(
            closes.to_vec(),
            closes.to_vec(),
            closes.to_vec(),
            closes.to_vec(),
            vec![volume; closes.len()],
        )
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    /// Always false for a constructed window; present for clippy's sake.
    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    pub fn opens(&self) -> &[f64] {
        &self.open
    }

    pub fn highs(&self) -> &[f64] {
        &self.high
    }

    pub fn lows(&self) -> &[f64] {
        &self.low
    }

    pub fn closes(&self) -> &[f64] {
        &self.close
    }

    pub fn volumes(&self) -> &[f64] {
        &self.volume
    }

    pub fn last_close(&self) -> f64 {
        self.close[self.close.len() - 1]
    }
}

/// Direction a strategy recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl SignalKind {
    pub fn is_directional(self) -> bool {
        !matches!(self, SignalKind::Hold)
    }

    pub fn side(self) -> Option<OrderSide> {
        match self {
            SignalKind::Buy => Some(OrderSide::Buy),
            SignalKind::Sell => Some(OrderSide::Sell),
            SignalKind::Hold => None,
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "BUY"),
            SignalKind::Sell => write!(f, "SELL"),
            SignalKind::Hold => write!(f, "HOLD"),
        }
    }
}

/// Result of one strategy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal: SignalKind,
    /// Always within `[0, 1]`, rounded to three decimals.
    pub confidence: f64,
    #[serde(default)]
    pub meta: BTreeMap<String, serde_json::Value>,
}

impl Signal {
    pub fn new(signal: SignalKind, confidence: f64) -> Self {
        Self {
            signal,
            confidence: round_confidence(confidence),
            meta: BTreeMap::new(),
        }
    }

    /// HOLD with zero confidence and a human-readable reason.
    pub fn hold(reason: impl Into<String>) -> Self {
        Self::new(SignalKind::Hold, 0.0).with_reason(reason)
    }

    pub fn with_reason(self, reason: impl Into<String>) -> Self {
        self.with_meta("reason", reason.into())
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    pub fn reason(&self) -> Option<&str> {
        self.meta.get("reason").and_then(|v| v.as_str())
    }

    pub fn is_hold(&self) -> bool {
        self.signal == SignalKind::Hold
    }
}

fn round_confidence(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}

/// Alert pushed by an external charting platform (TradingView webhook).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalAlert {
    pub ticker: String,
    /// BUY, SELL, CLOSE or HOLD. Case-insensitive.
    pub action: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Everything a strategy may know besides the candles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyContext {
    pub symbol: String,
    pub timeframe: String,
    #[serde(default)]
    pub alert: Option<ExternalAlert>,
}

impl StrategyContext {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            alert: None,
        }
    }

    pub fn with_alert(mut self, alert: ExternalAlert) -> Self {
        self.alert = Some(alert);
        self
    }
}

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

pub type BotRunId = u64;

/// Lifecycle status of a bot run as stored by the surrounding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum BotStatus {
    #[default]
    Running,
    Stopped,
}

impl std::fmt::Display for BotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotStatus::Running => write!(f, "RUNNING"),
            BotStatus::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// A bot run record owned by the surrounding application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotRun {
    pub id: BotRunId,
    /// Registry name of the strategy, e.g. "RSI_CROSS".
    pub strategy: String,
    pub symbol: String,
    pub timeframe: String,
    pub status: BotStatus,
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub params: StrategyParams,
}

/// An executed trade. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub bot_run_id: BotRunId,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    /// Realized profit or loss of this trade. Zero for trades that only open
    /// or extend a position.
    pub pnl: f64,
    pub created_at: DateTime<Utc>,
}

impl TradeRecord {
    pub fn new(bot_run_id: BotRunId, side: OrderSide, quantity: f64, price: f64, pnl: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            bot_run_id,
            side,
            quantity,
            price,
            pnl,
            created_at: Utc::now(),
        }
    }
}

/// Observability events emitted by running bots.
#[derive(Debug, Clone)]
pub enum BotEvent {
    BotStarted {
        bot_run_id: BotRunId,
        strategy: String,
        symbol: String,
    },
    SignalGenerated {
        bot_run_id: BotRunId,
        strategy: String,
        symbol: String,
        signal: Signal,
    },
    StrategyTimed {
        strategy: String,
        elapsed: Duration,
    },
    RiskChecked {
        bot_run_id: BotRunId,
        allowed: bool,
        reason: String,
    },
    TradeExecuted {
        strategy: String,
        symbol: String,
        trade: TradeRecord,
    },
    CircuitBreakerTripped {
        bot_run_id: BotRunId,
        until: Option<DateTime<Utc>>,
    },
    BotStopped {
        bot_run_id: BotRunId,
        /// `None` for a clean stop, the fatal error text otherwise.
        reason: Option<String>,
    },
}
