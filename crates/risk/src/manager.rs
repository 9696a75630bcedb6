use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use common::{Config, Signal, StrategyContext, TradeRecord};

use crate::breaker::{BreakerStatus, CircuitBreaker};
use crate::drawdown::{DrawdownMetrics, DrawdownTracker};

/// User-configurable risk parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Drawdown from peak equity that blocks new trades (0.25 = 25%).
    pub max_drawdown: f64,
    /// Share of current equity committed to one trade.
    pub max_position_fraction: f64,
    pub max_consecutive_losses: u32,
    pub cooldown_minutes: i64,
    pub max_trades_per_hour: usize,
    pub initial_equity: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_drawdown: 0.25,
            max_position_fraction: 0.1,
            max_consecutive_losses: 5,
            cooldown_minutes: 60,
            max_trades_per_hour: 20,
            initial_equity: 10_000.0,
        }
    }
}

impl From<&Config> for RiskConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            max_drawdown: cfg.risk_max_drawdown,
            max_position_fraction: cfg.risk_max_position_fraction,
            max_consecutive_losses: cfg.risk_max_consecutive_losses,
            cooldown_minutes: cfg.risk_cooldown_minutes,
            max_trades_per_hour: cfg.risk_max_trades_per_hour,
            initial_equity: cfg.risk_initial_equity,
        }
    }
}

/// Outcome of a risk assessment. Denials are normal results, not errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskDecision {
    pub allowed: bool,
    pub reason: String,
}

impl RiskDecision {
    fn allow(reason: impl Into<String>) -> Self {
        Self { allowed: true, reason: reason.into() }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self { allowed: false, reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskMetrics {
    pub initial_equity: f64,
    pub current_equity: f64,
    pub drawdown: DrawdownMetrics,
    pub circuit_breaker: BreakerStatus,
}

/// The gate between a strategy's signal and trade execution for one bot.
///
/// Checks run in a fixed order: HOLD, circuit breaker, hourly rate limit,
/// then drawdown against equity rebuilt from the trade history.
#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
    drawdown: DrawdownTracker,
    breaker: CircuitBreaker,
    current_equity: f64,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        let mut drawdown = DrawdownTracker::new(config.max_drawdown);
        drawdown.update_equity(config.initial_equity);
        let breaker = CircuitBreaker::new(
            config.max_consecutive_losses,
            config.cooldown_minutes,
            config.max_trades_per_hour,
        );
        Self {
            current_equity: config.initial_equity,
            config,
            drawdown,
            breaker,
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn current_equity(&self) -> f64 {
        self.current_equity
    }

    pub fn assess(
        &mut self,
        ctx: &StrategyContext,
        signal: &Signal,
        history: Option<&[TradeRecord]>,
    ) -> RiskDecision {
        self.assess_at(Utc::now(), ctx, signal, history)
    }

    /// Decide whether `signal` may be executed at `now`.
    ///
    /// When `history` is given, equity is recomputed as the initial equity
    /// plus the sum of every recorded PnL before the drawdown check.
    pub fn assess_at(
        &mut self,
        now: DateTime<Utc>,
        ctx: &StrategyContext,
        signal: &Signal,
        history: Option<&[TradeRecord]>,
    ) -> RiskDecision {
        if signal.is_hold() {
            return RiskDecision::deny("Signal is HOLD");
        }

        if self.breaker.is_tripped_at(now) {
            let until = self
                .breaker
                .tripped_until()
                .map(|t| t.to_string())
                .unwrap_or_default();
            warn!(symbol = %ctx.symbol, until = %until, "Trade blocked: circuit breaker tripped");
            return RiskDecision::deny(format!("Circuit breaker tripped until {until}"));
        }

        if self.breaker.rate_limited_at(now) {
            let limit = self.breaker.max_trades_per_hour();
            warn!(symbol = %ctx.symbol, limit, "Trade blocked: hourly trade limit reached");
            return RiskDecision::deny(format!("Trade rate limit exceeded ({limit}/hour)"));
        }

        if let Some(trades) = history {
            let realized: f64 = trades.iter().map(|t| t.pnl).sum();
            self.current_equity = self.config.initial_equity + realized;
            self.drawdown.update_equity(self.current_equity);
        }

        if self.drawdown.is_exceeded() {
            let dd = self.drawdown.current_drawdown();
            warn!(
                symbol = %ctx.symbol,
                drawdown = dd,
                threshold = self.config.max_drawdown,
                "Trade blocked: max drawdown exceeded"
            );
            return RiskDecision::deny(format!("Max drawdown exceeded: {:.2}%", dd * 100.0));
        }

        debug!(symbol = %ctx.symbol, signal = %signal.signal, "Risk checks passed");
        RiskDecision::allow("All risk checks passed")
    }

    /// Base-asset quantity for a new trade at `price`.
    pub fn position_size(&self, price: f64) -> f64 {
        if price <= 0.0 || !price.is_finite() {
            return 0.0;
        }
        self.current_equity.max(0.0) * self.config.max_position_fraction / price
    }

    pub fn record_trade_result(&mut self, pnl: f64) -> bool {
        self.record_trade_result_at(pnl, Utc::now())
    }

    /// Feed a completed trade's realized PnL. Returns true when this trade
    /// tripped the circuit breaker.
    pub fn record_trade_result_at(&mut self, pnl: f64, at: DateTime<Utc>) -> bool {
        let tripped = self.breaker.record_outcome(pnl > 0.0, at);
        self.current_equity += pnl;
        self.drawdown.update_equity(self.current_equity);
        info!(
            pnl,
            equity = self.current_equity,
            drawdown = self.drawdown.current_drawdown(),
            "Trade result recorded"
        );
        tripped
    }

    pub fn metrics(&mut self) -> RiskMetrics {
        self.metrics_at(Utc::now())
    }

    pub fn metrics_at(&mut self, now: DateTime<Utc>) -> RiskMetrics {
        RiskMetrics {
            initial_equity: self.config.initial_equity,
            current_equity: self.current_equity,
            drawdown: self.drawdown.metrics(),
            circuit_breaker: self.breaker.status_at(now),
        }
    }
}
