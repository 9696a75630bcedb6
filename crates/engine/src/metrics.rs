use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};

use common::{BotEvent, BotRunId, OrderSide, SignalKind};

/// Counters aggregated from the bot event stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub trades_buy: u64,
    pub trades_sell: u64,
    pub realized_pnl: f64,
    pub signals_buy: u64,
    pub signals_sell: u64,
    pub signals_hold: u64,
    pub risk_allowed: u64,
    pub risk_rejected: u64,
    pub breaker_trips: u64,
    pub strategy_evaluations: u64,
    pub strategy_time_total: Duration,
    pub strategy_time_max: Duration,
    pub bots_running: u64,
    pub bots_failed: u64,
    #[serde(skip)]
    running: HashSet<BotRunId>,
}

impl MetricsSnapshot {
    pub fn apply(&mut self, event: &BotEvent) {
        match event {
            BotEvent::BotStarted { bot_run_id, .. } => {
                self.running.insert(*bot_run_id);
                self.bots_running = self.running.len() as u64;
            }
            BotEvent::SignalGenerated { signal, .. } => match signal.signal {
                SignalKind::Buy => self.signals_buy += 1,
                SignalKind::Sell => self.signals_sell += 1,
                SignalKind::Hold => self.signals_hold += 1,
            },
            BotEvent::StrategyTimed { elapsed, .. } => {
                self.strategy_evaluations += 1;
                self.strategy_time_total += *elapsed;
                self.strategy_time_max = self.strategy_time_max.max(*elapsed);
            }
            BotEvent::RiskChecked { allowed: true, .. } => self.risk_allowed += 1,
            BotEvent::RiskChecked { allowed: false, .. } => self.risk_rejected += 1,
            BotEvent::TradeExecuted { trade, .. } => {
                match trade.side {
                    OrderSide::Buy => self.trades_buy += 1,
                    OrderSide::Sell => self.trades_sell += 1,
                }
                self.realized_pnl += trade.pnl;
            }
            BotEvent::CircuitBreakerTripped { .. } => self.breaker_trips += 1,
            BotEvent::BotStopped { bot_run_id, reason } => {
                // start failures never emitted BotStarted
                self.running.remove(bot_run_id);
                self.bots_running = self.running.len() as u64;
                if reason.is_some() {
                    self.bots_failed += 1;
                }
            }
        }
    }

    /// Mean strategy evaluation time, zero before the first evaluation.
    pub fn strategy_time_avg(&self) -> Duration {
        if self.strategy_evaluations == 0 {
            return Duration::ZERO;
        }
        match u32::try_from(self.strategy_evaluations) {
            Ok(n) => self.strategy_time_total / n,
            Err(_) => self.strategy_time_total.div_f64(self.strategy_evaluations as f64),
        }
    }
}

/// Consumes the bot event channel, logging every event and keeping a
/// running [`MetricsSnapshot`].
pub struct EventRecorder {
    event_rx: mpsc::Receiver<BotEvent>,
    snapshot: Arc<RwLock<MetricsSnapshot>>,
}

impl EventRecorder {
    pub fn new(event_rx: mpsc::Receiver<BotEvent>) -> Self {
        Self {
            event_rx,
            snapshot: Arc::new(RwLock::new(MetricsSnapshot::default())),
        }
    }

    pub fn snapshot_handle(&self) -> Arc<RwLock<MetricsSnapshot>> {
        self.snapshot.clone()
    }

    /// Run until every sender is dropped. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!("EventRecorder running");
        while let Some(event) = self.event_rx.recv().await {
            log_event(&event);
            self.snapshot.write().await.apply(&event);
        }
        info!("Event channel closed, recorder stopping");
    }
}

fn log_event(event: &BotEvent) {
    match event {
        BotEvent::BotStarted { bot_run_id, strategy, symbol } => {
            info!(bot_id = bot_run_id, strategy = %strategy, symbol = %symbol, "Bot started");
        }
        BotEvent::SignalGenerated { bot_run_id, strategy, symbol, signal } => {
            info!(
                bot_id = bot_run_id,
                strategy = %strategy,
                symbol = %symbol,
                signal = %signal.signal,
                confidence = signal.confidence,
                reason = signal.reason().unwrap_or(""),
                "Signal generated"
            );
        }
        BotEvent::StrategyTimed { strategy, elapsed } => {
            tracing::debug!(strategy = %strategy, elapsed_us = elapsed.as_micros() as u64, "Strategy evaluated");
        }
        BotEvent::RiskChecked { bot_run_id, allowed, reason } => {
            info!(bot_id = bot_run_id, allowed, reason = %reason, "Risk check");
        }
        BotEvent::TradeExecuted { strategy, symbol, trade } => {
            info!(
                bot_id = trade.bot_run_id,
                strategy = %strategy,
                symbol = %symbol,
                side = %trade.side,
                qty = trade.quantity,
                price = trade.price,
                pnl = trade.pnl,
                "Trade recorded"
            );
        }
        BotEvent::CircuitBreakerTripped { bot_run_id, until } => {
            warn!(bot_id = bot_run_id, until = ?until, "Circuit breaker tripped");
        }
        BotEvent::BotStopped { bot_run_id, reason: Some(reason) } => {
            error!(bot_id = bot_run_id, reason = %reason, "Bot stopped with error");
        }
        BotEvent::BotStopped { bot_run_id, reason: None } => {
            info!(bot_id = bot_run_id, "Bot stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Signal, TradeRecord};

    #[test]
    fn snapshot_counts_events() {
        let mut m = MetricsSnapshot::default();
        m.apply(&BotEvent::BotStarted { bot_run_id: 1, strategy: "VWAP".into(), symbol: "BTC/USDT".into() });
        m.apply(&BotEvent::SignalGenerated {
            bot_run_id: 1,
            strategy: "VWAP".into(),
            symbol: "BTC/USDT".into(),
            signal: Signal::new(SignalKind::Buy, 0.9),
        });
        m.apply(&BotEvent::StrategyTimed { strategy: "VWAP".into(), elapsed: Duration::from_millis(2) });
        m.apply(&BotEvent::StrategyTimed { strategy: "VWAP".into(), elapsed: Duration::from_millis(4) });
        m.apply(&BotEvent::RiskChecked { bot_run_id: 1, allowed: false, reason: "Signal is HOLD".into() });
        m.apply(&BotEvent::TradeExecuted {
            strategy: "VWAP".into(),
            symbol: "BTC/USDT".into(),
            trade: TradeRecord::new(1, OrderSide::Sell, 1.0, 100.0, -5.0),
        });
        m.apply(&BotEvent::BotStopped { bot_run_id: 1, reason: Some("Candle fetch failed: down".into()) });

        assert_eq!(m.signals_buy, 1);
        assert_eq!(m.risk_rejected, 1);
        assert_eq!(m.trades_sell, 1);
        assert_eq!(m.realized_pnl, -5.0);
        assert_eq!(m.strategy_time_max, Duration::from_millis(4));
        assert_eq!(m.strategy_time_avg(), Duration::from_millis(3));
        assert_eq!(m.bots_running, 0);
        assert_eq!(m.bots_failed, 1);
    }

    #[test]
    fn start_failure_does_not_reduce_running_count() {
        let mut m = MetricsSnapshot::default();
        m.apply(&BotEvent::BotStarted { bot_run_id: 1, strategy: "VWAP".into(), symbol: "BTC/USDT".into() });
        m.apply(&BotEvent::BotStopped { bot_run_id: 2, reason: Some("Strategy 'GRID' not registered".into()) });
        assert_eq!(m.bots_running, 1);
        assert_eq!(m.bots_failed, 1);

        m.apply(&BotEvent::BotStopped { bot_run_id: 1, reason: None });
        assert_eq!(m.bots_running, 0);
    }

    #[test]
    fn average_survives_large_evaluation_counts() {
        let m = MetricsSnapshot {
            strategy_evaluations: u64::from(u32::MAX) + 2,
            strategy_time_total: Duration::from_secs(u64::from(u32::MAX) + 2),
            ..MetricsSnapshot::default()
        };
        let avg = m.strategy_time_avg();
        assert!((avg.as_secs_f64() - 1.0).abs() < 1e-6, "{avg:?}");
    }

    #[tokio::test]
    async fn recorder_drains_until_senders_drop() {
        let (tx, rx) = mpsc::channel(8);
        let recorder = EventRecorder::new(rx);
        let snapshot = recorder.snapshot_handle();
        let task = tokio::spawn(recorder.run());

        tx.send(BotEvent::CircuitBreakerTripped { bot_run_id: 3, until: None }).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(snapshot.read().await.breaker_trips, 1);
    }
}
