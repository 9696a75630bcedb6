use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use common::{
    BotEvent, BotRun, BotStatus, BotStore, CandleSource, CandleWindow, Config, ExternalAlert,
    Result, StrategyContext, TradeStore,
};
use risk::RiskManager;
use strategy::Strategy;

use crate::executor::TradeExecutor;
use crate::retry::{into_fetch_error, RetryPolicy};

/// External collaborators a bot needs. Cheap to clone.
#[derive(Clone)]
pub struct BotServices {
    pub candles: Arc<dyn CandleSource>,
    pub trades: Arc<dyn TradeStore>,
    pub bots: Arc<dyn BotStore>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerConfig {
    pub poll_interval: Duration,
    pub candle_limit: usize,
    pub fetch_retry: RetryPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            candle_limit: 150,
            fetch_retry: RetryPolicy::default(),
        }
    }
}

impl From<&Config> for RunnerConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
            candle_limit: cfg.candle_limit,
            fetch_retry: RetryPolicy::new(
                cfg.fetch_max_attempts,
                Duration::from_secs(cfg.fetch_retry_delay_secs),
            ),
        }
    }
}

enum Cycle {
    Continue,
    Stop,
}

/// Drives one bot run: poll candles, evaluate, gate through risk, execute.
///
/// Owns its strategy instance and risk manager outright; nothing here is
/// shared with other bots.
pub struct BotRunner {
    bot: BotRun,
    strategy: Box<dyn Strategy>,
    risk: RiskManager,
    executor: TradeExecutor,
    services: BotServices,
    config: RunnerConfig,
    events: mpsc::Sender<BotEvent>,
    alerts: mpsc::Receiver<ExternalAlert>,
    cancel: CancellationToken,
}

impl BotRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bot: BotRun,
        strategy: Box<dyn Strategy>,
        risk: RiskManager,
        services: BotServices,
        config: RunnerConfig,
        events: mpsc::Sender<BotEvent>,
        alerts: mpsc::Receiver<ExternalAlert>,
        cancel: CancellationToken,
    ) -> Self {
        let executor = TradeExecutor::new(bot.id, services.trades.clone());
        Self {
            bot,
            strategy,
            risk,
            executor,
            services,
            config,
            events,
            alerts,
            cancel,
        }
    }

    /// Run until the bot is stopped, cancelled, or hits a fatal error. The
    /// bot is always marked STOPPED on the way out. Call from `tokio::spawn`.
    pub async fn run(mut self) -> Result<()> {
        let id = self.bot.id;
        info!(
            bot_id = id,
            strategy = %self.bot.strategy,
            symbol = %self.bot.symbol,
            timeframe = %self.bot.timeframe,
            "Bot runner starting"
        );
        self.emit(BotEvent::BotStarted {
            bot_run_id: id,
            strategy: self.bot.strategy.clone(),
            symbol: self.bot.symbol.clone(),
        })
        .await;

        let cancel = self.cancel.clone();
        let outcome = loop {
            if cancel.is_cancelled() {
                break Ok(());
            }
            match self.cycle().await {
                Ok(Cycle::Continue) => {}
                Ok(Cycle::Stop) => break Ok(()),
                Err(e) => break Err(e),
            }

            tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        };

        if let Err(e) = self.services.bots.write_bot_stopped(id, Utc::now()).await {
            error!(bot_id = id, error = %e, "Failed to mark bot stopped");
        }

        let reason = match &outcome {
            Ok(()) => {
                info!(bot_id = id, "Bot runner stopped");
                None
            }
            Err(e) => {
                error!(bot_id = id, error = %e, "Bot runner failed");
                Some(e.to_string())
            }
        };
        self.emit(BotEvent::BotStopped { bot_run_id: id, reason }).await;
        outcome
    }

    async fn cycle(&mut self) -> Result<Cycle> {
        let id = self.bot.id;

        let status = self.services.bots.bot_status(id).await?;
        if status != BotStatus::Running {
            info!(bot_id = id, status = %status, "Bot no longer running");
            return Ok(Cycle::Stop);
        }

        // Only the read-only fetch races cancellation; once a trade is in
        // flight the cycle runs to completion.
        let fetched = {
            let source = &self.services.candles;
            let (symbol, timeframe, limit) =
                (&self.bot.symbol, &self.bot.timeframe, self.config.candle_limit);
            let fetch = self
                .config
                .fetch_retry
                .run("fetch_candles", move || source.fetch_candles(symbol, timeframe, limit));
            tokio::select! {
                _ = self.cancel.cancelled() => None,
                res = fetch => Some(res),
            }
        };
        let Some(fetched) = fetched else {
            return Ok(Cycle::Stop);
        };
        let candles = fetched.map_err(into_fetch_error)?;

        let window = match CandleWindow::from_candles(&candles) {
            Ok(w) => w,
            Err(e) => {
                warn!(bot_id = id, error = %e, "Skipping cycle without usable candles");
                return Ok(Cycle::Continue);
            }
        };

        let mut ctx = StrategyContext::new(self.bot.symbol.clone(), self.bot.timeframe.clone());
        if let Some(alert) = self.latest_alert() {
            ctx = ctx.with_alert(alert);
        }

        let started = Instant::now();
        let signal = self.strategy.evaluate(&window, &ctx);
        let elapsed = started.elapsed();

        self.emit(BotEvent::SignalGenerated {
            bot_run_id: id,
            strategy: self.bot.strategy.clone(),
            symbol: self.bot.symbol.clone(),
            signal: signal.clone(),
        })
        .await;
        self.emit(BotEvent::StrategyTimed {
            strategy: self.bot.strategy.clone(),
            elapsed,
        })
        .await;

        let history = self.services.trades.trade_history(id).await?;
        let decision = self.risk.assess(&ctx, &signal, Some(&history[..]));
        self.emit(BotEvent::RiskChecked {
            bot_run_id: id,
            allowed: decision.allowed,
            reason: decision.reason.clone(),
        })
        .await;

        let Some(side) = signal.signal.side().filter(|_| decision.allowed) else {
            return Ok(Cycle::Continue);
        };

        let price = window.last_close();
        let quantity = self.risk.position_size(price);
        if quantity <= 0.0 {
            warn!(bot_id = id, price, "Position size is zero, skipping trade");
            return Ok(Cycle::Continue);
        }

        let trade = self.executor.execute(side, quantity, price).await?;
        let tripped = self.risk.record_trade_result(trade.pnl);

        self.emit(BotEvent::TradeExecuted {
            strategy: self.bot.strategy.clone(),
            symbol: self.bot.symbol.clone(),
            trade,
        })
        .await;
        if tripped {
            let until = self.risk.metrics().circuit_breaker.tripped_until;
            self.emit(BotEvent::CircuitBreakerTripped { bot_run_id: id, until }).await;
        }

        Ok(Cycle::Continue)
    }

    /// Newest alert waiting in the inbox; older ones are superseded.
    fn latest_alert(&mut self) -> Option<ExternalAlert> {
        let mut latest = None;
        while let Ok(alert) = self.alerts.try_recv() {
            latest = Some(alert);
        }
        latest
    }

    async fn emit(&mut self, event: BotEvent) {
        let _ = self.events.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use common::{Candle, Error, StrategyParams, TradeRecord};
    use paper::MemoryStore;
    use risk::RiskConfig;
    use strategy::StrategyRegistry;

    /// Always returns the same flat candles.
    struct FlatCandles;

    #[async_trait]
    impl CandleSource for FlatCandles {
        async fn fetch_candles(&self, _symbol: &str, _timeframe: &str, limit: usize) -> Result<Vec<Candle>> {
            let start = Utc::now() - ChronoDuration::hours(limit as i64);
            Ok((0..limit.min(30))
                .map(|i| Candle {
                    open_time: start + ChronoDuration::hours(i as i64),
                    open: 100.0,
                    high: 100.0,
                    low: 100.0,
                    close: 100.0,
                    volume: 10.0,
                })
                .collect())
        }
    }

    struct DownCandles {
        calls: AtomicU32,
    }

    #[async_trait]
    impl CandleSource for DownCandles {
        async fn fetch_candles(&self, _: &str, _: &str, _: usize) -> Result<Vec<Candle>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Other("exchange unreachable".into()))
        }
    }

    struct RejectingTrades;

    #[async_trait]
    impl TradeStore for RejectingTrades {
        async fn trade_history(&self, _: u64) -> Result<Vec<TradeRecord>> {
            Ok(Vec::new())
        }

        async fn write_trade(&self, _: &TradeRecord) -> Result<()> {
            Err(Error::Store("disk full".into()))
        }
    }

    /// Persists the trade, then takes a while to acknowledge it.
    struct SlowTrades {
        inner: Arc<MemoryStore>,
    }

    #[async_trait]
    impl TradeStore for SlowTrades {
        async fn trade_history(&self, bot_run_id: u64) -> Result<Vec<TradeRecord>> {
            self.inner.trade_history(bot_run_id).await
        }

        async fn write_trade(&self, record: &TradeRecord) -> Result<()> {
            self.inner.write_trade(record).await?;
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(())
        }
    }

    fn fast_config() -> RunnerConfig {
        RunnerConfig {
            poll_interval: Duration::from_millis(5),
            candle_limit: 150,
            fetch_retry: RetryPolicy::new(3, Duration::from_millis(1)),
        }
    }

    async fn tradingview_bot(store: &MemoryStore) -> BotRun {
        let bot = BotRun {
            id: 1,
            strategy: "TRADINGVIEW".into(),
            symbol: "BTC/USDT".into(),
            timeframe: "1h".into(),
            status: BotStatus::Running,
            stopped_at: None,
            params: StrategyParams::new(),
        };
        store.insert_bot(bot.clone()).await;
        bot
    }

    fn buy_alert() -> ExternalAlert {
        ExternalAlert {
            ticker: "BTCUSDT".into(),
            action: "BUY".into(),
            price: Some(100.0),
            confidence: Some(0.9),
            strategy: None,
            interval: None,
            message: None,
        }
    }

    /// Breaker that trips on the first non-profitable trade, so an opening
    /// trade (pnl 0) being fed to risk becomes observable.
    fn touchy_risk() -> RiskManager {
        RiskManager::new(RiskConfig {
            max_consecutive_losses: 1,
            ..RiskConfig::default()
        })
    }

    fn runner(
        bot: BotRun,
        services: BotServices,
        risk: RiskManager,
    ) -> (BotRunner, mpsc::Receiver<BotEvent>, mpsc::Sender<ExternalAlert>, CancellationToken) {
        let strategy = StrategyRegistry::builtin().create(&bot.strategy).unwrap();
        let (event_tx, event_rx) = mpsc::channel(256);
        let (alert_tx, alert_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let r = BotRunner::new(bot, strategy, risk, services, fast_config(), event_tx, alert_rx, cancel.clone());
        (r, event_rx, alert_tx, cancel)
    }

    fn drain(rx: &mut mpsc::Receiver<BotEvent>) -> Vec<BotEvent> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    #[tokio::test]
    async fn alert_trade_is_written_and_fed_to_risk() {
        let store = Arc::new(MemoryStore::new());
        let bot = tradingview_bot(&store).await;
        let services = BotServices {
            candles: Arc::new(FlatCandles),
            trades: store.clone(),
            bots: store.clone(),
        };
        let (runner, mut events, alerts, cancel) = runner(bot, services, touchy_risk());
        alerts.send(buy_alert()).await.unwrap();
        let handle = tokio::spawn(runner.run());

        let mut tripped = false;
        let deadline = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(event) = events.recv().await {
                if matches!(event, BotEvent::CircuitBreakerTripped { .. }) {
                    tripped = true;
                    break;
                }
            }
        });
        deadline.await.expect("breaker trip event not seen");
        assert!(tripped);

        cancel.cancel();
        handle.await.unwrap().unwrap();

        let trades = store.trades(1).await;
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].side, common::OrderSide::Buy);
        // 10_000 * 0.1 / 100
        assert!((trades[0].quantity - 10.0).abs() < 1e-9);
        assert_eq!(store.bot_status(1).await.unwrap(), BotStatus::Stopped);
    }

    #[tokio::test]
    async fn runner_stops_when_status_flips() {
        let store = Arc::new(MemoryStore::new());
        let bot = tradingview_bot(&store).await;
        let services = BotServices {
            candles: Arc::new(FlatCandles),
            trades: store.clone(),
            bots: store.clone(),
        };
        let (runner, mut events, _alerts, _cancel) = runner(bot, services, touchy_risk());
        let handle = tokio::spawn(runner.run());

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.request_stop(1).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("runner did not observe stop")
            .unwrap()
            .unwrap();

        let events = drain(&mut events);
        assert!(matches!(events.first(), Some(BotEvent::BotStarted { .. })));
        assert!(matches!(events.last(), Some(BotEvent::BotStopped { reason: None, .. })));
        assert!(store.trades(1).await.is_empty());
        assert!(store.bot_run(1).await.unwrap().stopped_at.is_some());
    }

    #[tokio::test]
    async fn fetch_exhaustion_stops_bot_with_reason() {
        let store = Arc::new(MemoryStore::new());
        let bot = tradingview_bot(&store).await;
        let candles = Arc::new(DownCandles { calls: AtomicU32::new(0) });
        let services = BotServices {
            candles: candles.clone(),
            trades: store.clone(),
            bots: store.clone(),
        };
        let (runner, mut events, _alerts, _cancel) = runner(bot, services, touchy_risk());

        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, Error::CandleFetch(_)));
        assert_eq!(candles.calls.load(Ordering::SeqCst), 3);

        let events = drain(&mut events);
        match events.last() {
            Some(BotEvent::BotStopped { reason: Some(reason), .. }) => {
                assert!(reason.contains("exchange unreachable"), "{reason}");
            }
            other => panic!("expected BotStopped with reason, got {other:?}"),
        }
        assert_eq!(store.bot_status(1).await.unwrap(), BotStatus::Stopped);
    }

    #[tokio::test]
    async fn failed_trade_write_is_fatal_and_not_fed_to_risk() {
        let store = Arc::new(MemoryStore::new());
        let bot = tradingview_bot(&store).await;
        let services = BotServices {
            candles: Arc::new(FlatCandles),
            trades: Arc::new(RejectingTrades),
            bots: store.clone(),
        };
        let (runner, mut events, alerts, _cancel) = runner(bot, services, touchy_risk());
        alerts.send(buy_alert()).await.unwrap();

        let err = tokio::time::timeout(Duration::from_secs(2), runner.run())
            .await
            .expect("runner hung")
            .unwrap_err();
        assert!(matches!(err, Error::TradeWrite(_)));

        let events = drain(&mut events);
        assert!(events
            .iter()
            .any(|e| matches!(e, BotEvent::RiskChecked { allowed: true, .. })));
        assert!(!events.iter().any(|e| matches!(
            e,
            BotEvent::TradeExecuted { .. } | BotEvent::CircuitBreakerTripped { .. }
        )));
        assert!(matches!(events.last(), Some(BotEvent::BotStopped { reason: Some(_), .. })));
    }

    #[tokio::test]
    async fn cancel_during_trade_write_completes_the_cycle() {
        let store = Arc::new(MemoryStore::new());
        let bot = tradingview_bot(&store).await;
        let services = BotServices {
            candles: Arc::new(FlatCandles),
            trades: Arc::new(SlowTrades { inner: store.clone() }),
            bots: store.clone(),
        };
        let (runner, mut events, alerts, cancel) = runner(bot, services, touchy_risk());
        alerts.send(buy_alert()).await.unwrap();
        let handle = tokio::spawn(runner.run());

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("runner did not stop")
            .unwrap()
            .unwrap();

        assert_eq!(store.trades(1).await.len(), 1);
        let events = drain(&mut events);
        let executed = events
            .iter()
            .filter(|e| matches!(e, BotEvent::TradeExecuted { .. }))
            .count();
        assert_eq!(executed, 1);
        // pnl 0 with max_consecutive_losses 1: the trade reached risk
        assert!(events
            .iter()
            .any(|e| matches!(e, BotEvent::CircuitBreakerTripped { .. })));
        assert!(matches!(events.last(), Some(BotEvent::BotStopped { reason: None, .. })));
    }

    #[tokio::test]
    async fn cancel_interrupts_fetch_retry_backoff() {
        let store = Arc::new(MemoryStore::new());
        let bot = tradingview_bot(&store).await;
        let candles = Arc::new(DownCandles { calls: AtomicU32::new(0) });
        let services = BotServices {
            candles: candles.clone(),
            trades: store.clone(),
            bots: store.clone(),
        };
        let strategy = StrategyRegistry::builtin().create(&bot.strategy).unwrap();
        let (event_tx, mut events) = mpsc::channel(64);
        let (_alert_tx, alert_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let config = RunnerConfig {
            fetch_retry: RetryPolicy::new(5, Duration::from_secs(30)),
            ..fast_config()
        };
        let runner = BotRunner::new(bot, strategy, touchy_risk(), services, config, event_tx, alert_rx, cancel.clone());
        let handle = tokio::spawn(runner.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("backoff was not interrupted")
            .unwrap()
            .unwrap();

        assert_eq!(candles.calls.load(Ordering::SeqCst), 1);
        let events = drain(&mut events);
        assert!(matches!(events.last(), Some(BotEvent::BotStopped { reason: None, .. })));
        assert_eq!(store.bot_status(1).await.unwrap(), BotStatus::Stopped);
    }
}
