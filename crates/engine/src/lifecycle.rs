use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use common::{BotEvent, BotRunId, ExternalAlert, Result};
use risk::{RiskConfig, RiskManager};
use strategy::StrategyRegistry;

use crate::runner::{BotRunner, BotServices, RunnerConfig};

#[derive(Debug, Clone)]
pub enum SupervisorCommand {
    StartBot(BotRunId),
    StopBot(BotRunId),
    Alert(BotRunId, ExternalAlert),
    Shutdown,
}

/// Cloneable handle for controlling the supervisor from other tasks.
#[derive(Clone)]
pub struct SupervisorHandle {
    command_tx: mpsc::Sender<SupervisorCommand>,
}

impl SupervisorHandle {
    pub async fn send(&self, cmd: SupervisorCommand) {
        let _ = self.command_tx.send(cmd).await;
    }

    pub async fn start_bot(&self, id: BotRunId) {
        self.send(SupervisorCommand::StartBot(id)).await;
    }

    pub async fn stop_bot(&self, id: BotRunId) {
        self.send(SupervisorCommand::StopBot(id)).await;
    }

    /// Forward an external alert into a running bot's inbox.
    pub async fn alert(&self, id: BotRunId, alert: ExternalAlert) {
        self.send(SupervisorCommand::Alert(id, alert)).await;
    }

    pub async fn shutdown(&self) {
        self.send(SupervisorCommand::Shutdown).await;
    }
}

struct RunningBot {
    cancel: CancellationToken,
    alert_tx: mpsc::Sender<ExternalAlert>,
    handle: JoinHandle<Result<()>>,
}

/// Starts, stops and tracks one runner task per bot run.
pub struct Supervisor {
    registry: &'static StrategyRegistry,
    services: BotServices,
    runner_config: RunnerConfig,
    risk_config: RiskConfig,
    events: mpsc::Sender<BotEvent>,
    command_rx: mpsc::Receiver<SupervisorCommand>,
    bots: HashMap<BotRunId, RunningBot>,
}

impl Supervisor {
    const ALERT_INBOX: usize = 16;
    const REAP_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(
        registry: &'static StrategyRegistry,
        services: BotServices,
        runner_config: RunnerConfig,
        risk_config: RiskConfig,
        events: mpsc::Sender<BotEvent>,
    ) -> (Self, SupervisorHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let supervisor = Supervisor {
            registry,
            services,
            runner_config,
            risk_config,
            events,
            command_rx,
            bots: HashMap::new(),
        };
        (supervisor, SupervisorHandle { command_tx })
    }

    /// Process commands until `Shutdown` or until every handle is dropped,
    /// then cancel and await all runners. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!("Supervisor waiting for commands");
        let mut reap = tokio::time::interval(Self::REAP_INTERVAL);
        loop {
            let command = tokio::select! {
                command = self.command_rx.recv() => Some(command),
                _ = reap.tick() => None,
            };
            self.reap_finished();
            let Some(command) = command else {
                continue;
            };
            match command {
                Some(SupervisorCommand::StartBot(id)) => self.start_bot(id).await,
                Some(SupervisorCommand::StopBot(id)) => self.stop_bot(id).await,
                Some(SupervisorCommand::Alert(id, alert)) => self.forward_alert(id, alert),
                Some(SupervisorCommand::Shutdown) => {
                    info!("Supervisor shutting down");
                    break;
                }
                None => {
                    warn!("Supervisor command channel closed, shutting down");
                    break;
                }
            }
        }

        for (id, bot) in self.bots.drain() {
            bot.cancel.cancel();
            if let Err(e) = bot.handle.await {
                error!(bot_id = id, error = %e, "Bot task panicked");
            }
        }
        info!("All bots stopped");
    }

    async fn start_bot(&mut self, id: BotRunId) {
        if self.bots.contains_key(&id) {
            info!(bot_id = id, "Bot already running");
            return;
        }

        let bot = match self.services.bots.bot_run(id).await {
            Ok(bot) => bot,
            Err(e) => {
                error!(bot_id = id, error = %e, "Cannot start bot");
                report_stopped(&self.events, id, e.to_string()).await;
                return;
            }
        };

        let strategy = match self.registry.create_with(&bot.strategy, &bot.params) {
            Ok(s) => s,
            Err(e) => {
                error!(bot_id = id, strategy = %bot.strategy, error = %e, "Cannot start bot");
                if let Err(e) = self.services.bots.write_bot_stopped(id, Utc::now()).await {
                    error!(bot_id = id, error = %e, "Failed to mark bot stopped");
                }
                report_stopped(&self.events, id, e.to_string()).await;
                return;
            }
        };

        let cancel = CancellationToken::new();
        let (alert_tx, alert_rx) = mpsc::channel(Self::ALERT_INBOX);
        let runner = BotRunner::new(
            bot,
            strategy,
            RiskManager::new(self.risk_config.clone()),
            self.services.clone(),
            self.runner_config,
            self.events.clone(),
            alert_rx,
            cancel.clone(),
        );
        let handle = tokio::spawn(runner.run());
        self.bots.insert(id, RunningBot { cancel, alert_tx, handle });
        info!(bot_id = id, running = self.bots.len(), "Bot spawned");
    }

    async fn stop_bot(&mut self, id: BotRunId) {
        if let Err(e) = self.services.bots.write_bot_stopped(id, Utc::now()).await {
            warn!(bot_id = id, error = %e, "Failed to mark bot stopped");
        }
        match self.bots.remove(&id) {
            Some(bot) => {
                info!(bot_id = id, "Stopping bot");
                bot.cancel.cancel();
            }
            None => info!(bot_id = id, "Stop requested for bot that is not running"),
        }
    }

    fn forward_alert(&mut self, id: BotRunId, alert: ExternalAlert) {
        let Some(bot) = self.bots.get(&id) else {
            warn!(bot_id = id, "Alert for bot that is not running, dropped");
            return;
        };
        if let Err(e) = bot.alert_tx.try_send(alert) {
            warn!(bot_id = id, error = %e, "Bot alert inbox unavailable, alert dropped");
        }
    }

    fn reap_finished(&mut self) {
        self.bots.retain(|_, bot| !bot.handle.is_finished());
    }
}

async fn report_stopped(events: &mpsc::Sender<BotEvent>, id: BotRunId, reason: String) {
    let _ = events
        .send(BotEvent::BotStopped { bot_run_id: id, reason: Some(reason) })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use common::{BotRun, BotStatus, BotStore, StrategyParams};
    use paper::{MemoryStore, PaperFeed};

    use crate::metrics::EventRecorder;
    use crate::retry::RetryPolicy;

    fn bot(id: BotRunId, strategy: &str) -> BotRun {
        BotRun {
            id,
            strategy: strategy.into(),
            symbol: "BTC/USDT".into(),
            timeframe: "1h".into(),
            status: BotStatus::Running,
            stopped_at: None,
            params: StrategyParams::new(),
        }
    }

    fn setup(store: Arc<MemoryStore>) -> (Supervisor, SupervisorHandle, mpsc::Receiver<BotEvent>) {
        let services = BotServices {
            candles: Arc::new(PaperFeed::new(42)),
            trades: store.clone(),
            bots: store,
        };
        let config = RunnerConfig {
            poll_interval: Duration::from_millis(5),
            candle_limit: 50,
            fetch_retry: RetryPolicy::new(2, Duration::from_millis(1)),
        };
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (sup, handle) = Supervisor::new(
            StrategyRegistry::builtin(),
            services,
            config,
            RiskConfig::default(),
            event_tx,
        );
        (sup, handle, event_rx)
    }

    async fn next_stopped(rx: &mut mpsc::Receiver<BotEvent>) -> (BotRunId, Option<String>) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match rx.recv().await {
                    Some(BotEvent::BotStopped { bot_run_id, reason }) => return (bot_run_id, reason),
                    Some(_) => continue,
                    None => panic!("event channel closed"),
                }
            }
        })
        .await
        .expect("no BotStopped event")
    }

    #[tokio::test]
    async fn unknown_strategy_is_reported_as_stopped() {
        let store = Arc::new(MemoryStore::new());
        store.insert_bot(bot(9, "GRID")).await;
        let (sup, handle, mut events) = setup(store.clone());
        let task = tokio::spawn(sup.run());

        handle.start_bot(9).await;
        let (id, reason) = next_stopped(&mut events).await;
        assert_eq!(id, 9);
        assert_eq!(reason.as_deref(), Some("Strategy 'GRID' not registered"));
        assert_eq!(store.bot_status(9).await.unwrap(), BotStatus::Stopped);

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn missing_bot_is_reported_as_stopped() {
        let store = Arc::new(MemoryStore::new());
        let (sup, handle, mut events) = setup(store);
        let task = tokio::spawn(sup.run());

        handle.start_bot(404).await;
        let (id, reason) = next_stopped(&mut events).await;
        assert_eq!(id, 404);
        assert!(reason.unwrap().contains("not found"));

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn start_then_stop_runs_and_marks_stopped() {
        let store = Arc::new(MemoryStore::new());
        store.insert_bot(bot(1, "MEAN_REVERSION")).await;
        let (sup, handle, mut events) = setup(store.clone());
        let task = tokio::spawn(sup.run());

        handle.start_bot(1).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.stop_bot(1).await;

        let (id, reason) = next_stopped(&mut events).await;
        assert_eq!(id, 1);
        assert_eq!(reason, None);
        assert_eq!(store.bot_status(1).await.unwrap(), BotStatus::Stopped);

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn alerts_reach_the_running_bot() {
        let store = Arc::new(MemoryStore::new());
        store.insert_bot(bot(2, "TRADINGVIEW")).await;
        let (sup, handle, mut events) = setup(store.clone());
        let task = tokio::spawn(sup.run());

        handle.start_bot(2).await;
        handle
            .alert(
                2,
                ExternalAlert {
                    ticker: "BTCUSDT".into(),
                    action: "BUY".into(),
                    price: None,
                    confidence: Some(0.9),
                    strategy: None,
                    interval: None,
                    message: None,
                },
            )
            .await;

        let trade = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(BotEvent::TradeExecuted { trade, .. }) = events.recv().await {
                    return trade;
                }
            }
        })
        .await
        .expect("alert did not produce a trade");
        assert_eq!(trade.bot_run_id, 2);
        assert_eq!(store.trades(2).await.len(), 1);

        handle.shutdown().await;
        task.await.unwrap();
        assert_eq!(store.bot_status(2).await.unwrap(), BotStatus::Stopped);
    }

    #[tokio::test]
    async fn failed_start_leaves_running_count_intact() {
        let store = Arc::new(MemoryStore::new());
        store.insert_bot(bot(1, "MEAN_REVERSION")).await;
        store.insert_bot(bot(9, "GRID")).await;
        let (sup, handle, events) = setup(store.clone());
        let recorder = EventRecorder::new(events);
        let metrics = recorder.snapshot_handle();
        let recorder_task = tokio::spawn(recorder.run());
        let task = tokio::spawn(sup.run());

        handle.start_bot(1).await;
        handle.start_bot(9).await;
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let m = metrics.read().await.clone();
                if m.bots_failed == 1 && m.bots_running == 1 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("expected one running and one failed bot");

        handle.shutdown().await;
        task.await.unwrap();
        drop(handle);
        recorder_task.await.unwrap();
        assert_eq!(metrics.read().await.bots_running, 0);
    }

    #[tokio::test]
    async fn finished_runners_are_reaped() {
        let store = Arc::new(MemoryStore::new());
        store.insert_bot(bot(1, "MEAN_REVERSION")).await;
        let (mut sup, _handle, _events) = setup(store.clone());

        sup.start_bot(1).await;
        assert_eq!(sup.bots.len(), 1);
        store.request_stop(1).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while !sup.bots[&1].handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("runner did not finish");

        sup.reap_finished();
        assert!(sup.bots.is_empty());
    }
}
