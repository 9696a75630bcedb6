use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::Config;
use engine::{BotServices, EventRecorder, RunnerConfig, Supervisor};
use paper::{MemoryStore, PaperFeed};
use risk::RiskConfig;
use strategy::{BotFileConfig, StrategyRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ── Config ───────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("invalid configuration")?;
    info!(bots_config = %cfg.bots_config_path, "AutoTrader starting");

    // ── Strategy registry ────────────────────────────────────────────────────
    let registry = StrategyRegistry::builtin();
    info!(strategies = ?registry.list_names(), "Strategies available");

    let bot_file = BotFileConfig::load(&cfg.bots_config_path)
        .with_context(|| format!("loading bots from {}", cfg.bots_config_path))?;
    if let Err(e) = bot_file.validate(registry) {
        // the supervisor reports these bots as stopped on start
        warn!(error = %e, "Bot config references an unknown strategy");
    }

    // ── Paper collaborators ──────────────────────────────────────────────────
    let store = Arc::new(MemoryStore::new());
    let feed = Arc::new(PaperFeed::new(cfg.paper_seed));
    for (i, bot) in bot_file.bots.iter().enumerate() {
        store.insert_bot(bot.to_bot_run(i as u64 + 1)).await;
    }
    let services = BotServices {
        candles: feed,
        trades: store.clone(),
        bots: store.clone(),
    };

    // ── Event recorder ───────────────────────────────────────────────────────
    let (event_tx, event_rx) = mpsc::channel(1024);
    let recorder = EventRecorder::new(event_rx);
    let metrics = recorder.snapshot_handle();
    let recorder_task = tokio::spawn(recorder.run());

    // ── Supervisor ───────────────────────────────────────────────────────────
    let (supervisor, handle) = Supervisor::new(
        registry,
        services,
        RunnerConfig::from(&cfg),
        RiskConfig::from(&cfg),
        event_tx,
    );
    let supervisor_task = tokio::spawn(supervisor.run());

    for bot in store.bot_runs().await {
        handle.start_bot(bot.id).await;
    }

    info!(bots = bot_file.bots.len(), "All bots started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("Shutdown signal received");

    handle.shutdown().await;
    supervisor_task.await.context("supervisor task")?;
    drop(handle);
    recorder_task.await.context("event recorder task")?;

    let snapshot = metrics.read().await.clone();
    info!(
        trades_buy = snapshot.trades_buy,
        trades_sell = snapshot.trades_sell,
        realized_pnl = snapshot.realized_pnl,
        risk_rejected = snapshot.risk_rejected,
        breaker_trips = snapshot.breaker_trips,
        avg_strategy_us = snapshot.strategy_time_avg().as_micros() as u64,
        "Session summary"
    );
    Ok(())
}
