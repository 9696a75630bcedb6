use std::str::FromStr;

use crate::{Error, Result};

/// Process configuration loaded from environment variables at startup.
/// Every variable is optional; unparsable values are rejected.
#[derive(Debug, Clone)]
pub struct Config {
    // Bot definitions file
    pub bots_config_path: String,

    // Runner loop
    pub poll_interval_secs: u64,
    pub candle_limit: usize,
    pub fetch_max_attempts: u32,
    pub fetch_retry_delay_secs: u64,

    // Risk
    pub risk_max_drawdown: f64,
    pub risk_max_position_fraction: f64,
    pub risk_max_consecutive_losses: u32,
    pub risk_cooldown_minutes: i64,
    pub risk_max_trades_per_hour: usize,
    pub risk_initial_equity: f64,

    // Simulated feed
    pub paper_seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bots_config_path: "config/bots.toml".to_string(),
            poll_interval_secs: 5,
            candle_limit: 150,
            fetch_max_attempts: 5,
            fetch_retry_delay_secs: 2,
            risk_max_drawdown: 0.25,
            risk_max_position_fraction: 0.1,
            risk_max_consecutive_losses: 5,
            risk_cooldown_minutes: 60,
            risk_max_trades_per_hour: 20,
            risk_initial_equity: 10_000.0,
            paper_seed: 42,
        }
    }
}

impl Config {
    /// Longest accepted breaker cooldown: one year.
    pub const MAX_COOLDOWN_MINUTES: i64 = 365 * 24 * 60;

    /// Load configuration from environment variables, reading `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Used by `from_env` and tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Config::default();
        let cfg = Config {
            bots_config_path: lookup("BOTS_CONFIG_PATH").unwrap_or(d.bots_config_path),
            poll_interval_secs: parsed(&lookup, "POLL_INTERVAL_SECS", d.poll_interval_secs)?,
            candle_limit: parsed(&lookup, "CANDLE_LIMIT", d.candle_limit)?,
            fetch_max_attempts: parsed(&lookup, "FETCH_MAX_ATTEMPTS", d.fetch_max_attempts)?,
            fetch_retry_delay_secs: parsed(
                &lookup,
                "FETCH_RETRY_DELAY_SECS",
                d.fetch_retry_delay_secs,
            )?,
            risk_max_drawdown: parsed(&lookup, "RISK_MAX_DRAWDOWN", d.risk_max_drawdown)?,
            risk_max_position_fraction: parsed(
                &lookup,
                "RISK_MAX_POSITION_FRACTION",
                d.risk_max_position_fraction,
            )?,
            risk_max_consecutive_losses: parsed(
                &lookup,
                "RISK_MAX_CONSECUTIVE_LOSSES",
                d.risk_max_consecutive_losses,
            )?,
            risk_cooldown_minutes: parsed(&lookup, "RISK_COOLDOWN_MINUTES", d.risk_cooldown_minutes)?,
            risk_max_trades_per_hour: parsed(
                &lookup,
                "RISK_MAX_TRADES_PER_HOUR",
                d.risk_max_trades_per_hour,
            )?,
            risk_initial_equity: parsed(&lookup, "RISK_INITIAL_EQUITY", d.risk_initial_equity)?,
            paper_seed: parsed(&lookup, "PAPER_SEED", d.paper_seed)?,
        };

        if cfg.fetch_max_attempts == 0 {
            return Err(Error::Config("FETCH_MAX_ATTEMPTS must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&cfg.risk_max_drawdown) {
            return Err(Error::Config(format!(
                "RISK_MAX_DRAWDOWN must be within [0, 1], got {}",
                cfg.risk_max_drawdown
            )));
        }
        if !(0..=Self::MAX_COOLDOWN_MINUTES).contains(&cfg.risk_cooldown_minutes) {
            return Err(Error::Config(format!(
                "RISK_COOLDOWN_MINUTES must be within [0, {}], got {}",
                Self::MAX_COOLDOWN_MINUTES,
                cfg.risk_cooldown_minutes
            )));
        }
        Ok(cfg)
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{key}='{raw}' is invalid: {e}"))),
        None => Ok(default),
    }
}
