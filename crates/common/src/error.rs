use thiserror::Error;

use crate::BotRunId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Strategy '{0}' not registered")]
    NotRegistered(String),

    #[error("Invalid strategy registration: {0}")]
    DuplicateOrMissingName(String),

    #[error("Candle fetch failed: {0}")]
    CandleFetch(String),

    #[error("Trade write failed: {0}")]
    TradeWrite(String),

    #[error("Bot run {0} not found")]
    BotNotFound(BotRunId),

    #[error("Invalid candle window: {0}")]
    InvalidWindow(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
