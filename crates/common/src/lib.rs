pub mod config;
pub mod error;
pub mod exchange;
pub mod params;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use exchange::{BotStore, CandleSource, TradeStore};
pub use params::StrategyParams;
pub use types::*;
