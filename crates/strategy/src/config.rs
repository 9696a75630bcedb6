use serde::{Deserialize, Serialize};

use common::{BotRun, BotRunId, BotStatus, Error, Result, StrategyParams};

use crate::StrategyRegistry;

/// Bot definitions file (TOML).
///
/// Example `config/bots.toml`:
/// ```toml
/// [[bot]]
/// strategy = "RSI_CROSS"
/// symbol = "BTC/USDT"
/// timeframe = "1h"
///
/// [bot.params]
/// period = 14
/// overbought = 70.0
/// oversold = 30.0
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BotFileConfig {
    #[serde(rename = "bot", default)]
    pub bots: Vec<BotConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    /// Registry name, e.g. "MEAN_REVERSION".
    pub strategy: String,
    /// Market symbol, e.g. "BTC/USDT".
    pub symbol: String,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default)]
    pub params: StrategyParams,
}

fn default_timeframe() -> String {
    "1h".to_string()
}

impl BotFileConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read bot config at '{path}': {e}")))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Fails with `NotRegistered` on the first bot naming an unknown strategy.
    pub fn validate(&self, registry: &StrategyRegistry) -> Result<()> {
        match self.bots.iter().find(|b| !registry.contains(&b.strategy)) {
            Some(bot) => Err(Error::NotRegistered(bot.strategy.clone())),
            None => Ok(()),
        }
    }
}

impl BotConfig {
    /// Fresh RUNNING bot run record for this definition.
    pub fn to_bot_run(&self, id: BotRunId) -> BotRun {
        BotRun {
            id,
            strategy: self.strategy.clone(),
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.clone(),
            status: BotStatus::Running,
            stopped_at: None,
            params: self.params.clone(),
        }
    }
}
