use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Strategy-specific parameters, typically read from a `[bot.params]` TOML
/// table. Missing or mistyped keys fall back to the caller's default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyParams(HashMap<String, toml::Value>);

impl StrategyParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Floats and integers are both accepted.
    pub fn f64(&self, key: &str, default: f64) -> f64 {
        match self.0.get(key) {
            Some(toml::Value::Float(v)) => *v,
            Some(toml::Value::Integer(v)) => *v as f64,
            _ => default,
        }
    }

    pub fn usize(&self, key: &str, default: usize) -> usize {
        self.0
            .get(key)
            .and_then(|v| v.as_integer())
            .filter(|v| *v >= 0)
            .map(|v| v as usize)
            .unwrap_or(default)
    }

    pub fn str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.0.get(key).and_then(|v| v.as_str()).unwrap_or(default)
    }
}

impl From<HashMap<String, toml::Value>> for StrategyParams {
    fn from(map: HashMap<String, toml::Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_accepted_as_floats() {
        let params = StrategyParams::new().set("overbought", 75_i64);
        assert_eq!(params.f64("overbought", 70.0), 75.0);
    }

    #[test]
    fn missing_or_mistyped_keys_use_default() {
        let params = StrategyParams::new().set("period", "fourteen").set("window", -3_i64);
        assert_eq!(params.usize("period", 14), 14);
        assert_eq!(params.usize("window", 20), 20);
        assert_eq!(params.str("oscillator", "RSI"), "RSI");
    }
}
