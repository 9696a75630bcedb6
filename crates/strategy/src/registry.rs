use std::collections::BTreeMap;
use std::sync::OnceLock;

use tracing::{debug, info};

use common::{Error, Result, StrategyParams};

use crate::strategies::{
    BreakoutStrategy, CandlePatternOscillatorStrategy, MacdCrossStrategy, MeanReversionStrategy,
    MovingAverageCrossStrategy, RsiCrossStrategy, TradingViewStrategy, VwapStrategy,
};
use crate::Strategy;

/// Constructor for a strategy variant, keyed by its registry name.
#[derive(Clone, Copy)]
pub struct StrategyEntry {
    pub name: &'static str,
    pub build: fn(&StrategyParams) -> Box<dyn Strategy>,
}

impl std::fmt::Debug for StrategyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyEntry").field("name", &self.name).finish()
    }
}

/// Name → constructor table for strategy variants.
///
/// Filled once at startup, then only read. Every `create` call returns a
/// fresh instance so bots never share hysteresis state.
#[derive(Debug, Default)]
pub struct StrategyRegistry {
    entries: BTreeMap<&'static str, StrategyEntry>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in variant registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for entry in builtin_entries() {
            // names in the built-in table are unique and non-empty
            if let Err(e) = registry.register(entry) {
                debug!(error = %e, "Skipping built-in strategy");
            }
        }
        registry
    }

    /// Process-wide registry of the built-in variants.
    pub fn builtin() -> &'static StrategyRegistry {
        static BUILTIN: OnceLock<StrategyRegistry> = OnceLock::new();
        BUILTIN.get_or_init(Self::with_builtins)
    }

    /// Add a variant. Blank and already-registered names are rejected.
    pub fn register(&mut self, entry: StrategyEntry) -> Result<()> {
        if entry.name.trim().is_empty() {
            return Err(Error::DuplicateOrMissingName(
                "strategy entry has no name".into(),
            ));
        }
        if self.entries.contains_key(entry.name) {
            return Err(Error::DuplicateOrMissingName(format!(
                "strategy '{}' is already registered",
                entry.name
            )));
        }
        info!(strategy = entry.name, "Registered strategy");
        self.entries.insert(entry.name, entry);
        Ok(())
    }

    /// Fresh instance of `name` with default parameters.
    pub fn create(&self, name: &str) -> Result<Box<dyn Strategy>> {
        self.create_with(name, &StrategyParams::new())
    }

    /// Fresh instance of `name` configured from `params`. Unknown or
    /// mistyped keys fall back to the variant's defaults.
    pub fn create_with(&self, name: &str, params: &StrategyParams) -> Result<Box<dyn Strategy>> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| Error::NotRegistered(name.to_string()))?;
        Ok((entry.build)(params))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in lexicographic order.
    pub fn list_names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }
}

fn builtin_entries() -> [StrategyEntry; 8] {
    [
        StrategyEntry {
            name: RsiCrossStrategy::NAME,
            build: |p| Box::new(RsiCrossStrategy::from_params(p)),
        },
        StrategyEntry {
            name: MeanReversionStrategy::NAME,
            build: |p| Box::new(MeanReversionStrategy::from_params(p)),
        },
        StrategyEntry {
            name: BreakoutStrategy::NAME,
            build: |p| Box::new(BreakoutStrategy::from_params(p)),
        },
        StrategyEntry {
            name: VwapStrategy::NAME,
            build: |p| Box::new(VwapStrategy::from_params(p)),
        },
        StrategyEntry {
            name: MacdCrossStrategy::NAME,
            build: |p| Box::new(MacdCrossStrategy::from_params(p)),
        },
        StrategyEntry {
            name: MovingAverageCrossStrategy::NAME,
            build: |p| Box::new(MovingAverageCrossStrategy::from_params(p)),
        },
        StrategyEntry {
            name: CandlePatternOscillatorStrategy::NAME,
            build: |p| Box::new(CandlePatternOscillatorStrategy::from_params(p)),
        },
        StrategyEntry {
            name: TradingViewStrategy::NAME,
            build: |p| Box::new(TradingViewStrategy::from_params(p)),
        },
    ]
}
