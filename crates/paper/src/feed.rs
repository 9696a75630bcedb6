use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{Candle, CandleSource, Error, Result};

/// Longest history kept per series.
const MAX_HISTORY: usize = 1_000;

/// Seeded random-walk candle source for paper trading.
///
/// Each (symbol, timeframe) pair gets its own deterministic series. Every
/// fetch advances the walk by one bar, so a polling bot sees the market move.
pub struct PaperFeed {
    seed: u64,
    /// Close of the newest bar when a series is first requested.
    start_price: f64,
    /// Largest per-bar relative move (0.01 = 1%).
    volatility: f64,
    series: Arc<RwLock<HashMap<(String, String), Series>>>,
}

struct Series {
    rng: StdRng,
    bar: Duration,
    candles: Vec<Candle>,
}

impl PaperFeed {
    pub fn new(seed: u64) -> Self {
        info!(seed, "PaperFeed initialized");
        Self {
            seed,
            start_price: 100.0,
            volatility: 0.01,
            series: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_start_price(mut self, price: f64) -> Self {
        self.start_price = price;
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility.abs();
        self
    }

    fn series_seed(&self, symbol: &str, timeframe: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        (symbol, timeframe).hash(&mut hasher);
        self.seed ^ hasher.finish()
    }

    fn next_candle(&self, rng: &mut StdRng, open: f64, open_time: DateTime<Utc>) -> Candle {
        let vol = self.volatility;
        let change = if vol > 0.0 { rng.gen_range(-vol..=vol) } else { 0.0 };
        let close = (open * (1.0 + change)).max(f64::EPSILON);
        let wick = open * vol * rng.gen::<f64>() * 0.5;
        Candle {
            open_time,
            open,
            high: open.max(close) + wick,
            low: (open.min(close) - wick).max(f64::EPSILON),
            close,
            volume: rng.gen_range(50.0..150.0),
        }
    }

    /// `count` bars walked backwards from `close` so that the newest one
    /// opens one `bar` before `next_open_time` and closes at `close`.
    fn history_before(
        &self,
        rng: &mut StdRng,
        bar: Duration,
        count: usize,
        next_open_time: DateTime<Utc>,
        close: f64,
    ) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(count);
        let mut price = close;
        for i in 1..=count {
            let fwd = self.next_candle(rng, price, next_open_time - bar * i as i32);
            // mirror a forward bar so it ends where the later one begins
            let candle = Candle { open: fwd.close, close: fwd.open, ..fwd };
            price = candle.open;
            candles.push(candle);
        }
        candles.reverse();
        candles
    }
}

/// Bar length for timeframes like "1m", "15m", "4h", "1d", "1w".
pub(crate) fn parse_timeframe(timeframe: &str) -> Option<Duration> {
    let tf = timeframe.trim();
    let unit = tf.chars().last()?;
    let n: i64 = tf[..tf.len() - unit.len_utf8()].parse().ok().filter(|n| *n > 0)?;
    match unit {
        'm' => Some(Duration::minutes(n)),
        'h' => Some(Duration::hours(n)),
        'd' => Some(Duration::days(n)),
        'w' => Some(Duration::weeks(n)),
        _ => None,
    }
}

#[async_trait]
impl CandleSource for PaperFeed {
    async fn fetch_candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>> {
        let bar = parse_timeframe(timeframe)
            .ok_or_else(|| Error::CandleFetch(format!("unsupported timeframe '{timeframe}'")))?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let key = (symbol.to_string(), timeframe.to_string());
        let mut all = self.series.write().await;

        match all.get_mut(&key) {
            Some(series) => {
                let last = series.candles.last().cloned();
                if let Some(last) = last {
                    let next = self.next_candle(&mut series.rng, last.close, last.open_time + series.bar);
                    series.candles.push(next);
                }
                let missing = limit.saturating_sub(series.candles.len());
                let first = series.candles.first().cloned();
                if let Some(first) = first.filter(|_| missing > 0) {
                    let mut older =
                        self.history_before(&mut series.rng, series.bar, missing, first.open_time, first.open);
                    older.append(&mut series.candles);
                    series.candles = older;
                }
                let excess = series.candles.len().saturating_sub(MAX_HISTORY.max(limit));
                series.candles.drain(..excess);
            }
            None => {
                let mut rng = StdRng::seed_from_u64(self.series_seed(symbol, timeframe));
                let candles = self.history_before(&mut rng, bar, limit, Utc::now(), self.start_price);
                debug!(symbol, timeframe, bars = candles.len(), "Paper series created");
                all.insert(key.clone(), Series { rng, bar, candles });
            }
        }

        let candles = &all[&key].candles;
        Ok(candles[candles.len().saturating_sub(limit)..].to_vec())
    }
}
