use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Halts trading after a run of consecutive losses and enforces an hourly
/// trade cap.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    max_consecutive_losses: u32,
    cooldown: Duration,
    max_trades_per_hour: usize,
    consecutive_losses: u32,
    tripped_until: Option<DateTime<Utc>>,
    recent_trades: VecDeque<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerStatus {
    pub is_tripped: bool,
    pub consecutive_losses: u32,
    pub max_consecutive_losses: u32,
    pub tripped_until: Option<DateTime<Utc>>,
    pub trades_last_hour: usize,
    pub max_trades_per_hour: usize,
}

impl CircuitBreaker {
    pub fn new(max_consecutive_losses: u32, cooldown_minutes: i64, max_trades_per_hour: usize) -> Self {
        Self {
            max_consecutive_losses,
            cooldown: Duration::try_minutes(cooldown_minutes.max(0)).unwrap_or(Duration::MAX),
            max_trades_per_hour,
            consecutive_losses: 0,
            tripped_until: None,
            recent_trades: VecDeque::new(),
        }
    }

    /// Record a finished trade. Returns true when this outcome tripped the
    /// breaker.
    pub fn record_outcome(&mut self, profitable: bool, at: DateTime<Utc>) -> bool {
        self.recent_trades.push_back(at);

        if profitable {
            self.consecutive_losses = 0;
            return false;
        }

        self.consecutive_losses += 1;
        let already_tripped = self.tripped_until.is_some_and(|until| at < until);
        if self.consecutive_losses >= self.max_consecutive_losses && !already_tripped {
            let until = at
                .checked_add_signed(self.cooldown)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            self.tripped_until = Some(until);
            warn!(
                losses = self.consecutive_losses,
                until = %until,
                "Circuit breaker tripped"
            );
            return true;
        }
        false
    }

    /// True while inside the cooldown. Once it has elapsed the breaker
    /// resets and the loss streak starts over.
    pub fn is_tripped_at(&mut self, now: DateTime<Utc>) -> bool {
        match self.tripped_until {
            Some(until) if now < until => true,
            Some(_) => {
                info!("Circuit breaker cooldown elapsed, resetting");
                self.tripped_until = None;
                self.consecutive_losses = 0;
                false
            }
            None => false,
        }
    }

    pub fn is_tripped(&mut self) -> bool {
        self.is_tripped_at(Utc::now())
    }

    /// True when at least `max_trades_per_hour` trades were recorded in the
    /// hour before `now`.
    pub fn rate_limited_at(&mut self, now: DateTime<Utc>) -> bool {
        self.prune(now);
        self.recent_trades.len() >= self.max_trades_per_hour
    }

    pub fn rate_limited(&mut self) -> bool {
        self.rate_limited_at(Utc::now())
    }

    pub fn tripped_until(&self) -> Option<DateTime<Utc>> {
        self.tripped_until
    }

    pub fn max_trades_per_hour(&self) -> usize {
        self.max_trades_per_hour
    }

    pub fn status_at(&mut self, now: DateTime<Utc>) -> BreakerStatus {
        let is_tripped = self.is_tripped_at(now);
        self.prune(now);
        BreakerStatus {
            is_tripped,
            consecutive_losses: self.consecutive_losses,
            max_consecutive_losses: self.max_consecutive_losses,
            tripped_until: self.tripped_until,
            trades_last_hour: self.recent_trades.len(),
            max_trades_per_hour: self.max_trades_per_hour,
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::hours(1);
        while self.recent_trades.front().is_some_and(|t| *t <= cutoff) {
            self.recent_trades.pop_front();
        }
    }
}
