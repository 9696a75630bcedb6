use serde::Serialize;

/// Tracks equity against its running peak.
#[derive(Debug, Clone)]
pub struct DrawdownTracker {
    max_drawdown: f64,
    peak_equity: f64,
    current_equity: f64,
    max_drawdown_observed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DrawdownMetrics {
    pub peak_equity: f64,
    pub current_equity: f64,
    pub current_drawdown: f64,
    pub max_drawdown_observed: f64,
    pub max_drawdown_threshold: f64,
}

impl DrawdownTracker {
    /// `max_drawdown` is a fraction of peak equity (0.25 = 25%).
    pub fn new(max_drawdown: f64) -> Self {
        Self {
            max_drawdown,
            peak_equity: 0.0,
            current_equity: 0.0,
            max_drawdown_observed: 0.0,
        }
    }

    pub fn update_equity(&mut self, equity: f64) {
        self.current_equity = equity;
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        let dd = self.current_drawdown();
        if dd > self.max_drawdown_observed {
            self.max_drawdown_observed = dd;
        }
    }

    /// `(peak - current) / peak`, or 0 before any positive equity was seen.
    pub fn current_drawdown(&self) -> f64 {
        if self.peak_equity <= 0.0 {
            return 0.0;
        }
        (self.peak_equity - self.current_equity) / self.peak_equity
    }

    pub fn is_exceeded(&self) -> bool {
        self.current_drawdown() > self.max_drawdown
    }

    pub fn current_equity(&self) -> f64 {
        self.current_equity
    }

    pub fn metrics(&self) -> DrawdownMetrics {
        DrawdownMetrics {
            peak_equity: self.peak_equity,
            current_equity: self.current_equity,
            current_drawdown: self.current_drawdown(),
            max_drawdown_observed: self.max_drawdown_observed,
            max_drawdown_threshold: self.max_drawdown,
        }
    }
}
