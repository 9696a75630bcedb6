use std::sync::Arc;

use tracing::{error, info};

use common::{BotRunId, Error, OrderSide, Result, TradeRecord, TradeStore};

/// Net position held by one bot. Positive quantity is long, negative short.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionBook {
    pub quantity: f64,
    pub avg_price: f64,
}

impl PositionBook {
    /// Realized PnL of trading `quantity` at `price`, and the resulting
    /// position. Trades that only open or extend a position realize nothing.
    pub fn apply(&self, side: OrderSide, quantity: f64, price: f64) -> (f64, PositionBook) {
        let signed = match side {
            OrderSide::Buy => quantity,
            OrderSide::Sell => -quantity,
        };

        let same_direction = self.quantity == 0.0 || self.quantity.signum() == signed.signum();
        if same_direction {
            let new_qty = self.quantity + signed;
            let avg_price = (self.avg_price * self.quantity.abs() + price * quantity) / new_qty.abs();
            return (0.0, PositionBook { quantity: new_qty, avg_price });
        }

        let closing = quantity.min(self.quantity.abs());
        let pnl = (price - self.avg_price) * closing * self.quantity.signum();
        let new_qty = self.quantity + signed;
        let next = if new_qty.abs() < 1e-12 {
            PositionBook::default()
        } else if new_qty.signum() == self.quantity.signum() {
            PositionBook { quantity: new_qty, avg_price: self.avg_price }
        } else {
            // flipped through zero; the remainder opens at this price
            PositionBook { quantity: new_qty, avg_price: price }
        };
        (pnl, next)
    }
}

/// Turns approved signals into persisted trade records for one bot.
///
/// The position book only advances once the trade record is written, so a
/// failed write leaves the bot's state untouched.
pub struct TradeExecutor {
    bot_run_id: BotRunId,
    store: Arc<dyn TradeStore>,
    book: PositionBook,
}

impl TradeExecutor {
    pub fn new(bot_run_id: BotRunId, store: Arc<dyn TradeStore>) -> Self {
        Self {
            bot_run_id,
            store,
            book: PositionBook::default(),
        }
    }

    pub fn position(&self) -> PositionBook {
        self.book
    }

    pub async fn execute(&mut self, side: OrderSide, quantity: f64, price: f64) -> Result<TradeRecord> {
        let (pnl, next) = self.book.apply(side, quantity, price);
        let trade = TradeRecord::new(self.bot_run_id, side, quantity, price, pnl);

        if let Err(e) = self.store.write_trade(&trade).await {
            error!(bot_id = self.bot_run_id, side = %side, error = %e, "Failed to persist trade");
            return Err(match e {
                Error::TradeWrite(_) => e,
                other => Error::TradeWrite(other.to_string()),
            });
        }

        self.book = next;
        info!(
            bot_id = self.bot_run_id,
            side = %side,
            qty = quantity,
            price,
            pnl,
            position = self.book.quantity,
            "Trade executed"
        );
        Ok(trade)
    }
}
