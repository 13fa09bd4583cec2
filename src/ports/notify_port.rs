//! Notification port trait.

use crate::domain::portfolio::{ClosedTrade, Position};

pub trait NotifyPort {
    /// Deliver one message. Delivery failures must not abort trading.
    fn send(&self, text: &str);

    fn trade_opened(&self, position: &Position) {
        self.send(&format!(
            "OPENED {} | entry ${:.6} | size {:.8} | ${:.2}\nstop ${:.6} | target ${:.6}",
            position.product_id,
            position.entry_price,
            position.size,
            position.usd_cost,
            position.stop_loss,
            position.take_profit,
        ));
    }

    fn trade_closed(&self, trade: &ClosedTrade) {
        let tag = if trade.pnl > 0.0 { "WIN" } else { "LOSS" };
        self.send(&format!(
            "CLOSED {} [{}] | {} | exit ${:.6} | pnl ${:.2} ({:+.2}%)",
            trade.product_id,
            tag,
            trade.exit_reason.as_str(),
            trade.exit_price,
            trade.pnl,
            trade.pnl_pct,
        ));
    }

    fn daily_limit_hit(&self, loss_today: f64) {
        self.send(&format!(
            "DAILY LOSS LIMIT HIT: ${loss_today:.2} lost today. New entries paused until tomorrow."
        ));
    }

    fn error(&self, context: &str, detail: &str) {
        self.send(&format!("ERROR in {context}: {detail}"));
    }
}
