//! Position sizing: fixed fraction of current capital.

use crate::domain::candle::round_dp;

/// USD notional and base quantity for one entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sizing {
    pub usd_amount: f64,
    pub base_size: f64,
}

pub struct PositionSizer {
    max_position_pct: f64,
}

impl PositionSizer {
    pub fn new(max_position_pct: f64) -> Self {
        PositionSizer { max_position_pct }
    }

    /// Size an entry from available capital at the given price. The notional
    /// is rounded to cents; a non-positive price yields a zero base size.
    pub fn size(&self, capital: f64, price: f64) -> Sizing {
        let usd_amount = round_dp(capital * self.max_position_pct, 2);
        let base_size = if price > 0.0 { usd_amount / price } else { 0.0 };
        Sizing {
            usd_amount,
            base_size,
        }
    }
}
