//! Stop-loss, take-profit, and trailing stop tracking for open positions.

use std::collections::BTreeMap;

use crate::domain::config::BotConfig;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    EndOfData,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::EndOfData => "end_of_data",
        }
    }
}

/// Per-position stop tracking state. `trailing_stop` is `None` until the
/// activation gain is reached.
#[derive(Debug, Clone, PartialEq)]
pub struct StopState {
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub highest_price: f64,
    pub trailing_stop: Option<f64>,
}

pub struct StopLossEngine {
    trailing_activate_pct: f64,
    trailing_distance_pct: f64,
    positions: BTreeMap<String, StopState>,
}

impl StopLossEngine {
    pub fn new(config: &BotConfig) -> Self {
        StopLossEngine {
            trailing_activate_pct: config.risk.trailing_stop_activate_pct,
            trailing_distance_pct: config.risk.trailing_stop_distance_pct,
            positions: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, product_id: &str, entry_price: f64, stop_loss: f64, take_profit: f64) {
        self.positions.insert(
            product_id.to_string(),
            StopState {
                entry_price,
                stop_loss,
                take_profit,
                highest_price: entry_price,
                trailing_stop: None,
            },
        );
    }

    pub fn unregister(&mut self, product_id: &str) {
        self.positions.remove(product_id);
    }

    pub fn state(&self, product_id: &str) -> Option<&StopState> {
        self.positions.get(product_id)
    }

    pub fn tracked_products(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    /// Evaluate exit conditions against a new price. Take-profit is checked
    /// before the trailing stop, which is checked before the fixed stop.
    pub fn check(&mut self, product_id: &str, current_price: f64) -> Option<ExitReason> {
        let state = self.positions.get_mut(product_id)?;

        if current_price > state.highest_price {
            state.highest_price = current_price;
        }

        if current_price >= state.take_profit {
            return Some(ExitReason::TakeProfit);
        }

        let gain_pct = (current_price - state.entry_price) / state.entry_price;
        if state.trailing_stop.is_none() && gain_pct >= self.trailing_activate_pct {
            state.trailing_stop = Some(current_price * (1.0 - self.trailing_distance_pct));
        }

        if let Some(trail) = state.trailing_stop {
            let new_trail = state.highest_price * (1.0 - self.trailing_distance_pct);
            let trail = if new_trail > trail {
                state.trailing_stop = Some(new_trail);
                new_trail
            } else {
                trail
            };
            if current_price <= trail {
                return Some(ExitReason::TrailingStop);
            }
        }

        if current_price <= state.stop_loss {
            return Some(ExitReason::StopLoss);
        }

        None
    }
}
