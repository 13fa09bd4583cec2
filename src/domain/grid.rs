//! Grid trading engine.
//!
//! A grid is a ladder of limit orders around a center price: buys below,
//! sells above. A filled buy flips into a sell one spacing up at the same
//! ladder index; a filled sell realizes the spread and flips back into a
//! buy one spacing down. The ladder is re-centered when price drifts past
//! the rebalance threshold, carrying realized P&L across.

use std::collections::BTreeMap;

use crate::domain::candle::round_dp;
use crate::domain::config::GridConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelStatus {
    Pending,
    Open,
    Filled,
}

/// One rung of the ladder. Negative indices sit below the center price,
/// positive above.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLevel {
    pub index: i32,
    pub price: f64,
    pub side: Side,
    pub order_id: String,
    pub base_size: f64,
    pub status: LevelStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridState {
    pub product_id: String,
    pub center_price: f64,
    pub levels: BTreeMap<i32, GridLevel>,
    pub buys_filled: usize,
    pub sells_filled: usize,
    pub realized_pnl: f64,
}

/// Point-in-time rollup of one grid, for logs and reports.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSummary {
    pub product_id: String,
    pub center_price: f64,
    pub open_buys: usize,
    pub open_sells: usize,
    pub buys_filled: usize,
    pub sells_filled: usize,
    pub realized_pnl: f64,
}

pub struct GridEngine {
    cfg: GridConfig,
    grids: BTreeMap<String, GridState>,
}

impl GridEngine {
    pub fn new(cfg: GridConfig) -> Self {
        GridEngine {
            cfg,
            grids: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.cfg
    }

    /// Ladder prices around a center: `(index, price, side)` sorted by index.
    pub fn calculate_levels(&self, center_price: f64) -> Vec<(i32, f64, Side)> {
        let mut levels = Vec::with_capacity(self.cfg.num_levels * 2);
        for i in 1..=self.cfg.num_levels as i32 {
            let buy = center_price * (1.0 - i as f64 * self.cfg.spacing_pct);
            let sell = center_price * (1.0 + i as f64 * self.cfg.spacing_pct);
            levels.push((-i, round_dp(buy, 6), Side::Buy));
            levels.push((i, round_dp(sell, 6), Side::Sell));
        }
        levels.sort_by_key(|(idx, _, _)| *idx);
        levels
    }

    /// Build a fresh grid centered on the current price. All levels start
    /// pending with size = order notional / level price.
    pub fn initialize(&mut self, product_id: &str, current_price: f64) -> &GridState {
        let mut levels = BTreeMap::new();
        for (index, price, side) in self.calculate_levels(current_price) {
            levels.insert(
                index,
                GridLevel {
                    index,
                    price,
                    side,
                    order_id: String::new(),
                    base_size: self.cfg.order_size_usd / price,
                    status: LevelStatus::Pending,
                },
            );
        }
        let state = GridState {
            product_id: product_id.to_string(),
            center_price: current_price,
            levels,
            buys_filled: 0,
            sells_filled: 0,
            realized_pnl: 0.0,
        };
        self.grids.insert(product_id.to_string(), state);
        &self.grids[product_id]
    }

    /// True when no grid exists yet or price has drifted past the threshold.
    pub fn needs_rebalance(&self, product_id: &str, current_price: f64) -> bool {
        match self.grids.get(product_id) {
            None => true,
            Some(state) => {
                let drift = (current_price - state.center_price).abs() / state.center_price;
                drift >= self.cfg.rebalance_threshold_pct
            }
        }
    }

    /// Drop a grid, returning its realized P&L so the caller can carry it
    /// across the rebalance.
    pub fn clear(&mut self, product_id: &str) -> f64 {
        self.grids
            .remove(product_id)
            .map(|state| state.realized_pnl)
            .unwrap_or(0.0)
    }

    /// Open levels whose price falls inside the candle's `[low, high]` range
    /// are marked filled. Buys fill when `low <= price`, sells when
    /// `high >= price`.
    pub fn check_fills(&mut self, product_id: &str, low: f64, high: f64) -> Vec<GridLevel> {
        let Some(state) = self.grids.get_mut(product_id) else {
            return Vec::new();
        };

        let mut filled = Vec::new();
        for level in state.levels.values_mut() {
            if level.status != LevelStatus::Open {
                continue;
            }
            let hit = match level.side {
                Side::Buy => low <= level.price,
                Side::Sell => high >= level.price,
            };
            if hit {
                level.status = LevelStatus::Filled;
                match level.side {
                    Side::Buy => state.buys_filled += 1,
                    Side::Sell => state.sells_filled += 1,
                }
                filled.push(level.clone());
            }
        }
        filled
    }

    /// Single-price variant of [`check_fills`](Self::check_fills) for live
    /// ticks where only the last trade price is known.
    pub fn check_fills_point(&mut self, product_id: &str, price: f64) -> Vec<GridLevel> {
        self.check_fills(product_id, price, price)
    }

    /// Flip a filled level into its opposite order at the same index.
    /// Returns the replacement level (pending, not yet placed).
    pub fn handle_fill(&mut self, product_id: &str, filled: &GridLevel) -> Option<GridLevel> {
        let state = self.grids.get_mut(product_id)?;

        let new_level = match filled.side {
            Side::Buy => {
                let sell_price = filled.price * (1.0 + self.cfg.spacing_pct);
                GridLevel {
                    index: filled.index,
                    price: round_dp(sell_price, 6),
                    side: Side::Sell,
                    order_id: String::new(),
                    base_size: filled.base_size,
                    status: LevelStatus::Pending,
                }
            }
            Side::Sell => {
                let buy_price = filled.price * (1.0 - self.cfg.spacing_pct);
                let pnl = filled.base_size * (filled.price - buy_price);
                state.realized_pnl += pnl;
                GridLevel {
                    index: filled.index,
                    price: round_dp(buy_price, 6),
                    side: Side::Buy,
                    order_id: String::new(),
                    base_size: self.cfg.order_size_usd / buy_price,
                    status: LevelStatus::Pending,
                }
            }
        };

        state.levels.insert(filled.index, new_level.clone());
        Some(new_level)
    }

    /// Levels still waiting for an order to be placed.
    pub fn pending_levels(&self, product_id: &str) -> Vec<GridLevel> {
        self.grids
            .get(product_id)
            .map(|state| {
                state
                    .levels
                    .values()
                    .filter(|l| l.status == LevelStatus::Pending)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn mark_level_open(&mut self, product_id: &str, index: i32, order_id: &str) {
        if let Some(level) = self
            .grids
            .get_mut(product_id)
            .and_then(|state| state.levels.get_mut(&index))
        {
            level.order_id = order_id.to_string();
            level.status = LevelStatus::Open;
        }
    }

    /// Mark the level carrying `order_id` as filled, returning a clone of it.
    /// Used by the live path where fills arrive by order id.
    pub fn mark_level_filled(&mut self, product_id: &str, order_id: &str) -> Option<GridLevel> {
        let state = self.grids.get_mut(product_id)?;
        let level = state
            .levels
            .values_mut()
            .find(|l| l.order_id == order_id && l.status == LevelStatus::Open)?;
        level.status = LevelStatus::Filled;
        match level.side {
            Side::Buy => state.buys_filled += 1,
            Side::Sell => state.sells_filled += 1,
        }
        Some(level.clone())
    }

    pub fn state(&self, product_id: &str) -> Option<&GridState> {
        self.grids.get(product_id)
    }

    pub fn summary(&self, product_id: &str) -> Option<GridSummary> {
        self.grids.get(product_id).map(|state| {
            let open_buys = state
                .levels
                .values()
                .filter(|l| l.side == Side::Buy && l.status == LevelStatus::Open)
                .count();
            let open_sells = state
                .levels
                .values()
                .filter(|l| l.side == Side::Sell && l.status == LevelStatus::Open)
                .count();
            GridSummary {
                product_id: state.product_id.clone(),
                center_price: state.center_price,
                open_buys,
                open_sells,
                buys_filled: state.buys_filled,
                sells_filled: state.sells_filled,
                realized_pnl: round_dp(state.realized_pnl, 4),
            }
        })
    }

    /// Capital needed if every buy level of every configured pair fills.
    pub fn max_capital_required(&self) -> f64 {
        self.cfg.num_levels as f64 * self.cfg.order_size_usd * self.cfg.pairs.len() as f64
    }
}
