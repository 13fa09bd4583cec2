//! Grid-strategy backtest engine.
//!
//! Replays candle history through the grid engine. Fresh grids open all
//! their levels immediately (no resting-order latency is simulated) and
//! fills resolve against each candle's high/low range.

use crate::domain::candle::round_dp;
use crate::domain::config::BotConfig;
use crate::domain::grid::{GridEngine, Side};
use crate::domain::replay::{run_replay, ReplaySet, TickStrategy};

/// One simulated grid fill. Buys carry zero P&L; the spread is realized on
/// the sell leg.
#[derive(Debug, Clone, PartialEq)]
pub struct GridBacktestTrade {
    pub product_id: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub pnl: f64,
    pub candle_idx: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridBacktestResult {
    pub trades: Vec<GridBacktestTrade>,
    pub total_pnl: f64,
    pub total_buys: usize,
    pub total_sells: usize,
    pub grid_capital: f64,
    pub return_pct: f64,
    pub max_deployed: f64,
    pub num_rebalances: usize,
}

impl GridBacktestResult {
    fn empty(grid_capital: f64) -> Self {
        GridBacktestResult {
            trades: Vec::new(),
            total_pnl: 0.0,
            total_buys: 0,
            total_sells: 0,
            grid_capital,
            return_pct: 0.0,
            max_deployed: 0.0,
            num_rebalances: 0,
        }
    }
}

pub struct GridBacktestEngine {
    config: BotConfig,
}

struct GridWalker<'a> {
    grid: GridEngine,
    pairs: &'a [String],
    spacing_pct: f64,
    trades: Vec<GridBacktestTrade>,
    total_pnl: f64,
    total_buys: usize,
    total_sells: usize,
    deployed: f64,
    max_deployed: f64,
    num_rebalances: usize,
}

impl TickStrategy for GridWalker<'_> {
    fn on_tick(&mut self, i: usize, set: &ReplaySet) {
        for pid in self.pairs {
            let Some(candles) = set.candles(pid) else {
                continue;
            };
            let close = candles[i].close;
            let low = candles[i].low;
            let high = candles[i].high;

            if self.grid.needs_rebalance(pid, close) {
                let preserved = self.grid.clear(pid);
                self.total_pnl += preserved;
                self.grid.initialize(pid, close);
                self.num_rebalances += 1;

                // A backtest grid has no order latency: open everything now.
                for level in self.grid.pending_levels(pid) {
                    self.grid
                        .mark_level_open(pid, level.index, &format!("bt-{i}-{}", level.index));
                }
            }

            let filled = self.grid.check_fills(pid, low, high);
            for level in filled {
                let mut pnl = 0.0;
                match level.side {
                    Side::Buy => {
                        self.deployed += level.base_size * level.price;
                        self.total_buys += 1;
                    }
                    Side::Sell => {
                        let buy_price = level.price * (1.0 - self.spacing_pct);
                        pnl = level.base_size * (level.price - buy_price);
                        self.total_pnl += pnl;
                        self.deployed -= level.base_size * buy_price;
                        self.total_sells += 1;
                    }
                }

                self.trades.push(GridBacktestTrade {
                    product_id: pid.clone(),
                    side: level.side,
                    price: level.price,
                    size: level.base_size,
                    pnl,
                    candle_idx: i,
                });

                if let Some(new_level) = self.grid.handle_fill(pid, &level) {
                    self.grid
                        .mark_level_open(pid, new_level.index, &format!("bt-{i}-{}", new_level.index));
                }
            }

            if self.deployed > self.max_deployed {
                self.max_deployed = self.deployed;
            }
        }
    }
}

impl GridBacktestEngine {
    pub fn new(config: BotConfig) -> Self {
        GridBacktestEngine { config }
    }

    pub fn run(&self, set: &ReplaySet) -> GridBacktestResult {
        let grid_cfg = &self.config.grid;
        let grid_capital = grid_cfg.grid_capital_usd;

        // Configured pairs we actually have data for, in sorted order.
        let mut pairs: Vec<String> = grid_cfg
            .pairs
            .iter()
            .filter(|p| set.candles(p).is_some())
            .cloned()
            .collect();
        pairs.sort();

        if pairs.is_empty() || set.common_len() < 2 {
            return GridBacktestResult::empty(grid_capital);
        }

        let mut walker = GridWalker {
            grid: GridEngine::new(grid_cfg.clone()),
            pairs: &pairs,
            spacing_pct: grid_cfg.spacing_pct,
            trades: Vec::new(),
            total_pnl: 0.0,
            total_buys: 0,
            total_sells: 0,
            deployed: 0.0,
            max_deployed: 0.0,
            num_rebalances: 0,
        };

        run_replay(set, 0, &mut walker);

        let return_pct = if grid_capital > 0.0 {
            walker.total_pnl / grid_capital * 100.0
        } else {
            0.0
        };

        GridBacktestResult {
            trades: walker.trades,
            total_pnl: round_dp(walker.total_pnl, 4),
            total_buys: walker.total_buys,
            total_sells: walker.total_sells,
            grid_capital,
            return_pct: round_dp(return_pct, 2),
            max_deployed: round_dp(walker.max_deployed, 2),
            num_rebalances: walker.num_rebalances,
        }
    }
}
