//! Signal-strategy backtest engine.
//!
//! Replays multi-product candle history through the signal generator with
//! the same sizing, stop, and capital rules the live loop uses. Exits are
//! resolved intrabar from the candle's high/low: take-profit first, then
//! trailing stop, then fixed stop. Entirely deterministic: products iterate
//! in sorted order and nothing reads the clock.

use std::collections::BTreeMap;

use crate::domain::candle::round_dp;
use crate::domain::config::BotConfig;
use crate::domain::indicator::{compute_frame, IndicatorFrame};
use crate::domain::metrics::{max_drawdown, profit_factor, sharpe_ratio};
use crate::domain::replay::{run_replay, ReplaySet, TickStrategy};
use crate::domain::signal::{SignalGenerator, SignalType};
use crate::domain::sizing::PositionSizer;
use crate::domain::stop_loss::ExitReason;

/// Bars skipped before trading starts, so every indicator has warmed up.
pub const MIN_WARMUP: usize = 30;

#[derive(Debug, Clone)]
struct BacktestPosition {
    entry_price: f64,
    size: f64,
    usd_cost: f64,
    stop_loss: f64,
    take_profit: f64,
    entry_idx: usize,
    highest_price: f64,
    trailing_stop: Option<f64>,
}

/// One simulated round trip. `pnl_pct` is a percentage of cost.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestTrade {
    pub product_id: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub usd_cost: f64,
    pub usd_return: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub exit_reason: ExitReason,
    pub entry_idx: usize,
    pub exit_idx: usize,
}

/// Aggregate backtest outcome. Dollar and percent figures rounded to 2dp.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub trades: Vec<BacktestTrade>,
    pub starting_capital: f64,
    pub ending_capital: f64,
    pub total_return_pct: f64,
    pub win_count: usize,
    pub loss_count: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub profit_factor: f64,
    pub total_pnl: f64,
}

impl BacktestResult {
    fn empty(starting_capital: f64, ending_capital: f64) -> Self {
        BacktestResult {
            trades: Vec::new(),
            starting_capital,
            ending_capital,
            total_return_pct: 0.0,
            win_count: 0,
            loss_count: 0,
            win_rate: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
            max_drawdown_pct: 0.0,
            sharpe_ratio: 0.0,
            profit_factor: 0.0,
            total_pnl: 0.0,
        }
    }
}

pub struct BacktestEngine {
    config: BotConfig,
    signal_gen: SignalGenerator,
}

struct Walker<'a> {
    config: &'a BotConfig,
    signal_gen: &'a SignalGenerator,
    sizer: PositionSizer,
    frames: &'a BTreeMap<String, IndicatorFrame>,
    capital: f64,
    positions: BTreeMap<String, BacktestPosition>,
    trades: Vec<BacktestTrade>,
    equity_curve: Vec<f64>,
}

impl Walker<'_> {
    fn check_exits(&mut self, i: usize, set: &ReplaySet) {
        let products: Vec<String> = self.positions.keys().cloned().collect();
        for pid in products {
            let candles = match set.candles(&pid) {
                Some(c) => c,
                None => continue,
            };
            let high = candles[i].high;
            let low = candles[i].low;
            let pos = self.positions.get_mut(&pid).unwrap();

            if high > pos.highest_price {
                pos.highest_price = high;
            }

            let mut exit: Option<(ExitReason, f64)> = None;

            if high >= pos.take_profit {
                exit = Some((ExitReason::TakeProfit, pos.take_profit));
            }

            // Trailing activation keys off the bar high, not the close.
            let gain_pct = (pos.highest_price - pos.entry_price) / pos.entry_price;
            if pos.trailing_stop.is_none() && gain_pct >= self.config.risk.trailing_stop_activate_pct {
                pos.trailing_stop =
                    Some(pos.highest_price * (1.0 - self.config.risk.trailing_stop_distance_pct));
            }

            if let Some(trail) = pos.trailing_stop {
                let new_trail =
                    pos.highest_price * (1.0 - self.config.risk.trailing_stop_distance_pct);
                let trail = if new_trail > trail {
                    pos.trailing_stop = Some(new_trail);
                    new_trail
                } else {
                    trail
                };
                if low <= trail && exit.is_none() {
                    exit = Some((ExitReason::TrailingStop, trail));
                }
            }

            if low <= pos.stop_loss && exit.is_none() {
                exit = Some((ExitReason::StopLoss, pos.stop_loss));
            }

            if let Some((reason, exit_price)) = exit {
                let pos = self.positions.remove(&pid).unwrap();
                self.record_close(&pid, pos, exit_price, reason, i);
            }
        }
    }

    fn record_close(
        &mut self,
        product_id: &str,
        pos: BacktestPosition,
        exit_price: f64,
        exit_reason: ExitReason,
        exit_idx: usize,
    ) {
        let usd_return = pos.size * exit_price;
        let pnl = usd_return - pos.usd_cost;
        self.trades.push(BacktestTrade {
            product_id: product_id.to_string(),
            entry_price: pos.entry_price,
            exit_price,
            size: pos.size,
            usd_cost: pos.usd_cost,
            usd_return,
            pnl,
            pnl_pct: if pos.usd_cost > 0.0 {
                pnl / pos.usd_cost * 100.0
            } else {
                0.0
            },
            exit_reason,
            entry_idx: pos.entry_idx,
            exit_idx,
        });
        self.capital += usd_return;
    }

    fn check_entries(&mut self, i: usize, set: &ReplaySet) {
        let products: Vec<String> = set.products().cloned().collect();
        for pid in products {
            if self.positions.contains_key(&pid) {
                continue;
            }
            if self.positions.len() >= self.config.risk.max_open_positions {
                break;
            }

            let candles = match set.candles(&pid) {
                Some(c) => c,
                None => continue,
            };
            let frame = &self.frames[&pid];
            let signal = self.signal_gen.generate_at(candles, frame, i, &pid);
            if signal.signal_type != SignalType::Buy {
                continue;
            }

            // Same sizer as the live loop, so notionals agree to the cent.
            let price = candles[i].close;
            let sizing = self.sizer.size(self.capital, price);
            if sizing.usd_amount < self.config.min_order_usd {
                continue;
            }
            self.capital -= sizing.usd_amount;

            self.positions.insert(
                pid,
                BacktestPosition {
                    entry_price: price,
                    size: sizing.base_size,
                    usd_cost: sizing.usd_amount,
                    stop_loss: signal.stop_loss,
                    take_profit: signal.take_profit,
                    entry_idx: i,
                    highest_price: price,
                    trailing_stop: None,
                },
            );
        }
    }

    fn track_equity(&mut self, i: usize, set: &ReplaySet) {
        let open_value: f64 = self
            .positions
            .iter()
            .map(|(pid, pos)| {
                let close = set.candles(pid).map(|c| c[i].close).unwrap_or(pos.entry_price);
                pos.size * close
            })
            .sum();
        self.equity_curve.push(self.capital + open_value);
    }
}

impl TickStrategy for Walker<'_> {
    fn on_tick(&mut self, i: usize, set: &ReplaySet) {
        self.check_exits(i, set);
        self.check_entries(i, set);
        self.track_equity(i, set);
    }
}

impl BacktestEngine {
    pub fn new(config: BotConfig) -> Self {
        let signal_gen = SignalGenerator::new(&config);
        BacktestEngine { config, signal_gen }
    }

    pub fn run(&self, set: &ReplaySet) -> BacktestResult {
        let starting_capital = self.config.signal_capital();

        if set.common_len() < MIN_WARMUP {
            return BacktestResult::empty(starting_capital, starting_capital);
        }

        let frames: BTreeMap<String, IndicatorFrame> = set
            .products()
            .map(|pid| {
                let candles = set.candles(pid).unwrap_or(&[]);
                (pid.clone(), compute_frame(candles, &self.config.indicators))
            })
            .collect();

        let mut walker = Walker {
            config: &self.config,
            signal_gen: &self.signal_gen,
            sizer: PositionSizer::new(self.config.risk.max_position_pct),
            frames: &frames,
            capital: starting_capital,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            equity_curve: vec![starting_capital],
        };

        run_replay(set, MIN_WARMUP, &mut walker);

        // Force-close whatever is still open at the last common bar.
        let last = set.common_len() - 1;
        let open: Vec<String> = walker.positions.keys().cloned().collect();
        for pid in open {
            let pos = walker.positions.remove(&pid).unwrap();
            let last_price = set
                .candles(&pid)
                .map(|c| c[last].close)
                .unwrap_or(pos.entry_price);
            walker.record_close(&pid, pos, last_price, ExitReason::EndOfData, last);
        }

        Self::calc_metrics(
            walker.trades,
            starting_capital,
            walker.capital,
            &walker.equity_curve,
        )
    }

    fn calc_metrics(
        trades: Vec<BacktestTrade>,
        starting_capital: f64,
        ending_capital: f64,
        equity_curve: &[f64],
    ) -> BacktestResult {
        if trades.is_empty() {
            return BacktestResult::empty(starting_capital, ending_capital);
        }

        let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
        let wins: Vec<f64> = pnls.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = pnls.iter().copied().filter(|p| *p <= 0.0).collect();

        let avg = |xs: &[f64]| {
            if xs.is_empty() {
                0.0
            } else {
                xs.iter().sum::<f64>() / xs.len() as f64
            }
        };

        let win_count = wins.len();
        let loss_count = losses.len();
        let total = trades.len();

        BacktestResult {
            starting_capital,
            ending_capital: round_dp(ending_capital, 2),
            total_return_pct: round_dp(
                (ending_capital - starting_capital) / starting_capital * 100.0,
                2,
            ),
            win_count,
            loss_count,
            win_rate: round_dp(win_count as f64 / total as f64, 2),
            avg_win: round_dp(avg(&wins), 2),
            avg_loss: round_dp(avg(&losses), 2),
            max_drawdown_pct: round_dp(max_drawdown(equity_curve) * 100.0, 2),
            sharpe_ratio: round_dp(sharpe_ratio(equity_curve), 2),
            profit_factor: {
                let pf = profit_factor(&pnls);
                if pf.is_finite() { round_dp(pf, 2) } else { pf }
            },
            total_pnl: round_dp(pnls.iter().sum::<f64>(), 2),
            trades,
        }
    }
}
