//! Live trading orchestrator.
//!
//! One `tick` runs the signal strategy (exits, then entries unless the
//! daily loss gate is paused) and then the grid strategy. Failures on one
//! product are reported and skipped so the rest of the tick still runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Local;

use crate::domain::backtest::MIN_WARMUP;
use crate::domain::candle::round_dp;
use crate::domain::config::{BotConfig, BotMode, StrategyMode};
use crate::domain::error::TraderError;
use crate::domain::grid::{GridEngine, GridLevel, LevelStatus, Side};
use crate::domain::indicator::compute_frame;
use crate::domain::portfolio::{PortfolioLedger, Position};
use crate::domain::risk::RiskGate;
use crate::domain::signal::{Signal, SignalGenerator, SignalType};
use crate::domain::sizing::PositionSizer;
use crate::domain::stop_loss::StopLossEngine;
use crate::ports::broker_port::{BrokerPort, OrderStatus};
use crate::ports::market_port::MarketPort;
use crate::ports::notify_port::NotifyPort;
use crate::ports::store_port::{DailyPerformance, GridOrderRecord, StorePort};

pub struct LiveTrader {
    config: BotConfig,
    market: Box<dyn MarketPort>,
    broker: Box<dyn BrokerPort>,
    store: Box<dyn StorePort>,
    notify: Box<dyn NotifyPort>,
    signal_gen: SignalGenerator,
    sizer: PositionSizer,
    risk: RiskGate,
    stops: StopLossEngine,
    ledger: PortfolioLedger,
    grid: Option<GridEngine>,
    grid_pnl_total: f64,
    last_summary_date: chrono::NaiveDate,
}

impl LiveTrader {
    pub fn new(
        config: BotConfig,
        market: Box<dyn MarketPort>,
        broker: Box<dyn BrokerPort>,
        store: Box<dyn StorePort>,
        notify: Box<dyn NotifyPort>,
    ) -> Self {
        let signal_gen = SignalGenerator::new(&config);
        let sizer = PositionSizer::new(config.risk.max_position_pct);
        let risk = RiskGate::new(&config);
        let stops = StopLossEngine::new(&config);
        let ledger = PortfolioLedger::new(config.signal_capital());

        let grid = if config.grid.enabled
            && matches!(config.strategy_mode, StrategyMode::Grid | StrategyMode::Both)
        {
            Some(GridEngine::new(config.grid.clone()))
        } else {
            None
        };

        LiveTrader {
            config,
            market,
            broker,
            store,
            notify,
            signal_gen,
            sizer,
            risk,
            stops,
            ledger,
            grid,
            grid_pnl_total: 0.0,
            last_summary_date: Local::now().date_naive(),
        }
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    pub fn grid_pnl(&self) -> f64 {
        let open_pnl: f64 = self
            .grid
            .as_ref()
            .map(|grid| {
                self.config
                    .grid
                    .pairs
                    .iter()
                    .filter_map(|pid| grid.state(pid).map(|s| s.realized_pnl))
                    .sum()
            })
            .unwrap_or(0.0);
        self.grid_pnl_total + open_pnl
    }

    /// One iteration of the main loop. Returns the number of product-level
    /// failures that were reported and skipped.
    pub fn tick(&mut self) -> usize {
        let mut failures = 0;

        if matches!(
            self.config.strategy_mode,
            StrategyMode::Signal | StrategyMode::Both
        ) {
            failures += self.check_exits();
            if !self.risk.is_paused() {
                failures += self.check_entries();
            }
        }

        if self.grid.is_some() {
            failures += self.grid_tick();
        }

        let today = Local::now().date_naive();
        if today != self.last_summary_date {
            self.daily_summary(today);
            self.last_summary_date = today;
        }

        failures
    }

    /// Run the loop until `stop` is raised or `max_ticks` is exhausted.
    /// A failed tick is reported and followed by a doubled sleep.
    pub fn run(&mut self, stop: &AtomicBool, max_ticks: Option<u64>) {
        self.notify.send(&format!(
            "Bot started ({:?} mode, {:?})\nSignal capital: ${:.2}\nPairs: {}",
            self.config.mode,
            self.config.strategy_mode,
            self.ledger.capital,
            self.config.trading_pairs.len(),
        ));

        let interval = Duration::from_secs(self.config.loop_interval_secs);
        let mut ticks: u64 = 0;

        loop {
            if stop.load(Ordering::Relaxed) {
                break;
            }

            let failed = self.tick() > 0;

            ticks += 1;
            if let Some(max) = max_ticks {
                if ticks >= max {
                    break;
                }
            }

            std::thread::sleep(if failed { interval * 2 } else { interval });
        }
    }

    fn check_exits(&mut self) -> usize {
        let mut failures = 0;
        for product_id in self.ledger.open_products() {
            if let Err(e) = self.check_exit(&product_id) {
                self.notify
                    .error(&format!("exit check {product_id}"), &e.to_string());
                failures += 1;
            }
        }
        failures
    }

    fn check_exit(&mut self, product_id: &str) -> Result<(), TraderError> {
        let price = self.market.current_price(product_id)?;
        if let Some(reason) = self.stops.check(product_id, price) {
            let pos = match self.ledger.position(product_id) {
                Some(p) => p.clone(),
                None => return Ok(()),
            };
            self.broker.sell(product_id, pos.size, price)?;
            let Some(closed) = self.ledger.close(product_id, price, reason) else {
                return Ok(());
            };
            self.stops.unregister(product_id);

            // The trade is realized at this point. Record the loss and tell
            // the operator before anything fallible runs, so a store outage
            // cannot leave the daily loss gate blind to a real loss.
            if closed.pnl < 0.0 {
                self.risk.record_loss(closed.pnl);
                if self.risk.is_paused() {
                    self.notify.daily_limit_hit(self.risk.daily_loss());
                }
            }
            self.notify.trade_closed(&closed);

            if let Err(e) = self.store.save_trade_close(&closed) {
                self.notify
                    .error(&format!("store close {product_id}"), &e.to_string());
            }
        }
        Ok(())
    }

    fn check_entries(&mut self) -> usize {
        let mut failures = 0;
        let pairs = self.config.trading_pairs.clone();
        for product_id in pairs {
            if self.ledger.position(&product_id).is_some() {
                continue;
            }
            if let Err(e) = self.check_entry(&product_id) {
                self.notify
                    .error(&format!("entry check {product_id}"), &e.to_string());
                failures += 1;
            }
        }
        failures
    }

    fn check_entry(&mut self, product_id: &str) -> Result<(), TraderError> {
        if self
            .risk
            .can_trade(product_id, self.ledger.open_position_count())
            .is_some()
        {
            return Ok(());
        }

        let candles = self.market.candles(
            product_id,
            self.config.strategy.candle_granularity,
            self.config.strategy.lookback_candles,
        )?;
        if candles.len() < MIN_WARMUP {
            return Ok(());
        }

        let frame = compute_frame(&candles, &self.config.indicators);
        let signal = self.signal_gen.generate(&candles, &frame, product_id);

        match signal.signal_type {
            SignalType::Buy => {
                let acted = self.open_position(product_id, &signal)?;
                self.store.save_signal(&signal, acted)?;
            }
            SignalType::Sell => {
                self.store.save_signal(&signal, false)?;
            }
            SignalType::Hold => {}
        }
        Ok(())
    }

    fn open_position(&mut self, product_id: &str, signal: &Signal) -> Result<bool, TraderError> {
        let sizing = self.sizer.size(self.ledger.capital, signal.price);
        if sizing.usd_amount < self.config.min_order_usd {
            return Ok(false);
        }

        let fill = self
            .broker
            .buy(product_id, sizing.usd_amount, signal.price)?;

        let position = Position {
            product_id: product_id.to_string(),
            entry_price: fill.price,
            size: fill.size,
            usd_cost: sizing.usd_amount,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            order_id: fill.order_id,
        };
        // The buy has executed, so commit the stop and ledger state before
        // the fallible store write. Otherwise a store error would leave the
        // broker holding a position the ledger never deducted capital for.
        self.stops
            .register(product_id, fill.price, signal.stop_loss, signal.take_profit);
        self.ledger.open(position.clone());
        if let Err(e) = self.store.save_trade_open(&position) {
            self.notify
                .error(&format!("store open {product_id}"), &e.to_string());
        }
        self.notify.trade_opened(&position);
        Ok(true)
    }

    fn grid_tick(&mut self) -> usize {
        let mut failures = 0;
        let pairs = self.config.grid.pairs.clone();
        for product_id in pairs {
            if self.risk.is_protected(&product_id) {
                continue;
            }
            if let Err(e) = self.grid_tick_product(&product_id) {
                self.notify
                    .error(&format!("grid tick {product_id}"), &e.to_string());
                failures += 1;
            }
        }
        failures
    }

    fn grid_tick_product(&mut self, product_id: &str) -> Result<(), TraderError> {
        let price = self.market.current_price(product_id)?;

        let needs_rebalance = self
            .grid
            .as_ref()
            .is_some_and(|g| g.needs_rebalance(product_id, price));
        if needs_rebalance {
            self.grid_rebalance(product_id, price)?;
        }

        let pending = self
            .grid
            .as_ref()
            .map(|g| g.pending_levels(product_id))
            .unwrap_or_default();
        for level in pending {
            self.grid_place_order(product_id, &level)?;
        }

        match self.config.mode {
            BotMode::Paper => self.grid_check_paper_fills(product_id, price),
            BotMode::Live => self.grid_check_live_fills(product_id),
        }
    }

    fn grid_rebalance(&mut self, product_id: &str, price: f64) -> Result<(), TraderError> {
        let Some(grid) = self.grid.as_mut() else {
            return Ok(());
        };
        self.grid_pnl_total += grid.clear(product_id);

        let order_ids = self.store.cancel_grid_orders(product_id)?;
        if self.config.mode == BotMode::Live {
            for order_id in &order_ids {
                if let Err(e) = self.broker.cancel(order_id) {
                    self.notify
                        .error(&format!("cancel {order_id}"), &e.to_string());
                }
            }
        }

        if let Some(grid) = self.grid.as_mut() {
            grid.initialize(product_id, price);
        }
        Ok(())
    }

    fn grid_place_order(&mut self, product_id: &str, level: &GridLevel) -> Result<(), TraderError> {
        let order = match level.side {
            Side::Buy => self
                .broker
                .limit_buy(product_id, level.base_size, level.price)?,
            Side::Sell => self
                .broker
                .limit_sell(product_id, level.base_size, level.price)?,
        };

        if let Some(grid) = self.grid.as_mut() {
            grid.mark_level_open(product_id, level.index, &order.order_id);
        }
        self.store.save_grid_order(&GridOrderRecord {
            order_id: order.order_id,
            product_id: product_id.to_string(),
            side: level.side,
            price: level.price,
            base_size: level.base_size,
        })?;
        Ok(())
    }

    /// Paper mode approximates the fill range with the current tick price.
    fn grid_check_paper_fills(&mut self, product_id: &str, price: f64) -> Result<(), TraderError> {
        let filled = match self.grid.as_mut() {
            Some(grid) => grid.check_fills_point(product_id, price),
            None => return Ok(()),
        };

        for level in filled {
            self.grid_settle_fill(product_id, &level, price)?;
        }
        Ok(())
    }

    /// Live mode polls the broker for the status of each resting order.
    fn grid_check_live_fills(&mut self, product_id: &str) -> Result<(), TraderError> {
        let open_orders: Vec<String> = match self.grid.as_ref().and_then(|g| g.state(product_id)) {
            Some(state) => state
                .levels
                .values()
                .filter(|l| l.status == LevelStatus::Open && !l.order_id.is_empty())
                .map(|l| l.order_id.clone())
                .collect(),
            None => return Ok(()),
        };

        for order_id in open_orders {
            let status = match self.broker.order_status(&order_id) {
                Ok(s) => s,
                Err(e) => {
                    self.notify
                        .error(&format!("grid order {order_id}"), &e.to_string());
                    continue;
                }
            };
            if let OrderStatus::Filled { price } = status {
                let level = self
                    .grid
                    .as_mut()
                    .and_then(|g| g.mark_level_filled(product_id, &order_id));
                if let Some(level) = level {
                    self.grid_settle_fill(product_id, &level, price)?;
                }
            }
        }
        Ok(())
    }

    fn grid_settle_fill(
        &mut self,
        product_id: &str,
        level: &GridLevel,
        fill_price: f64,
    ) -> Result<(), TraderError> {
        let pnl = match level.side {
            Side::Sell => {
                let buy_price = level.price * (1.0 - self.config.grid.spacing_pct);
                level.base_size * (level.price - buy_price)
            }
            Side::Buy => 0.0,
        };
        self.store.fill_grid_order(&level.order_id, fill_price, pnl)?;

        let replacement = self
            .grid
            .as_mut()
            .and_then(|g| g.handle_fill(product_id, level));
        if let Some(new_level) = replacement {
            self.grid_place_order(product_id, &new_level)?;
        }

        let pnl_line = if pnl > 0.0 {
            format!("\nP&L: +${pnl:.4}")
        } else {
            String::new()
        };
        self.notify.send(&format!(
            "GRID {} FILLED {product_id}\nPrice: ${:.4}\nSize: {:.8}{pnl_line}",
            level.side, level.price, level.base_size,
        ));
        Ok(())
    }

    fn daily_summary(&mut self, today: chrono::NaiveDate) {
        let mut prices = std::collections::BTreeMap::new();
        for pid in self.ledger.open_products() {
            if let Ok(price) = self.market.current_price(&pid) {
                prices.insert(pid, price);
            }
        }
        let summary = self.ledger.summary(&prices);

        let mut text = format!(
            "Daily summary\nCapital: ${:.2}\nTrades: {} (W:{} L:{})\nRealized: ${:.2} Unrealized: ${:.2}",
            summary.capital,
            summary.total_trades,
            summary.wins,
            summary.losses,
            summary.realized_pnl,
            summary.unrealized_pnl,
        );
        if self.grid.is_some() {
            text.push_str(&format!("\nGrid P&L: ${:.4}", round_dp(self.grid_pnl(), 4)));
        }
        self.notify.send(&text);

        let perf = DailyPerformance {
            date: today,
            capital: summary.capital,
            realized_pnl: summary.realized_pnl,
            trades: summary.total_trades,
            wins: summary.wins,
            losses: summary.losses,
        };
        if let Err(e) = self.store.save_daily_performance(&perf) {
            self.notify.error("daily summary", &e.to_string());
        }
    }
}
