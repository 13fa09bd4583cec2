//! Shared builders and mock ports for integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use tidetrader::domain::candle::Candle;
use tidetrader::domain::config::{
    BotConfig, BotMode, Granularity, GridConfig, IndicatorConfig, RiskConfig, StrategyConfig,
    StrategyMode,
};
use tidetrader::domain::error::TraderError;
use tidetrader::domain::portfolio::{ClosedTrade, Position};
use tidetrader::domain::signal::Signal;
use tidetrader::ports::market_port::MarketPort;
use tidetrader::ports::notify_port::NotifyPort;
use tidetrader::ports::store_port::{
    DailyPerformance, GridOrderRecord, StorePort, TradeRow,
};

pub fn candle(ts: i64, close: f64, volume: f64) -> Candle {
    Candle {
        timestamp: ts,
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume,
    }
}

/// Steady uptrend ending in a high-volume crash bar. The last candle scores
/// all four buy votes: RSI deeply oversold, fast EMA still above slow,
/// close below the lower Bollinger band, and a volume surge.
pub fn buy_series(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let (close, volume) = if i == n - 1 {
                (100.0, 10_000.0)
            } else {
                (100.0 + i as f64 * 0.5, 1_000.0)
            };
            candle(i as i64 * 3600, close, volume)
        })
        .collect()
}

/// Price oscillating around 100 within the grid band, so levels fill without
/// ever triggering a rebalance at the default 5% threshold.
pub fn zigzag_series(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = match i % 4 {
                1 => 97.0,
                3 => 103.0,
                _ => 100.0,
            };
            candle(i as i64 * 3600, close, 1_000.0)
        })
        .collect()
}

pub fn write_csv(dir: &std::path::Path, product_id: &str, candles: &[Candle]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for c in candles {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            c.timestamp, c.open, c.high, c.low, c.close, c.volume
        ));
    }
    std::fs::write(dir.join(format!("{product_id}.csv")), content).unwrap();
}

pub fn test_config() -> BotConfig {
    BotConfig {
        initial_capital_usd: 300.0,
        risk: RiskConfig {
            max_position_pct: 0.02,
            max_open_positions: 3,
            stop_loss_pct: 0.025,
            take_profit_pct: 0.04,
            trailing_stop_activate_pct: 0.03,
            trailing_stop_distance_pct: 0.015,
            daily_loss_limit_pct: 0.05,
            daily_loss_limit_usd: 15.0,
        },
        indicators: IndicatorConfig {
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            ema_fast: 12,
            ema_slow: 26,
            bollinger_period: 20,
            bollinger_std_dev: 2.0,
            volume_period: 20,
            volume_multiplier: 1.5,
        },
        strategy: StrategyConfig {
            candle_granularity: Granularity::OneHour,
            lookback_candles: 100,
            min_confirmations: 3,
        },
        grid: GridConfig {
            enabled: false,
            pairs: vec![],
            num_levels: 3,
            spacing_pct: 0.01,
            order_size_usd: 10.0,
            rebalance_threshold_pct: 0.05,
            grid_capital_usd: 150.0,
        },
        protected_assets: vec!["BTC".to_string()],
        trading_pairs: vec!["ETH-USD".to_string()],
        mode: BotMode::Paper,
        strategy_mode: StrategyMode::Signal,
        loop_interval_secs: 1,
        min_order_usd: 1.0,
    }
}

pub fn grid_test_config() -> BotConfig {
    let mut config = test_config();
    config.strategy_mode = StrategyMode::Grid;
    config.grid.enabled = true;
    config.grid.pairs = vec!["ETH-USD".to_string()];
    config
}

/// Market data stub: fixed candle history per product plus a scripted
/// sequence of spot prices consumed one per `current_price` call.
pub struct ScriptedMarket {
    candles: BTreeMap<String, Vec<Candle>>,
    prices: Mutex<BTreeMap<String, VecDeque<f64>>>,
}

impl ScriptedMarket {
    pub fn new() -> Self {
        ScriptedMarket {
            candles: BTreeMap::new(),
            prices: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_candles(mut self, product_id: &str, candles: Vec<Candle>) -> Self {
        self.candles.insert(product_id.to_string(), candles);
        self
    }

    pub fn with_prices(self, product_id: &str, prices: &[f64]) -> Self {
        self.prices
            .lock()
            .unwrap()
            .insert(product_id.to_string(), prices.iter().copied().collect());
        self
    }
}

impl MarketPort for ScriptedMarket {
    fn candles(
        &self,
        product_id: &str,
        _granularity: Granularity,
        count: usize,
    ) -> Result<Vec<Candle>, TraderError> {
        let all = self.candles.get(product_id).ok_or(TraderError::NoData {
            product: product_id.to_string(),
        })?;
        let skip = all.len().saturating_sub(count);
        Ok(all[skip..].to_vec())
    }

    fn current_price(&self, product_id: &str) -> Result<f64, TraderError> {
        if let Some(queue) = self.prices.lock().unwrap().get_mut(product_id) {
            if let Some(price) = queue.pop_front() {
                return Ok(price);
            }
        }
        self.candles
            .get(product_id)
            .and_then(|c| c.last())
            .map(|c| c.close)
            .ok_or(TraderError::NoData {
                product: product_id.to_string(),
            })
    }
}

/// Notifier that records every message for later assertions.
#[derive(Clone)]
pub struct RecordingNotifier {
    pub messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        RecordingNotifier {
            messages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.contains(needle))
    }
}

impl NotifyPort for RecordingNotifier {
    fn send(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }
}

#[derive(Default)]
pub struct StoreLog {
    pub opens: Vec<Position>,
    pub closes: Vec<ClosedTrade>,
    pub signals: Vec<(Signal, bool)>,
    pub grid_orders: Vec<GridOrderRecord>,
    pub grid_fills: Vec<(String, f64, f64)>,
    pub grid_cancels: Vec<String>,
    pub daily: Vec<DailyPerformance>,
    pub fail_trade_writes: bool,
}

/// In-memory store that shares its log with the test.
#[derive(Clone)]
pub struct MemoryStore {
    pub log: Arc<Mutex<StoreLog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            log: Arc::new(Mutex::new(StoreLog::default())),
        }
    }

    /// Make every trade open/close write fail, simulating a store outage.
    pub fn with_failing_trade_writes(self) -> Self {
        self.log.lock().unwrap().fail_trade_writes = true;
        self
    }
}

impl StorePort for MemoryStore {
    fn save_trade_open(&mut self, position: &Position) -> Result<(), TraderError> {
        let mut log = self.log.lock().unwrap();
        if log.fail_trade_writes {
            return Err(TraderError::Store {
                reason: "disk full".to_string(),
            });
        }
        log.opens.push(position.clone());
        Ok(())
    }

    fn save_trade_close(&mut self, trade: &ClosedTrade) -> Result<(), TraderError> {
        let mut log = self.log.lock().unwrap();
        if log.fail_trade_writes {
            return Err(TraderError::Store {
                reason: "disk full".to_string(),
            });
        }
        log.closes.push(trade.clone());
        Ok(())
    }

    fn save_signal(&mut self, signal: &Signal, acted_on: bool) -> Result<(), TraderError> {
        self.log
            .lock()
            .unwrap()
            .signals
            .push((signal.clone(), acted_on));
        Ok(())
    }

    fn save_grid_order(&mut self, order: &GridOrderRecord) -> Result<(), TraderError> {
        self.log.lock().unwrap().grid_orders.push(order.clone());
        Ok(())
    }

    fn fill_grid_order(
        &mut self,
        order_id: &str,
        fill_price: f64,
        pnl: f64,
    ) -> Result<(), TraderError> {
        self.log
            .lock()
            .unwrap()
            .grid_fills
            .push((order_id.to_string(), fill_price, pnl));
        Ok(())
    }

    fn cancel_grid_orders(&mut self, product_id: &str) -> Result<Vec<String>, TraderError> {
        let mut log = self.log.lock().unwrap();
        let filled: Vec<String> = log.grid_fills.iter().map(|(id, _, _)| id.clone()).collect();
        let ids: Vec<String> = log
            .grid_orders
            .iter()
            .filter(|o| o.product_id == product_id)
            .map(|o| o.order_id.clone())
            .filter(|id| !filled.contains(id) && !log.grid_cancels.contains(id))
            .collect();
        log.grid_cancels.extend(ids.clone());
        Ok(ids)
    }

    fn open_grid_orders(&self, product_id: &str) -> Result<Vec<GridOrderRecord>, TraderError> {
        let log = self.log.lock().unwrap();
        let filled: Vec<&String> = log.grid_fills.iter().map(|(id, _, _)| id).collect();
        Ok(log
            .grid_orders
            .iter()
            .filter(|o| o.product_id == product_id)
            .filter(|o| !filled.contains(&&o.order_id) && !log.grid_cancels.contains(&o.order_id))
            .cloned()
            .collect())
    }

    fn open_trades(&self) -> Result<Vec<TradeRow>, TraderError> {
        let log = self.log.lock().unwrap();
        let closed: Vec<&String> = log.closes.iter().map(|c| &c.product_id).collect();
        Ok(log
            .opens
            .iter()
            .filter(|p| !closed.contains(&&p.product_id))
            .map(|p| TradeRow {
                product_id: p.product_id.clone(),
                entry_price: p.entry_price,
                exit_price: None,
                size: p.size,
                pnl: None,
                exit_reason: None,
            })
            .collect())
    }

    fn recent_trades(&self, limit: usize) -> Result<Vec<TradeRow>, TraderError> {
        let log = self.log.lock().unwrap();
        Ok(log
            .closes
            .iter()
            .rev()
            .take(limit)
            .map(|c| TradeRow {
                product_id: c.product_id.clone(),
                entry_price: c.entry_price,
                exit_price: Some(c.exit_price),
                size: c.size,
                pnl: Some(c.pnl),
                exit_reason: Some(c.exit_reason.as_str().to_string()),
            })
            .collect())
    }

    fn save_daily_performance(&mut self, perf: &DailyPerformance) -> Result<(), TraderError> {
        self.log.lock().unwrap().daily.push(perf.clone());
        Ok(())
    }

    fn daily_performance(&self, days: usize) -> Result<Vec<DailyPerformance>, TraderError> {
        let log = self.log.lock().unwrap();
        Ok(log.daily.iter().rev().take(days).cloned().collect())
    }
}
