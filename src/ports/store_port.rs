//! Persistence port trait.

use crate::domain::error::TraderError;
use crate::domain::grid::Side;
use crate::domain::portfolio::{ClosedTrade, Position};
use crate::domain::signal::Signal;

/// A grid limit order as persisted, keyed by the broker order id.
#[derive(Debug, Clone, PartialEq)]
pub struct GridOrderRecord {
    pub order_id: String,
    pub product_id: String,
    pub side: Side,
    pub price: f64,
    pub base_size: f64,
}

/// One realized trade row as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRow {
    pub product_id: String,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub size: f64,
    pub pnl: Option<f64>,
    pub exit_reason: Option<String>,
}

/// End-of-day account snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyPerformance {
    pub date: chrono::NaiveDate,
    pub capital: f64,
    pub realized_pnl: f64,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
}

pub trait StorePort {
    fn save_trade_open(&mut self, position: &Position) -> Result<(), TraderError>;

    fn save_trade_close(&mut self, trade: &ClosedTrade) -> Result<(), TraderError>;

    fn save_signal(&mut self, signal: &Signal, acted_on: bool) -> Result<(), TraderError>;

    fn save_grid_order(&mut self, order: &GridOrderRecord) -> Result<(), TraderError>;

    fn fill_grid_order(
        &mut self,
        order_id: &str,
        fill_price: f64,
        pnl: f64,
    ) -> Result<(), TraderError>;

    /// Mark every open grid order for a product cancelled, returning the ids.
    fn cancel_grid_orders(&mut self, product_id: &str) -> Result<Vec<String>, TraderError>;

    fn open_grid_orders(&self, product_id: &str) -> Result<Vec<GridOrderRecord>, TraderError>;

    fn open_trades(&self) -> Result<Vec<TradeRow>, TraderError>;

    fn recent_trades(&self, limit: usize) -> Result<Vec<TradeRow>, TraderError>;

    fn save_daily_performance(&mut self, perf: &DailyPerformance) -> Result<(), TraderError>;

    /// The most recent `days` end-of-day snapshots, newest first.
    fn daily_performance(&self, days: usize) -> Result<Vec<DailyPerformance>, TraderError>;
}
