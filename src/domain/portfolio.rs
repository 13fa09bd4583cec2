//! Position tracking and realized/unrealized P&L accounting.

use std::collections::BTreeMap;

use crate::domain::candle::round_dp;
use crate::domain::stop_loss::ExitReason;

/// One open long position.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub product_id: String,
    pub entry_price: f64,
    pub size: f64,
    pub usd_cost: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub order_id: String,
}

/// A fully closed round trip. `pnl_pct` is a percentage (2.5 means +2.5%).
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub product_id: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub usd_cost: f64,
    pub usd_return: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub exit_reason: ExitReason,
}

/// Rolled-up account state. Dollar figures rounded to cents.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSummary {
    pub capital: f64,
    pub open_positions: usize,
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub win_rate: f64,
}

/// Cash and position ledger. Opening a position moves its cost out of
/// capital; closing moves the full exit value back in.
pub struct PortfolioLedger {
    pub initial_capital: f64,
    pub capital: f64,
    positions: BTreeMap<String, Position>,
    closed_trades: Vec<ClosedTrade>,
}

impl PortfolioLedger {
    pub fn new(initial_capital: f64) -> Self {
        PortfolioLedger {
            initial_capital,
            capital: initial_capital,
            positions: BTreeMap::new(),
            closed_trades: Vec::new(),
        }
    }

    pub fn open(&mut self, position: Position) -> &Position {
        self.capital -= position.usd_cost;
        let product_id = position.product_id.clone();
        self.positions.insert(product_id.clone(), position);
        &self.positions[&product_id]
    }

    /// Close an open position at `exit_price`. Returns `None` (capital
    /// untouched) when no position exists for the product.
    pub fn close(
        &mut self,
        product_id: &str,
        exit_price: f64,
        exit_reason: ExitReason,
    ) -> Option<ClosedTrade> {
        let pos = self.positions.remove(product_id)?;

        let usd_return = pos.size * exit_price;
        let pnl = usd_return - pos.usd_cost;
        let pnl_pct = if pos.usd_cost > 0.0 {
            pnl / pos.usd_cost * 100.0
        } else {
            0.0
        };

        let trade = ClosedTrade {
            product_id: pos.product_id,
            entry_price: pos.entry_price,
            exit_price,
            size: pos.size,
            usd_cost: pos.usd_cost,
            usd_return,
            pnl,
            pnl_pct,
            exit_reason,
        };
        self.capital += usd_return;
        self.closed_trades.push(trade.clone());
        Some(trade)
    }

    pub fn position(&self, product_id: &str) -> Option<&Position> {
        self.positions.get(product_id)
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn open_products(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    pub fn total_pnl(&self) -> f64 {
        self.closed_trades.iter().map(|t| t.pnl).sum()
    }

    pub fn win_count(&self) -> usize {
        self.closed_trades.iter().filter(|t| t.pnl > 0.0).count()
    }

    /// Breakeven trades count as losses.
    pub fn loss_count(&self) -> usize {
        self.closed_trades.iter().filter(|t| t.pnl <= 0.0).count()
    }

    /// Mark open positions to the given prices; positions with no quote fall
    /// back to their entry price.
    pub fn unrealized_pnl(&self, prices: &BTreeMap<String, f64>) -> f64 {
        self.positions
            .values()
            .map(|pos| {
                let price = prices.get(&pos.product_id).copied().unwrap_or(pos.entry_price);
                price * pos.size - pos.usd_cost
            })
            .sum()
    }

    pub fn summary(&self, prices: &BTreeMap<String, f64>) -> LedgerSummary {
        let total_trades = self.closed_trades.len();
        LedgerSummary {
            capital: round_dp(self.capital, 2),
            open_positions: self.positions.len(),
            total_trades,
            wins: self.win_count(),
            losses: self.loss_count(),
            realized_pnl: round_dp(self.total_pnl(), 2),
            unrealized_pnl: round_dp(self.unrealized_pnl(prices), 2),
            win_rate: round_dp(self.win_count() as f64 / total_trades.max(1) as f64, 2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(product: &str, entry: f64, size: f64) -> Position {
        Position {
            product_id: product.to_string(),
            entry_price: entry,
            size,
            usd_cost: entry * size,
            stop_loss: entry * 0.975,
            take_profit: entry * 1.04,
            order_id: String::new(),
        }
    }

    #[test]
    fn open_deducts_capital() {
        let mut ledger = PortfolioLedger::new(300.0);
        ledger.open(pos("ETH-USD", 100.0, 0.06));
        assert!((ledger.capital - 294.0).abs() < 1e-9);
        assert_eq!(ledger.open_position_count(), 1);
    }

    #[test]
    fn close_returns_exit_value() {
        let mut ledger = PortfolioLedger::new(300.0);
        ledger.open(pos("ETH-USD", 100.0, 0.06));
        let trade = ledger
            .close("ETH-USD", 104.0, ExitReason::TakeProfit)
            .unwrap();

        assert!((trade.pnl - 0.24).abs() < 1e-9);
        assert!((trade.pnl_pct - 4.0).abs() < 1e-9);
        assert!((ledger.capital - 300.24).abs() < 1e-9);
        assert_eq!(ledger.open_position_count(), 0);
    }

    #[test]
    fn close_unknown_product_is_none() {
        let mut ledger = PortfolioLedger::new(300.0);
        assert!(ledger.close("ETH-USD", 100.0, ExitReason::StopLoss).is_none());
        assert_eq!(ledger.capital, 300.0);
    }

    #[test]
    fn breakeven_counts_as_loss() {
        let mut ledger = PortfolioLedger::new(300.0);
        ledger.open(pos("ETH-USD", 100.0, 0.05));
        ledger.close("ETH-USD", 100.0, ExitReason::StopLoss);

        assert_eq!(ledger.win_count(), 0);
        assert_eq!(ledger.loss_count(), 1);
    }

    #[test]
    fn unrealized_marks_to_price() {
        let mut ledger = PortfolioLedger::new(300.0);
        ledger.open(pos("ETH-USD", 100.0, 0.05));
        ledger.open(pos("SOL-USD", 20.0, 0.5));

        let mut prices = BTreeMap::new();
        prices.insert("ETH-USD".to_string(), 110.0);
        // SOL has no quote: falls back to entry, contributing zero.
        let upnl = ledger.unrealized_pnl(&prices);
        assert!((upnl - 0.5).abs() < 1e-9);
    }

    #[test]
    fn summary_rounds_and_rates() {
        let mut ledger = PortfolioLedger::new(300.0);
        ledger.open(pos("ETH-USD", 100.0, 0.06));
        ledger.close("ETH-USD", 104.0, ExitReason::TakeProfit);
        ledger.open(pos("SOL-USD", 20.0, 0.5));
        ledger.close("SOL-USD", 19.0, ExitReason::StopLoss);

        let summary = ledger.summary(&BTreeMap::new());
        assert_eq!(summary.total_trades, 2);
        assert_eq!(summary.wins, 1);
        assert_eq!(summary.losses, 1);
        assert_eq!(summary.win_rate, 0.5);
        assert_eq!(summary.open_positions, 0);
        assert!((summary.realized_pnl - (-0.26)).abs() < 1e-9);
    }

    #[test]
    fn empty_ledger_summary() {
        let ledger = PortfolioLedger::new(300.0);
        let summary = ledger.summary(&BTreeMap::new());
        assert_eq!(summary.win_rate, 0.0);
        assert_eq!(summary.total_trades, 0);
        assert_eq!(summary.capital, 300.0);
    }
}
