//! SQLite persistence adapter.
//!
//! Single-connection store for trade history, signal logs, grid orders,
//! and daily performance snapshots. Closing a trade updates the most
//! recent open row for the product.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::error::TraderError;
use crate::domain::grid::Side;
use crate::domain::portfolio::{ClosedTrade, Position};
use crate::domain::signal::{Signal, SignalType};
use crate::ports::store_port::{DailyPerformance, GridOrderRecord, StorePort, TradeRow};

pub struct SqliteStore {
    conn: Connection,
    paper: bool,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P, paper: bool) -> Result<Self, TraderError> {
        let conn = Connection::open(path)?;
        let store = SqliteStore { conn, paper };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn open_in_memory(paper: bool) -> Result<Self, TraderError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore { conn, paper };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), TraderError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id TEXT NOT NULL,
                side TEXT NOT NULL,
                entry_price REAL NOT NULL,
                exit_price REAL,
                size REAL NOT NULL,
                usd_cost REAL NOT NULL,
                usd_return REAL,
                pnl REAL,
                pnl_pct REAL,
                stop_loss REAL,
                take_profit REAL,
                exit_reason TEXT,
                order_id TEXT,
                paper INTEGER NOT NULL DEFAULT 1,
                entry_time TEXT NOT NULL,
                exit_time TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_trades_product ON trades(product_id);

            CREATE TABLE IF NOT EXISTS signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id TEXT NOT NULL,
                signal_type TEXT NOT NULL,
                price REAL NOT NULL,
                confidence REAL,
                reasons TEXT,
                acted_on INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_signals_product ON signals(product_id);

            CREATE TABLE IF NOT EXISTS grid_orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id TEXT NOT NULL,
                product_id TEXT NOT NULL,
                side TEXT NOT NULL,
                price REAL NOT NULL,
                base_size REAL NOT NULL,
                status TEXT NOT NULL DEFAULT 'open',
                fill_price REAL,
                pnl REAL,
                paper INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                filled_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_grid_orders_product ON grid_orders(product_id);

            CREATE TABLE IF NOT EXISTS daily_performance (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL UNIQUE,
                capital REAL,
                realized_pnl REAL,
                trades_count INTEGER NOT NULL DEFAULT 0,
                wins INTEGER NOT NULL DEFAULT 0,
                losses INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn now() -> String {
        Utc::now().to_rfc3339()
    }

    fn side_str(side: Side) -> &'static str {
        match side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    fn parse_side(s: &str) -> Side {
        if s == "SELL" { Side::Sell } else { Side::Buy }
    }

    fn signal_type_str(t: SignalType) -> &'static str {
        match t {
            SignalType::Buy => "BUY",
            SignalType::Sell => "SELL",
            SignalType::Hold => "HOLD",
        }
    }
}

impl StorePort for SqliteStore {
    fn save_trade_open(&mut self, position: &Position) -> Result<(), TraderError> {
        self.conn.execute(
            "INSERT INTO trades (product_id, side, entry_price, size, usd_cost,
                stop_loss, take_profit, order_id, paper, entry_time)
             VALUES (?1, 'BUY', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                position.product_id,
                position.entry_price,
                position.size,
                position.usd_cost,
                position.stop_loss,
                position.take_profit,
                position.order_id,
                self.paper as i64,
                Self::now(),
            ],
        )?;
        Ok(())
    }

    fn save_trade_close(&mut self, trade: &ClosedTrade) -> Result<(), TraderError> {
        self.conn.execute(
            "UPDATE trades SET exit_price = ?1, usd_return = ?2, pnl = ?3,
                pnl_pct = ?4, exit_reason = ?5, exit_time = ?6
             WHERE id = (
                 SELECT id FROM trades
                 WHERE product_id = ?7 AND exit_price IS NULL
                 ORDER BY id DESC LIMIT 1
             )",
            params![
                trade.exit_price,
                trade.usd_return,
                trade.pnl,
                trade.pnl_pct,
                trade.exit_reason.as_str(),
                Self::now(),
                trade.product_id,
            ],
        )?;
        Ok(())
    }

    fn save_signal(&mut self, signal: &Signal, acted_on: bool) -> Result<(), TraderError> {
        self.conn.execute(
            "INSERT INTO signals (product_id, signal_type, price, confidence, reasons,
                acted_on, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                signal.product_id,
                Self::signal_type_str(signal.signal_type),
                signal.price,
                signal.confidence,
                signal.reasons.join("; "),
                acted_on as i64,
                Self::now(),
            ],
        )?;
        Ok(())
    }

    fn save_grid_order(&mut self, order: &GridOrderRecord) -> Result<(), TraderError> {
        self.conn.execute(
            "INSERT INTO grid_orders (order_id, product_id, side, price, base_size,
                status, paper, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'open', ?6, ?7)",
            params![
                order.order_id,
                order.product_id,
                Self::side_str(order.side),
                order.price,
                order.base_size,
                self.paper as i64,
                Self::now(),
            ],
        )?;
        Ok(())
    }

    fn fill_grid_order(
        &mut self,
        order_id: &str,
        fill_price: f64,
        pnl: f64,
    ) -> Result<(), TraderError> {
        self.conn.execute(
            "UPDATE grid_orders SET status = 'filled', fill_price = ?1, pnl = ?2,
                filled_at = ?3
             WHERE order_id = ?4 AND status = 'open'",
            params![fill_price, pnl, Self::now(), order_id],
        )?;
        Ok(())
    }

    fn cancel_grid_orders(&mut self, product_id: &str) -> Result<Vec<String>, TraderError> {
        let ids: Vec<String> = {
            let mut stmt = self.conn.prepare(
                "SELECT order_id FROM grid_orders WHERE product_id = ?1 AND status = 'open'",
            )?;
            let rows = stmt.query_map(params![product_id], |row| row.get(0))?;
            rows.collect::<Result<Vec<String>, _>>()?
        };
        self.conn.execute(
            "UPDATE grid_orders SET status = 'cancelled'
             WHERE product_id = ?1 AND status = 'open'",
            params![product_id],
        )?;
        Ok(ids)
    }

    fn open_grid_orders(&self, product_id: &str) -> Result<Vec<GridOrderRecord>, TraderError> {
        let mut stmt = self.conn.prepare(
            "SELECT order_id, product_id, side, price, base_size
             FROM grid_orders WHERE product_id = ?1 AND status = 'open' ORDER BY id",
        )?;
        let rows = stmt.query_map(params![product_id], |row| {
            Ok(GridOrderRecord {
                order_id: row.get(0)?,
                product_id: row.get(1)?,
                side: Self::parse_side(&row.get::<_, String>(2)?),
                price: row.get(3)?,
                base_size: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn open_trades(&self) -> Result<Vec<TradeRow>, TraderError> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, entry_price, exit_price, size, pnl, exit_reason
             FROM trades WHERE exit_price IS NULL ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TradeRow {
                product_id: row.get(0)?,
                entry_price: row.get(1)?,
                exit_price: row.get(2)?,
                size: row.get(3)?,
                pnl: row.get(4)?,
                exit_reason: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn recent_trades(&self, limit: usize) -> Result<Vec<TradeRow>, TraderError> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, entry_price, exit_price, size, pnl, exit_reason
             FROM trades ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(TradeRow {
                product_id: row.get(0)?,
                entry_price: row.get(1)?,
                exit_price: row.get(2)?,
                size: row.get(3)?,
                pnl: row.get(4)?,
                exit_reason: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn save_daily_performance(&mut self, perf: &DailyPerformance) -> Result<(), TraderError> {
        let date_str = perf.date.format("%Y-%m-%d").to_string();
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM daily_performance WHERE date = ?1",
                params![date_str],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => {
                self.conn.execute(
                    "UPDATE daily_performance SET capital = ?1, realized_pnl = ?2,
                        trades_count = ?3, wins = ?4, losses = ?5
                     WHERE id = ?6",
                    params![
                        perf.capital,
                        perf.realized_pnl,
                        perf.trades as i64,
                        perf.wins as i64,
                        perf.losses as i64,
                        id,
                    ],
                )?;
            }
            None => {
                self.conn.execute(
                    "INSERT INTO daily_performance (date, capital, realized_pnl,
                        trades_count, wins, losses, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        date_str,
                        perf.capital,
                        perf.realized_pnl,
                        perf.trades as i64,
                        perf.wins as i64,
                        perf.losses as i64,
                        Self::now(),
                    ],
                )?;
            }
        }
        Ok(())
    }

    fn daily_performance(&self, days: usize) -> Result<Vec<DailyPerformance>, TraderError> {
        let mut stmt = self.conn.prepare(
            "SELECT date, capital, realized_pnl, trades_count, wins, losses
             FROM daily_performance ORDER BY date DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![days as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (date, capital, realized_pnl, trades, wins, losses) = row?;
            let date = chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
                TraderError::Store {
                    reason: format!("bad date in daily_performance: {e}"),
                }
            })?;
            out.push(DailyPerformance {
                date,
                capital,
                realized_pnl,
                trades: trades as usize,
                wins: wins as usize,
                losses: losses as usize,
            });
        }
        Ok(out)
    }
}
