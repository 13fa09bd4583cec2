//! Pre-trade safety checks and the daily loss limit.
//!
//! The gate tracks realized losses per calendar day and pauses new entries
//! once either the absolute or the percentage limit is breached. The day
//! rolls lazily on the next call; `*_on` variants take the date explicitly
//! so the roll is testable.

use std::fmt;

use chrono::{Local, NaiveDate};

use crate::domain::config::BotConfig;

/// Why a new entry was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum Blocked {
    ProtectedAsset { product_id: String },
    DailyLossPaused { loss_today: f64 },
    PositionCap { max: usize },
}

impl fmt::Display for Blocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Blocked::ProtectedAsset { product_id } => {
                write!(f, "{product_id} is a protected asset")
            }
            Blocked::DailyLossPaused { loss_today } => {
                write!(f, "trading paused: daily loss ${loss_today:.2}")
            }
            Blocked::PositionCap { max } => write!(f, "max positions reached ({max})"),
        }
    }
}

pub struct RiskGate {
    max_open_positions: usize,
    daily_loss_limit_pct: f64,
    daily_loss_limit_usd: f64,
    base_capital: f64,
    protected_assets: Vec<String>,
    today: NaiveDate,
    daily_loss: f64,
    paused: bool,
}

impl RiskGate {
    pub fn new(config: &BotConfig) -> Self {
        RiskGate {
            max_open_positions: config.risk.max_open_positions,
            daily_loss_limit_pct: config.risk.daily_loss_limit_pct,
            daily_loss_limit_usd: config.risk.daily_loss_limit_usd,
            base_capital: config.initial_capital_usd,
            protected_assets: config.protected_assets.clone(),
            today: Local::now().date_naive(),
            daily_loss: 0.0,
            paused: false,
        }
    }

    fn roll_day(&mut self, today: NaiveDate) {
        if today != self.today {
            self.today = today;
            self.daily_loss = 0.0;
            self.paused = false;
        }
    }

    /// True when the product's base asset (the part before the '-') is on
    /// the do-not-trade list.
    pub fn is_protected(&self, product_id: &str) -> bool {
        let base = product_id
            .split('-')
            .next()
            .unwrap_or(product_id)
            .to_uppercase();
        self.protected_assets.iter().any(|a| *a == base)
    }

    /// Check whether a new entry is allowed right now.
    pub fn can_trade(&mut self, product_id: &str, open_positions: usize) -> Option<Blocked> {
        self.can_trade_on(Local::now().date_naive(), product_id, open_positions)
    }

    /// Date-injected variant of [`can_trade`](Self::can_trade).
    pub fn can_trade_on(
        &mut self,
        today: NaiveDate,
        product_id: &str,
        open_positions: usize,
    ) -> Option<Blocked> {
        self.roll_day(today);

        if self.is_protected(product_id) {
            return Some(Blocked::ProtectedAsset {
                product_id: product_id.to_string(),
            });
        }
        if self.paused {
            return Some(Blocked::DailyLossPaused {
                loss_today: self.daily_loss,
            });
        }
        if open_positions >= self.max_open_positions {
            return Some(Blocked::PositionCap {
                max: self.max_open_positions,
            });
        }
        None
    }

    /// Record a realized loss; the sign of `loss_usd` is ignored.
    pub fn record_loss(&mut self, loss_usd: f64) {
        self.record_loss_on(Local::now().date_naive(), loss_usd);
    }

    /// Date-injected variant of [`record_loss`](Self::record_loss).
    pub fn record_loss_on(&mut self, today: NaiveDate, loss_usd: f64) {
        self.roll_day(today);
        self.daily_loss += loss_usd.abs();

        let pct = if self.base_capital > 0.0 {
            self.daily_loss / self.base_capital
        } else {
            0.0
        };
        if self.daily_loss >= self.daily_loss_limit_usd || pct >= self.daily_loss_limit_pct {
            self.paused = true;
        }
    }

    pub fn daily_loss(&self) -> f64 {
        self.daily_loss
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}
