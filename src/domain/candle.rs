//! OHLCV candle representation.

/// One fixed-duration OHLCV bar. Timestamps are epoch seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Round to `dp` decimal places. Exchange prices are quoted to six places,
/// reported P&L to two.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    let factor = 10f64.powi(dp as i32);
    (value * factor).round() / factor
}
