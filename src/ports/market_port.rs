//! Market data port trait.

use crate::domain::candle::Candle;
use crate::domain::config::Granularity;
use crate::domain::error::TraderError;

pub trait MarketPort {
    /// Most recent `count` candles for a product, oldest first.
    fn candles(
        &self,
        product_id: &str,
        granularity: Granularity,
        count: usize,
    ) -> Result<Vec<Candle>, TraderError>;

    /// Latest traded price for a product.
    fn current_price(&self, product_id: &str) -> Result<f64, TraderError>;
}
