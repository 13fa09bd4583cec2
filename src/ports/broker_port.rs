//! Order execution port trait.

use crate::domain::error::TraderError;
use crate::domain::grid::Side;

/// A completed fill as reported by the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub order_id: String,
    pub product_id: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub quote_spent: f64,
    pub paper: bool,
}

/// A resting limit order that has been placed but not yet filled.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOrder {
    pub order_id: String,
    pub product_id: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderStatus {
    Open,
    Filled { price: f64 },
    Cancelled,
}

pub trait BrokerPort {
    /// Market buy spending `quote_usd`. `reference_price` is the caller's
    /// view of the current price; paper brokers fill at it, live brokers
    /// may ignore it.
    fn buy(
        &mut self,
        product_id: &str,
        quote_usd: f64,
        reference_price: f64,
    ) -> Result<Fill, TraderError>;

    /// Market sell of `base_size` units.
    fn sell(
        &mut self,
        product_id: &str,
        base_size: f64,
        reference_price: f64,
    ) -> Result<Fill, TraderError>;

    /// Resting limit buy of `base_size` units at `price`.
    fn limit_buy(
        &mut self,
        product_id: &str,
        base_size: f64,
        price: f64,
    ) -> Result<PendingOrder, TraderError>;

    /// Resting limit sell of `base_size` units at `price`.
    fn limit_sell(
        &mut self,
        product_id: &str,
        base_size: f64,
        price: f64,
    ) -> Result<PendingOrder, TraderError>;

    fn order_status(&mut self, order_id: &str) -> Result<OrderStatus, TraderError>;

    fn cancel(&mut self, order_id: &str) -> Result<(), TraderError>;
}
