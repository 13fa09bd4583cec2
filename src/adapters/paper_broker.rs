//! Paper trading broker: instant fills at the caller's reference price.
//!
//! Market orders fill immediately. Limit orders rest as open until the
//! owner polls them filled via [`mark_filled`](PaperBroker::mark_filled)
//! or cancels them; the live loop resolves paper grid fills against price
//! itself, so `order_status` reports whatever this bookkeeping holds.

use std::collections::BTreeMap;

use crate::domain::error::TraderError;
use crate::domain::grid::Side;
use crate::ports::broker_port::{BrokerPort, Fill, OrderStatus, PendingOrder};

pub struct PaperBroker {
    id_counter: u64,
    orders: BTreeMap<String, OrderStatus>,
}

impl PaperBroker {
    pub fn new() -> Self {
        PaperBroker {
            id_counter: 0,
            orders: BTreeMap::new(),
        }
    }

    fn next_id(&mut self) -> String {
        self.id_counter += 1;
        format!("paper-{:06}", self.id_counter)
    }

    /// Mark a resting order filled at a price. Used by tests and by the
    /// paper grid path after it decides a level traded.
    pub fn mark_filled(&mut self, order_id: &str, price: f64) {
        if let Some(status) = self.orders.get_mut(order_id) {
            if *status == OrderStatus::Open {
                *status = OrderStatus::Filled { price };
            }
        }
    }
}

impl Default for PaperBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerPort for PaperBroker {
    fn buy(
        &mut self,
        product_id: &str,
        quote_usd: f64,
        reference_price: f64,
    ) -> Result<Fill, TraderError> {
        if reference_price <= 0.0 {
            return Err(TraderError::Broker {
                reason: format!("no reference price for {product_id}"),
            });
        }
        Ok(Fill {
            order_id: self.next_id(),
            product_id: product_id.to_string(),
            side: Side::Buy,
            price: reference_price,
            size: quote_usd / reference_price,
            quote_spent: quote_usd,
            paper: true,
        })
    }

    fn sell(
        &mut self,
        product_id: &str,
        base_size: f64,
        reference_price: f64,
    ) -> Result<Fill, TraderError> {
        if reference_price <= 0.0 {
            return Err(TraderError::Broker {
                reason: format!("no reference price for {product_id}"),
            });
        }
        Ok(Fill {
            order_id: self.next_id(),
            product_id: product_id.to_string(),
            side: Side::Sell,
            price: reference_price,
            size: base_size,
            quote_spent: base_size * reference_price,
            paper: true,
        })
    }

    fn limit_buy(
        &mut self,
        product_id: &str,
        base_size: f64,
        price: f64,
    ) -> Result<PendingOrder, TraderError> {
        let order_id = self.next_id();
        self.orders.insert(order_id.clone(), OrderStatus::Open);
        Ok(PendingOrder {
            order_id,
            product_id: product_id.to_string(),
            side: Side::Buy,
            price,
            size: base_size,
        })
    }

    fn limit_sell(
        &mut self,
        product_id: &str,
        base_size: f64,
        price: f64,
    ) -> Result<PendingOrder, TraderError> {
        let order_id = self.next_id();
        self.orders.insert(order_id.clone(), OrderStatus::Open);
        Ok(PendingOrder {
            order_id,
            product_id: product_id.to_string(),
            side: Side::Sell,
            price,
            size: base_size,
        })
    }

    fn order_status(&mut self, order_id: &str) -> Result<OrderStatus, TraderError> {
        self.orders
            .get(order_id)
            .copied()
            .ok_or_else(|| TraderError::Broker {
                reason: format!("unknown order {order_id}"),
            })
    }

    fn cancel(&mut self, order_id: &str) -> Result<(), TraderError> {
        match self.orders.get_mut(order_id) {
            Some(status) if *status == OrderStatus::Open => {
                *status = OrderStatus::Cancelled;
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(TraderError::Broker {
                reason: format!("unknown order {order_id}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_buy_fills_at_reference() {
        let mut broker = PaperBroker::new();
        let fill = broker.buy("ETH-USD", 10.0, 2000.0).unwrap();

        assert_eq!(fill.order_id, "paper-000001");
        assert_eq!(fill.side, Side::Buy);
        assert_eq!(fill.price, 2000.0);
        assert_eq!(fill.size, 0.005);
        assert_eq!(fill.quote_spent, 10.0);
        assert!(fill.paper);
    }

    #[test]
    fn market_sell_fills_at_reference() {
        let mut broker = PaperBroker::new();
        let fill = broker.sell("ETH-USD", 0.005, 2100.0).unwrap();

        assert_eq!(fill.side, Side::Sell);
        assert_eq!(fill.quote_spent, 10.5);
    }

    #[test]
    fn order_ids_increment() {
        let mut broker = PaperBroker::new();
        let a = broker.buy("ETH-USD", 1.0, 100.0).unwrap();
        let b = broker.sell("ETH-USD", 1.0, 100.0).unwrap();
        assert_eq!(a.order_id, "paper-000001");
        assert_eq!(b.order_id, "paper-000002");
    }

    #[test]
    fn zero_reference_price_is_error() {
        let mut broker = PaperBroker::new();
        assert!(broker.buy("ETH-USD", 10.0, 0.0).is_err());
        assert!(broker.sell("ETH-USD", 1.0, -1.0).is_err());
    }

    #[test]
    fn limit_orders_rest_open() {
        let mut broker = PaperBroker::new();
        let order = broker.limit_buy("ETH-USD", 0.005, 1950.0).unwrap();

        assert_eq!(broker.order_status(&order.order_id).unwrap(), OrderStatus::Open);

        broker.mark_filled(&order.order_id, 1950.0);
        assert_eq!(
            broker.order_status(&order.order_id).unwrap(),
            OrderStatus::Filled { price: 1950.0 }
        );
    }

    #[test]
    fn cancel_open_order() {
        let mut broker = PaperBroker::new();
        let order = broker.limit_sell("ETH-USD", 0.005, 2050.0).unwrap();

        broker.cancel(&order.order_id).unwrap();
        assert_eq!(
            broker.order_status(&order.order_id).unwrap(),
            OrderStatus::Cancelled
        );

        // Cancelling again is a no-op, not an error.
        broker.cancel(&order.order_id).unwrap();
    }

    #[test]
    fn unknown_order_is_error() {
        let mut broker = PaperBroker::new();
        assert!(broker.order_status("nope").is_err());
        assert!(broker.cancel("nope").is_err());
    }
}
