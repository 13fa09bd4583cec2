//! Port traits separating the decision core from the outside world.

pub mod broker_port;
pub mod config_port;
pub mod market_port;
pub mod notify_port;
pub mod store_port;
