//! tidetrader — rule-based crypto trading bot core with deterministic backtesting.
//!
//! Hexagonal architecture: decision and simulation logic in [`domain`], collaborator
//! traits in [`ports`], concrete implementations in [`adapters`]. The live tick
//! orchestrator lives in [`trader`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod trader;
pub mod cli;
