//! Core decision and simulation logic. Pure: no I/O, no wall-clock reads
//! except the risk gate's lazy day roll (which also has date-injected variants).

pub mod candle;
pub mod config;
pub mod error;
pub mod indicator;
pub mod signal;
pub mod sizing;
pub mod risk;
pub mod stop_loss;
pub mod grid;
pub mod portfolio;
pub mod replay;
pub mod backtest;
pub mod grid_backtest;
pub mod metrics;
