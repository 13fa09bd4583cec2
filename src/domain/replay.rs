//! Deterministic candle replay across multiple products.
//!
//! Both backtest engines walk index-aligned candle series tick by tick.
//! The replay set clamps every product to the shortest series so index `i`
//! refers to the same bar across products, and products always iterate in
//! sorted order.

use std::collections::BTreeMap;

use crate::domain::candle::Candle;

/// Index-aligned candle series for a set of products.
pub struct ReplaySet {
    series: BTreeMap<String, Vec<Candle>>,
    common_len: usize,
}

impl ReplaySet {
    pub fn new(series: BTreeMap<String, Vec<Candle>>) -> Self {
        let common_len = series.values().map(Vec::len).min().unwrap_or(0);
        ReplaySet { series, common_len }
    }

    /// Product ids in sorted order.
    pub fn products(&self) -> impl Iterator<Item = &String> {
        self.series.keys()
    }

    pub fn candles(&self, product_id: &str) -> Option<&[Candle]> {
        self.series.get(product_id).map(Vec::as_slice)
    }

    /// Number of bars every product has.
    pub fn common_len(&self) -> usize {
        self.common_len
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Restrict the set to the given products, dropping any the set does not
    /// have data for. Keeps sorted iteration order.
    pub fn restrict(&self, products: &[String]) -> ReplaySet {
        let series: BTreeMap<String, Vec<Candle>> = self
            .series
            .iter()
            .filter(|(pid, _)| products.contains(pid))
            .map(|(pid, candles)| (pid.clone(), candles.clone()))
            .collect();
        ReplaySet::new(series)
    }
}

/// Per-tick strategy callback driven by [`run_replay`].
pub trait TickStrategy {
    fn on_tick(&mut self, i: usize, set: &ReplaySet);
}

/// Walk the common index range `[start, common_len)`, calling the strategy
/// once per tick.
pub fn run_replay<S: TickStrategy>(set: &ReplaySet, start: usize, strategy: &mut S) {
    for i in start..set.common_len() {
        strategy.on_tick(i, set);
    }
}
