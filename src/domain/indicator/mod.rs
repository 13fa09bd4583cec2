//! Technical indicators over candle series.
//!
//! Every indicator returns one value per input candle, `None` during warm-up.
//! Output vectors always have the same length as the input so index `i`
//! lines up across candles and every indicator column.

pub mod bollinger;
pub mod ema;
pub mod rsi;
pub mod volume;

use crate::domain::candle::Candle;
use crate::domain::config::IndicatorConfig;

pub use bollinger::{bollinger_bands, Bands};
pub use ema::ema;
pub use rsi::rsi;
pub use volume::volume_ratio;

/// All indicator columns for one candle series, index-aligned with the input.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    pub rsi: Vec<Option<f64>>,
    pub ema_fast: Vec<Option<f64>>,
    pub ema_slow: Vec<Option<f64>>,
    pub bb_upper: Vec<Option<f64>>,
    pub bb_middle: Vec<Option<f64>>,
    pub bb_lower: Vec<Option<f64>>,
    pub volume_ratio: Vec<Option<f64>>,
}

impl IndicatorFrame {
    pub fn len(&self) -> usize {
        self.rsi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rsi.is_empty()
    }
}

/// Compute every configured indicator over one candle series.
pub fn compute_frame(candles: &[Candle], cfg: &IndicatorConfig) -> IndicatorFrame {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    let bands = bollinger_bands(&closes, cfg.bollinger_period, cfg.bollinger_std_dev);

    IndicatorFrame {
        rsi: rsi(&closes, cfg.rsi_period),
        ema_fast: ema(&closes, cfg.ema_fast),
        ema_slow: ema(&closes, cfg.ema_slow),
        bb_upper: bands.upper,
        bb_middle: bands.middle,
        bb_lower: bands.lower,
        volume_ratio: volume_ratio(&volumes, cfg.volume_period),
    }
}
