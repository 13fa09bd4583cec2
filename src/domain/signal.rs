//! Multi-indicator signal scoring.
//!
//! Four voters (RSI threshold, EMA cross/trend, Bollinger %B, volume surge)
//! each contribute buy or sell reasons for the evaluated candle. A side wins
//! when it collects at least `min_confirmations` votes and strictly more than
//! the other side; anything else is HOLD. A voter whose indicator is still
//! warming up simply abstains.

use crate::domain::candle::{round_dp, Candle};
use crate::domain::config::BotConfig;
use crate::domain::indicator::IndicatorFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub signal_type: SignalType,
    pub product_id: String,
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub confidence: f64,
    pub reasons: Vec<String>,
}

impl Signal {
    fn hold(product_id: &str, price: f64, reasons: Vec<String>) -> Self {
        Signal {
            signal_type: SignalType::Hold,
            product_id: product_id.to_string(),
            price,
            stop_loss: 0.0,
            take_profit: 0.0,
            confidence: 0.0,
            reasons,
        }
    }
}

pub struct SignalGenerator {
    rsi_oversold: f64,
    rsi_overbought: f64,
    volume_multiplier: f64,
    stop_loss_pct: f64,
    take_profit_pct: f64,
    min_confirmations: usize,
}

impl SignalGenerator {
    pub fn new(config: &BotConfig) -> Self {
        SignalGenerator {
            rsi_oversold: config.indicators.rsi_oversold,
            rsi_overbought: config.indicators.rsi_overbought,
            volume_multiplier: config.indicators.volume_multiplier,
            stop_loss_pct: config.risk.stop_loss_pct,
            take_profit_pct: config.risk.take_profit_pct,
            min_confirmations: config.strategy.min_confirmations,
        }
    }

    /// Evaluate the most recent candle.
    pub fn generate(&self, candles: &[Candle], frame: &IndicatorFrame, product_id: &str) -> Signal {
        if candles.is_empty() {
            return Signal::hold(product_id, 0.0, vec!["insufficient data".to_string()]);
        }
        self.generate_at(candles, frame, candles.len() - 1, product_id)
    }

    /// Evaluate the candle at index `i`. Needs the candle at `i - 1` for the
    /// EMA crossover check.
    pub fn generate_at(
        &self,
        candles: &[Candle],
        frame: &IndicatorFrame,
        i: usize,
        product_id: &str,
    ) -> Signal {
        if i == 0 || candles.len() < 2 || i >= candles.len() {
            let price = candles.get(i).map(|c| c.close).unwrap_or(0.0);
            return Signal::hold(product_id, price, vec!["insufficient data".to_string()]);
        }

        let price = candles[i].close;
        let mut buy_reasons: Vec<String> = Vec::new();
        let mut sell_reasons: Vec<String> = Vec::new();

        if let Some(rsi) = frame.rsi[i] {
            if rsi < self.rsi_oversold {
                buy_reasons.push(format!("RSI oversold ({rsi:.1})"));
            } else if rsi > self.rsi_overbought {
                sell_reasons.push(format!("RSI overbought ({rsi:.1})"));
            }
        }

        if let (Some(fast), Some(slow), Some(prev_fast), Some(prev_slow)) = (
            frame.ema_fast[i],
            frame.ema_slow[i],
            frame.ema_fast[i - 1],
            frame.ema_slow[i - 1],
        ) {
            if fast > slow && prev_fast <= prev_slow {
                buy_reasons.push("EMA bullish crossover".to_string());
            } else if fast > slow {
                buy_reasons.push("EMA bullish trend".to_string());
            }
            if fast < slow && prev_fast >= prev_slow {
                sell_reasons.push("EMA bearish crossover".to_string());
            } else if fast < slow {
                sell_reasons.push("EMA bearish trend".to_string());
            }
        }

        if let (Some(lower), Some(upper)) = (frame.bb_lower[i], frame.bb_upper[i]) {
            let range = upper - lower;
            if range > 0.0 {
                let pct_b = (price - lower) / range;
                if pct_b < 0.15 {
                    buy_reasons.push(format!("Price near lower BB ({:.0}%)", pct_b * 100.0));
                } else if pct_b > 0.85 {
                    sell_reasons.push(format!("Price near upper BB ({:.0}%)", pct_b * 100.0));
                }
            }
        }

        // Volume surge confirms whichever direction the other voters pick.
        if let Some(ratio) = frame.volume_ratio[i] {
            if ratio >= self.volume_multiplier {
                buy_reasons.push(format!("Volume confirmed ({ratio:.1}x)"));
                sell_reasons.push(format!("Volume confirmed ({ratio:.1}x)"));
            }
        }

        let buy_score = buy_reasons.len();
        let sell_score = sell_reasons.len();

        if buy_score >= self.min_confirmations && buy_score > sell_score {
            return Signal {
                signal_type: SignalType::Buy,
                product_id: product_id.to_string(),
                price,
                stop_loss: round_dp(price * (1.0 - self.stop_loss_pct), 6),
                take_profit: round_dp(price * (1.0 + self.take_profit_pct), 6),
                confidence: (buy_score as f64 / 4.0).min(1.0),
                reasons: buy_reasons,
            };
        }

        if sell_score >= self.min_confirmations && sell_score > buy_score {
            return Signal {
                signal_type: SignalType::Sell,
                product_id: product_id.to_string(),
                price,
                stop_loss: round_dp(price * (1.0 + self.stop_loss_pct), 6),
                take_profit: round_dp(price * (1.0 - self.take_profit_pct), 6),
                confidence: (sell_score as f64 / 4.0).min(1.0),
                reasons: sell_reasons,
            };
        }

        Signal::hold(
            product_id,
            price,
            vec![format!(
                "Buy({buy_score}) Sell({sell_score}) < min({})",
                self.min_confirmations
            )],
        )
    }
}
