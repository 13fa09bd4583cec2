//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the SMA of the first n closes, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k). First (n-1) outputs are `None`.

/// EMA over closing prices. Output is index-aligned with the input.
pub fn ema(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut value = closes[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(value);

    for i in period..closes.len() {
        value = closes[i] * k + value * (1.0 - k);
        out[i] = Some(value);
    }

    out
}
