//! Volume ratio: current volume relative to its rolling average.
//!
//! ratio[i] = volume[i] / SMA(volume, period)[i]. `None` during warm-up and
//! wherever the rolling average is zero.

pub fn volume_ratio(volumes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; volumes.len()];
    if period == 0 || volumes.len() < period {
        return out;
    }

    for i in (period - 1)..volumes.len() {
        let window = &volumes[i + 1 - period..=i];
        let avg = window.iter().sum::<f64>() / period as f64;
        if avg > 0.0 {
            out[i] = Some(volumes[i] / avg);
        }
    }

    out
}
