//! Bollinger Bands.
//!
//! Middle band is the rolling SMA, upper/lower are middle +/- multiplier
//! times the population standard deviation (divide by N) over the same
//! window. First (period-1) outputs are `None`.

/// The three band columns, each index-aligned with the input closes.
#[derive(Debug, Clone)]
pub struct Bands {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

pub fn bollinger_bands(closes: &[f64], period: usize, multiplier: f64) -> Bands {
    let mut bands = Bands {
        upper: vec![None; closes.len()],
        middle: vec![None; closes.len()],
        lower: vec![None; closes.len()],
    };
    if period == 0 || closes.len() < period {
        return bands;
    }

    for i in (period - 1)..closes.len() {
        let window = &closes[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window
            .iter()
            .map(|c| {
                let d = c - mean;
                d * d
            })
            .sum::<f64>()
            / period as f64;
        let stddev = variance.sqrt();

        bands.middle[i] = Some(mean);
        bands.upper[i] = Some(mean + multiplier * stddev);
        bands.lower[i] = Some(mean - multiplier * stddev);
    }

    bands
}
