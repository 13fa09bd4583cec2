//! Performance metrics over equity curves and trade lists.

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Largest peak-to-trough decline as a fraction of the peak.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = match equity_curve.first() {
        Some(&first) => first,
        None => return 0.0,
    };
    let mut max_dd = 0.0;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        let dd = if peak > 0.0 { (peak - eq) / peak } else { 0.0 };
        if dd > max_dd {
            max_dd = dd;
        }
    }
    max_dd
}

/// Annualized Sharpe ratio over per-bar equity returns: mean over population
/// standard deviation, scaled by sqrt(252). Zero when the curve is flat.
pub fn sharpe_ratio(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();

    if std > 0.0 {
        mean / std * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

/// Gross profit over gross loss. Infinite with wins and no losses, zero
/// with no wins.
pub fn profit_factor(pnls: &[f64]) -> f64 {
    let gross_profit: f64 = pnls.iter().filter(|p| **p > 0.0).sum();
    let gross_loss: f64 = pnls.iter().filter(|p| **p <= 0.0).sum::<f64>().abs();

    if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else {
        f64::INFINITY
    }
}
