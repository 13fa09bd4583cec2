//! Crate-wide error types.
//!
//! Insufficient-data and risk-blocked conditions are NOT errors: the signal
//! generator resolves them as HOLD, the backtest engines as zero-valued
//! results, and the risk gate as an explicit blocked branch.

/// Top-level error type for tidetrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no market data for {product}")]
    NoData { product: String },

    #[error("market data error: {reason}")]
    Data { reason: String },

    #[error("broker error: {reason}")]
    Broker { reason: String },

    #[error("store error: {reason}")]
    Store { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for TraderError {
    fn from(err: rusqlite::Error) -> Self {
        TraderError::Store {
            reason: err.to_string(),
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::NoData { .. } | TraderError::Data { .. } => 3,
            TraderError::Broker { .. } => 4,
            TraderError::Store { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        let err = TraderError::ConfigInvalid {
            section: "risk".into(),
            key: "max_position_pct".into(),
            reason: "must be between 0 and 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value [risk] max_position_pct: must be between 0 and 1"
        );

        let err = TraderError::NoData {
            product: "ETH-USD".into(),
        };
        assert_eq!(err.to_string(), "no market data for ETH-USD");
    }
}
