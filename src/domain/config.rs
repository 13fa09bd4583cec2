//! Typed bot configuration.
//!
//! Every recognized option is read, defaulted, and validated once at startup;
//! engines receive the relevant sub-struct by reference and never touch raw
//! config again.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::TraderError;
use crate::ports::config_port::ConfigPort;

/// Execution mode: paper fills instantly at the reference price, live goes
/// through the real order gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotMode {
    Paper,
    Live,
}

impl FromStr for BotMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paper" => Ok(BotMode::Paper),
            "live" => Ok(BotMode::Live),
            other => Err(format!("unknown mode '{other}', expected paper or live")),
        }
    }
}

/// Which strategies the live loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyMode {
    Signal,
    Grid,
    Both,
}

impl FromStr for StrategyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "signal" => Ok(StrategyMode::Signal),
            "grid" => Ok(StrategyMode::Grid),
            "both" => Ok(StrategyMode::Both),
            other => Err(format!(
                "unknown strategy '{other}', expected signal, grid or both"
            )),
        }
    }
}

/// Candle duration accepted by the market data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    OneMinute,
    FiveMinute,
    FifteenMinute,
    ThirtyMinute,
    OneHour,
    TwoHour,
    SixHour,
    OneDay,
}

impl Granularity {
    pub fn seconds(self) -> i64 {
        match self {
            Granularity::OneMinute => 60,
            Granularity::FiveMinute => 300,
            Granularity::FifteenMinute => 900,
            Granularity::ThirtyMinute => 1800,
            Granularity::OneHour => 3600,
            Granularity::TwoHour => 7200,
            Granularity::SixHour => 21600,
            Granularity::OneDay => 86400,
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ONE_MINUTE" => Ok(Granularity::OneMinute),
            "FIVE_MINUTE" => Ok(Granularity::FiveMinute),
            "FIFTEEN_MINUTE" => Ok(Granularity::FifteenMinute),
            "THIRTY_MINUTE" => Ok(Granularity::ThirtyMinute),
            "ONE_HOUR" => Ok(Granularity::OneHour),
            "TWO_HOUR" => Ok(Granularity::TwoHour),
            "SIX_HOUR" => Ok(Granularity::SixHour),
            "ONE_DAY" => Ok(Granularity::OneDay),
            other => Err(format!("unknown granularity '{other}'")),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Granularity::OneMinute => "ONE_MINUTE",
            Granularity::FiveMinute => "FIVE_MINUTE",
            Granularity::FifteenMinute => "FIFTEEN_MINUTE",
            Granularity::ThirtyMinute => "THIRTY_MINUTE",
            Granularity::OneHour => "ONE_HOUR",
            Granularity::TwoHour => "TWO_HOUR",
            Granularity::SixHour => "SIX_HOUR",
            Granularity::OneDay => "ONE_DAY",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub max_position_pct: f64,
    pub max_open_positions: usize,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub trailing_stop_activate_pct: f64,
    pub trailing_stop_distance_pct: f64,
    pub daily_loss_limit_pct: f64,
    pub daily_loss_limit_usd: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub bollinger_period: usize,
    pub bollinger_std_dev: f64,
    pub volume_period: usize,
    pub volume_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub candle_granularity: Granularity,
    pub lookback_candles: usize,
    pub min_confirmations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    pub enabled: bool,
    pub pairs: Vec<String>,
    pub num_levels: usize,
    pub spacing_pct: f64,
    pub order_size_usd: f64,
    pub rebalance_threshold_pct: f64,
    pub grid_capital_usd: f64,
}

/// Immutable configuration value object assembled once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub initial_capital_usd: f64,
    pub risk: RiskConfig,
    pub indicators: IndicatorConfig,
    pub strategy: StrategyConfig,
    pub grid: GridConfig,
    pub protected_assets: Vec<String>,
    pub trading_pairs: Vec<String>,
    pub mode: BotMode,
    pub strategy_mode: StrategyMode,
    pub loop_interval_secs: u64,
    pub min_order_usd: f64,
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TraderError {
    TraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn positive(section: &str, key: &str, value: f64) -> Result<f64, TraderError> {
    if value <= 0.0 {
        return Err(invalid(section, key, format!("{key} must be positive")));
    }
    Ok(value)
}

fn fraction(section: &str, key: &str, value: f64) -> Result<f64, TraderError> {
    if value <= 0.0 || value > 1.0 {
        return Err(invalid(
            section,
            key,
            format!("{key} must be between 0 and 1"),
        ));
    }
    Ok(value)
}

fn period(section: &str, key: &str, value: i64) -> Result<usize, TraderError> {
    if value < 1 {
        return Err(invalid(section, key, format!("{key} must be at least 1")));
    }
    Ok(value as usize)
}

impl BotConfig {
    /// Assemble and validate the full configuration from a config source.
    pub fn from_port(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let initial_capital_usd =
            positive("capital", "initial_usd", config.get_double("capital", "initial_usd", 300.0))?;

        let risk = RiskConfig {
            max_position_pct: fraction(
                "risk",
                "max_position_pct",
                config.get_double("risk", "max_position_pct", 0.02),
            )?,
            max_open_positions: period(
                "risk",
                "max_open_positions",
                config.get_int("risk", "max_open_positions", 3),
            )?,
            stop_loss_pct: fraction(
                "risk",
                "stop_loss_pct",
                config.get_double("risk", "stop_loss_pct", 0.025),
            )?,
            take_profit_pct: fraction(
                "risk",
                "take_profit_pct",
                config.get_double("risk", "take_profit_pct", 0.04),
            )?,
            trailing_stop_activate_pct: fraction(
                "risk",
                "trailing_stop_activate_pct",
                config.get_double("risk", "trailing_stop_activate_pct", 0.03),
            )?,
            trailing_stop_distance_pct: fraction(
                "risk",
                "trailing_stop_distance_pct",
                config.get_double("risk", "trailing_stop_distance_pct", 0.015),
            )?,
            daily_loss_limit_pct: fraction(
                "risk",
                "daily_loss_limit_pct",
                config.get_double("risk", "daily_loss_limit_pct", 0.05),
            )?,
            daily_loss_limit_usd: positive(
                "risk",
                "daily_loss_limit_usd",
                config.get_double("risk", "daily_loss_limit_usd", 15.0),
            )?,
        };

        let indicators = IndicatorConfig {
            rsi_period: period(
                "indicators",
                "rsi_period",
                config.get_int("indicators", "rsi_period", 14),
            )?,
            rsi_oversold: config.get_double("indicators", "rsi_oversold", 30.0),
            rsi_overbought: config.get_double("indicators", "rsi_overbought", 70.0),
            ema_fast: period(
                "indicators",
                "ema_fast",
                config.get_int("indicators", "ema_fast", 12),
            )?,
            ema_slow: period(
                "indicators",
                "ema_slow",
                config.get_int("indicators", "ema_slow", 26),
            )?,
            bollinger_period: period(
                "indicators",
                "bollinger_period",
                config.get_int("indicators", "bollinger_period", 20),
            )?,
            bollinger_std_dev: positive(
                "indicators",
                "bollinger_std_dev",
                config.get_double("indicators", "bollinger_std_dev", 2.0),
            )?,
            volume_period: period(
                "indicators",
                "volume_period",
                config.get_int("indicators", "volume_period", 20),
            )?,
            volume_multiplier: positive(
                "indicators",
                "volume_multiplier",
                config.get_double("indicators", "volume_multiplier", 1.5),
            )?,
        };

        if indicators.rsi_oversold >= indicators.rsi_overbought {
            return Err(invalid(
                "indicators",
                "rsi_oversold",
                "rsi_oversold must be below rsi_overbought",
            ));
        }
        if indicators.ema_fast >= indicators.ema_slow {
            return Err(invalid(
                "indicators",
                "ema_fast",
                "ema_fast must be shorter than ema_slow",
            ));
        }

        let granularity_str = config
            .get_string("strategy", "candle_granularity")
            .unwrap_or_else(|| "ONE_HOUR".to_string());
        let candle_granularity = granularity_str
            .parse::<Granularity>()
            .map_err(|reason| invalid("strategy", "candle_granularity", reason))?;

        let strategy = StrategyConfig {
            candle_granularity,
            lookback_candles: period(
                "strategy",
                "lookback_candles",
                config.get_int("strategy", "lookback_candles", 100),
            )?,
            min_confirmations: {
                let v = config.get_int("strategy", "min_confirmations", 3);
                if !(1..=4).contains(&v) {
                    return Err(invalid(
                        "strategy",
                        "min_confirmations",
                        "min_confirmations must be between 1 and 4",
                    ));
                }
                v as usize
            },
        };

        let grid = GridConfig {
            enabled: config.get_bool("grid", "enabled", false),
            pairs: config.get_list("grid", "pairs"),
            num_levels: period(
                "grid",
                "num_levels",
                config.get_int("grid", "num_levels", 5),
            )?,
            spacing_pct: fraction(
                "grid",
                "grid_spacing_pct",
                config.get_double("grid", "grid_spacing_pct", 0.01),
            )?,
            order_size_usd: positive(
                "grid",
                "order_size_usd",
                config.get_double("grid", "order_size_usd", 10.0),
            )?,
            rebalance_threshold_pct: fraction(
                "grid",
                "rebalance_threshold_pct",
                config.get_double("grid", "rebalance_threshold_pct", 0.05),
            )?,
            grid_capital_usd: positive(
                "grid",
                "grid_capital_usd",
                config.get_double("grid", "grid_capital_usd", 150.0),
            )?,
        };

        let mode = config
            .get_string("bot", "mode")
            .unwrap_or_else(|| "paper".to_string())
            .parse::<BotMode>()
            .map_err(|reason| invalid("bot", "mode", reason))?;

        let strategy_mode = config
            .get_string("bot", "strategy")
            .unwrap_or_else(|| "signal".to_string())
            .parse::<StrategyMode>()
            .map_err(|reason| invalid("bot", "strategy", reason))?;

        let trading_pairs = config.get_list("bot", "trading_pairs");
        if trading_pairs.is_empty() {
            return Err(TraderError::ConfigMissing {
                section: "bot".to_string(),
                key: "trading_pairs".to_string(),
            });
        }

        let grid_runs = grid.enabled
            && matches!(strategy_mode, StrategyMode::Grid | StrategyMode::Both);
        if grid_runs && grid.pairs.is_empty() {
            return Err(TraderError::ConfigMissing {
                section: "grid".to_string(),
                key: "pairs".to_string(),
            });
        }

        let loop_interval = config.get_int("bot", "loop_interval_seconds", 60);
        if loop_interval < 1 {
            return Err(invalid(
                "bot",
                "loop_interval_seconds",
                "loop_interval_seconds must be at least 1",
            ));
        }

        let min_order_usd = positive(
            "bot",
            "min_order_usd",
            config.get_double("bot", "min_order_usd", 1.0),
        )?;

        let protected_assets: Vec<String> = config
            .get_list("bot", "protected_assets")
            .into_iter()
            .map(|s| s.to_uppercase())
            .collect();

        Ok(BotConfig {
            initial_capital_usd,
            risk,
            indicators,
            strategy,
            grid,
            protected_assets,
            trading_pairs,
            mode,
            strategy_mode,
            loop_interval_secs: loop_interval as u64,
            min_order_usd,
        })
    }

    /// Capital available to the signal strategy. Running `both` strategies
    /// carves the grid allocation out of the signal allocation.
    pub fn signal_capital(&self) -> f64 {
        if self.grid.enabled && self.strategy_mode == StrategyMode::Both {
            self.initial_capital_usd - self.grid.grid_capital_usd
        } else {
            self.initial_capital_usd
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> BotConfig {
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        BotConfig::from_port(&adapter).unwrap()
    }

    fn make_err(content: &str) -> TraderError {
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        BotConfig::from_port(&adapter).unwrap_err()
    }

    const MINIMAL: &str = "[bot]\ntrading_pairs = ETH-USD\n";

    #[test]
    fn defaults_applied() {
        let cfg = make_config(MINIMAL);
        assert_eq!(cfg.initial_capital_usd, 300.0);
        assert_eq!(cfg.risk.max_position_pct, 0.02);
        assert_eq!(cfg.risk.max_open_positions, 3);
        assert_eq!(cfg.indicators.rsi_period, 14);
        assert_eq!(cfg.indicators.ema_fast, 12);
        assert_eq!(cfg.indicators.ema_slow, 26);
        assert_eq!(cfg.strategy.candle_granularity, Granularity::OneHour);
        assert_eq!(cfg.strategy.min_confirmations, 3);
        assert!(!cfg.grid.enabled);
        assert_eq!(cfg.grid.num_levels, 5);
        assert_eq!(cfg.mode, BotMode::Paper);
        assert_eq!(cfg.strategy_mode, StrategyMode::Signal);
        assert_eq!(cfg.min_order_usd, 1.0);
    }

    #[test]
    fn full_config_parses() {
        let cfg = make_config(
            r#"
[capital]
initial_usd = 500.0

[risk]
max_position_pct = 0.05
max_open_positions = 2
stop_loss_pct = 0.03
take_profit_pct = 0.06
daily_loss_limit_usd = 25.0

[indicators]
rsi_period = 10
rsi_oversold = 25
rsi_overbought = 75
ema_fast = 9
ema_slow = 21

[strategy]
candle_granularity = FIFTEEN_MINUTE
lookback_candles = 200
min_confirmations = 2

[grid]
enabled = true
pairs = ETH-USD, SOL-USD
num_levels = 4
grid_spacing_pct = 0.02
order_size_usd = 20.0

[bot]
mode = live
strategy = both
trading_pairs = ETH-USD, SOL-USD, DOGE-USD
protected_assets = BTC, shib
loop_interval_seconds = 30
"#,
        );
        assert_eq!(cfg.initial_capital_usd, 500.0);
        assert_eq!(cfg.risk.max_open_positions, 2);
        assert_eq!(cfg.indicators.rsi_oversold, 25.0);
        assert_eq!(
            cfg.strategy.candle_granularity,
            Granularity::FifteenMinute
        );
        assert_eq!(cfg.grid.pairs, vec!["ETH-USD", "SOL-USD"]);
        assert_eq!(cfg.trading_pairs.len(), 3);
        assert_eq!(cfg.protected_assets, vec!["BTC", "SHIB"]);
        assert_eq!(cfg.mode, BotMode::Live);
        assert_eq!(cfg.strategy_mode, StrategyMode::Both);
        assert_eq!(cfg.loop_interval_secs, 30);
    }

    #[test]
    fn signal_capital_split_in_both_mode() {
        let cfg = make_config(
            "[capital]\ninitial_usd = 300\n[grid]\nenabled = true\npairs = ETH-USD\ngrid_capital_usd = 150\n[bot]\nstrategy = both\ntrading_pairs = ETH-USD\n",
        );
        assert_eq!(cfg.signal_capital(), 150.0);
        assert_eq!(cfg.initial_capital_usd, 300.0);
    }

    #[test]
    fn signal_capital_undivided_in_signal_mode() {
        let cfg = make_config(MINIMAL);
        assert_eq!(cfg.signal_capital(), 300.0);
    }

    #[test]
    fn missing_trading_pairs_fails() {
        let err = make_err("[bot]\nmode = paper\n");
        assert!(matches!(err, TraderError::ConfigMissing { key, .. } if key == "trading_pairs"));
    }

    #[test]
    fn grid_enabled_without_pairs_fails() {
        let err = make_err(
            "[grid]\nenabled = true\n[bot]\nstrategy = grid\ntrading_pairs = ETH-USD\n",
        );
        assert!(matches!(err, TraderError::ConfigMissing { key, .. } if key == "pairs"));
    }

    #[test]
    fn position_pct_out_of_range_fails() {
        let err = make_err("[risk]\nmax_position_pct = 1.5\n[bot]\ntrading_pairs = ETH-USD\n");
        assert!(
            matches!(err, TraderError::ConfigInvalid { key, .. } if key == "max_position_pct")
        );
    }

    #[test]
    fn zero_capital_fails() {
        let err = make_err("[capital]\ninitial_usd = 0\n[bot]\ntrading_pairs = ETH-USD\n");
        assert!(matches!(err, TraderError::ConfigInvalid { key, .. } if key == "initial_usd"));
    }

    #[test]
    fn ema_fast_not_below_slow_fails() {
        let err = make_err(
            "[indicators]\nema_fast = 26\nema_slow = 12\n[bot]\ntrading_pairs = ETH-USD\n",
        );
        assert!(matches!(err, TraderError::ConfigInvalid { key, .. } if key == "ema_fast"));
    }

    #[test]
    fn rsi_thresholds_must_be_ordered() {
        let err = make_err(
            "[indicators]\nrsi_oversold = 70\nrsi_overbought = 30\n[bot]\ntrading_pairs = ETH-USD\n",
        );
        assert!(matches!(err, TraderError::ConfigInvalid { key, .. } if key == "rsi_oversold"));
    }

    #[test]
    fn bad_mode_fails() {
        let err = make_err("[bot]\nmode = dry\ntrading_pairs = ETH-USD\n");
        assert!(matches!(err, TraderError::ConfigInvalid { key, .. } if key == "mode"));
    }

    #[test]
    fn bad_granularity_fails() {
        let err = make_err(
            "[strategy]\ncandle_granularity = TEN_MINUTE\n[bot]\ntrading_pairs = ETH-USD\n",
        );
        assert!(
            matches!(err, TraderError::ConfigInvalid { key, .. } if key == "candle_granularity")
        );
    }

    #[test]
    fn min_confirmations_bounds() {
        let err = make_err(
            "[strategy]\nmin_confirmations = 5\n[bot]\ntrading_pairs = ETH-USD\n",
        );
        assert!(
            matches!(err, TraderError::ConfigInvalid { key, .. } if key == "min_confirmations")
        );
    }

    #[test]
    fn granularity_seconds() {
        assert_eq!(Granularity::OneMinute.seconds(), 60);
        assert_eq!(Granularity::OneHour.seconds(), 3600);
        assert_eq!(Granularity::OneDay.seconds(), 86400);
    }

    #[test]
    fn granularity_round_trips_display() {
        for g in [
            Granularity::OneMinute,
            Granularity::FiveMinute,
            Granularity::FifteenMinute,
            Granularity::ThirtyMinute,
            Granularity::OneHour,
            Granularity::TwoHour,
            Granularity::SixHour,
            Granularity::OneDay,
        ] {
            assert_eq!(g.to_string().parse::<Granularity>().unwrap(), g);
        }
    }
}
