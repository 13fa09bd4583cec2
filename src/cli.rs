//! CLI definition and dispatch.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use clap::{Parser, Subcommand};

use crate::adapters::csv_adapter::CsvCandleAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::file_notifier::{ConsoleNotifier, FileNotifier};
use crate::adapters::paper_broker::PaperBroker;
use crate::adapters::sqlite_store::SqliteStore;
use crate::domain::backtest::{BacktestEngine, BacktestResult};
use crate::domain::candle::Candle;
use crate::domain::config::{BotConfig, BotMode};
use crate::domain::error::TraderError;
use crate::domain::grid_backtest::{GridBacktestEngine, GridBacktestResult};
use crate::domain::replay::ReplaySet;
use crate::ports::notify_port::NotifyPort;
use crate::trader::LiveTrader;

#[derive(Parser, Debug)]
#[command(name = "tidetrader", about = "Crypto trading bot with deterministic backtesting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the signal-strategy backtest over CSV candle history
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding {PRODUCT}.csv candle files
        #[arg(short, long)]
        data: PathBuf,
        /// Write the report to a file as well as stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the grid-strategy backtest over CSV candle history
    GridBacktest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
    },
    /// Run the paper trading loop
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding {PRODUCT}.csv candle files
        #[arg(short, long)]
        data: PathBuf,
        /// SQLite database path (in-memory when omitted)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Append notifications to this file instead of stderr
        #[arg(long)]
        notify_file: Option<PathBuf>,
        /// Stop after this many ticks (runs until killed when omitted)
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Validate a bot configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            output,
        } => run_backtest(&config, &data, output.as_ref()),
        Command::GridBacktest { config, data } => run_grid_backtest(&config, &data),
        Command::Run {
            config,
            data,
            db,
            notify_file,
            ticks,
        } => run_bot(&config, &data, db.as_ref(), notify_file, ticks),
        Command::Validate { config } => run_validate(&config),
    }
}

fn load_bot_config(path: &PathBuf) -> Result<BotConfig, ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    BotConfig::from_port(&adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

/// Load candle history for each pair, skipping pairs with missing or empty
/// files the way the live loop skips unavailable products.
fn load_history(
    data_dir: &PathBuf,
    pairs: &[String],
) -> Result<std::collections::BTreeMap<String, Vec<Candle>>, ExitCode> {
    let adapter = CsvCandleAdapter::new(data_dir.clone());
    let mut series = std::collections::BTreeMap::new();

    for pair in pairs {
        match adapter.load(pair) {
            Ok(candles) if !candles.is_empty() => {
                eprintln!("Loaded {pair}: {} candles", candles.len());
                series.insert(pair.clone(), candles);
            }
            Ok(_) => eprintln!("warning: skipping {pair} (no rows)"),
            Err(e) => eprintln!("warning: skipping {pair} ({e})"),
        }
    }

    if series.is_empty() {
        let err = TraderError::Data {
            reason: format!("no candle data found in {}", data_dir.display()),
        };
        eprintln!("error: {err}");
        return Err(ExitCode::from(&err));
    }
    Ok(series)
}

fn run_backtest(config_path: &PathBuf, data_dir: &PathBuf, output: Option<&PathBuf>) -> ExitCode {
    let config = match load_bot_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let series = match load_history(data_dir, &config.trading_pairs) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let set = ReplaySet::new(series);

    eprintln!(
        "\nRunning backtest: {} pairs, {} common bars",
        set.products().count(),
        set.common_len()
    );

    let engine = BacktestEngine::new(config);
    let result = engine.run(&set);

    let report = format_backtest_report(&result);
    print!("{report}");

    if let Some(path) = output {
        if let Err(e) = fs::write(path, &report) {
            eprintln!("error: failed to write report: {e}");
            return ExitCode::from(1);
        }
        eprintln!("Report written to {}", path.display());
    }
    ExitCode::SUCCESS
}

fn run_grid_backtest(config_path: &PathBuf, data_dir: &PathBuf) -> ExitCode {
    let config = match load_bot_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let series = match load_history(data_dir, &config.grid.pairs) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let set = ReplaySet::new(series);

    eprintln!(
        "\nRunning grid backtest: {} pairs, {} levels, {:.1}% spacing",
        config.grid.pairs.len(),
        config.grid.num_levels,
        config.grid.spacing_pct * 100.0
    );

    let engine = GridBacktestEngine::new(config);
    let result = engine.run(&set);

    print!("{}", format_grid_report(&result));
    ExitCode::SUCCESS
}

fn run_bot(
    config_path: &PathBuf,
    data_dir: &PathBuf,
    db_path: Option<&PathBuf>,
    notify_file: Option<PathBuf>,
    ticks: Option<u64>,
) -> ExitCode {
    let config = match load_bot_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if config.mode == BotMode::Live {
        eprintln!("error: this build has no live order gateway; set [bot] mode = paper");
        return ExitCode::from(4);
    }

    let store = match db_path {
        Some(path) => SqliteStore::open(path, true),
        None => SqliteStore::open_in_memory(true),
    };
    let store = match store {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    let notify: Box<dyn NotifyPort> = match notify_file {
        Some(path) => Box::new(FileNotifier::new(Some(path))),
        None => Box::new(ConsoleNotifier),
    };

    let mut trader = LiveTrader::new(
        config,
        Box::new(CsvCandleAdapter::new(data_dir.clone())),
        Box::new(PaperBroker::new()),
        Box::new(store),
        notify,
    );

    eprintln!("Starting paper trading loop (data from {})", data_dir.display());
    let stop = AtomicBool::new(false);
    trader.run(&stop, ticks);

    eprintln!("Trading loop stopped");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let config = match load_bot_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    println!("mode:          {:?}", config.mode);
    println!("strategy:      {:?}", config.strategy_mode);
    println!("capital:       ${:.2}", config.initial_capital_usd);
    println!("granularity:   {}", config.strategy.candle_granularity);
    println!("pairs:         {}", config.trading_pairs.join(", "));
    if config.grid.enabled {
        println!("grid pairs:    {}", config.grid.pairs.join(", "));
        println!("grid capital:  ${:.2}", config.grid.grid_capital_usd);
    }
    println!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

pub fn format_backtest_report(result: &BacktestResult) -> String {
    let mut out = String::new();
    let line_eq = "=".repeat(60);
    let line_dash = "-".repeat(60);

    let _ = writeln!(out, "\n{line_eq}");
    let _ = writeln!(out, "  BACKTEST PERFORMANCE REPORT");
    let _ = writeln!(out, "{line_eq}");
    let _ = writeln!(out, "  Starting Capital:   ${:.2}", result.starting_capital);
    let _ = writeln!(out, "  Ending Capital:     ${:.2}", result.ending_capital);
    let _ = writeln!(out, "  Total P&L:          ${:+.2}", result.total_pnl);
    let _ = writeln!(out, "  Total Return:       {:+.2}%", result.total_return_pct);
    let _ = writeln!(out, "{line_dash}");
    let _ = writeln!(out, "  Total Trades:       {}", result.trades.len());
    let _ = writeln!(out, "  Wins:               {}", result.win_count);
    let _ = writeln!(out, "  Losses:             {}", result.loss_count);
    let _ = writeln!(out, "  Win Rate:           {:.0}%", result.win_rate * 100.0);
    let _ = writeln!(out, "  Avg Win:            ${:+.2}", result.avg_win);
    let _ = writeln!(out, "  Avg Loss:           ${:+.2}", result.avg_loss);
    let _ = writeln!(out, "{line_dash}");
    let _ = writeln!(out, "  Profit Factor:      {:.2}", result.profit_factor);
    let _ = writeln!(out, "  Sharpe Ratio:       {:.2}", result.sharpe_ratio);
    let _ = writeln!(out, "  Max Drawdown:       {:.2}%", result.max_drawdown_pct);
    let _ = writeln!(out, "{line_eq}");

    if !result.trades.is_empty() {
        let mut by_reason: std::collections::BTreeMap<&str, (usize, f64)> =
            std::collections::BTreeMap::new();
        for t in &result.trades {
            let entry = by_reason.entry(t.exit_reason.as_str()).or_default();
            entry.0 += 1;
            entry.1 += t.pnl;
        }
        let _ = writeln!(out, "\n  Exit Reason Breakdown:");
        for (reason, (count, pnl)) in &by_reason {
            let _ = writeln!(out, "    {reason:20}  {count:3} trades  ${pnl:+8.2}");
        }

        let mut by_product: std::collections::BTreeMap<&str, (usize, usize, f64)> =
            std::collections::BTreeMap::new();
        for t in &result.trades {
            let entry = by_product.entry(&t.product_id).or_default();
            entry.0 += 1;
            if t.pnl > 0.0 {
                entry.1 += 1;
            }
            entry.2 += t.pnl;
        }
        let _ = writeln!(out, "\n  Product Breakdown:");
        for (pid, (count, wins, pnl)) in &by_product {
            let _ = writeln!(
                out,
                "    {pid:12}  {count:3} trades  W:{wins} L:{}  ${pnl:+8.2}",
                count - wins
            );
        }
    }

    if !result.trades.is_empty() && result.trades.len() <= 50 {
        let _ = writeln!(out, "\n  Trade Log:");
        let _ = writeln!(
            out,
            "  {:>3}  {:12}  {:>10}  {:>10}  {:>8}  {:>7}  Reason",
            "#", "Product", "Entry", "Exit", "P&L", "%"
        );
        let _ = writeln!(out, "  {}", "-".repeat(70));
        for (n, t) in result.trades.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {:3}  {:12}  ${:>9.4}  ${:>9.4}  ${:>+7.2}  {:>+6.1}%  {}",
                n + 1,
                t.product_id,
                t.entry_price,
                t.exit_price,
                t.pnl,
                t.pnl_pct,
                t.exit_reason.as_str()
            );
        }
    }

    out.push('\n');
    out
}

pub fn format_grid_report(result: &GridBacktestResult) -> String {
    let mut out = String::new();
    let line = "=".repeat(50);

    let _ = writeln!(out, "\n{line}");
    let _ = writeln!(out, "  GRID BACKTEST RESULTS");
    let _ = writeln!(out, "{line}");
    let _ = writeln!(out, "  Grid Capital:    ${:.2}", result.grid_capital);
    let _ = writeln!(out, "  Total P&L:       ${:.4}", result.total_pnl);
    let _ = writeln!(out, "  Return:          {:.2}%", result.return_pct);
    let _ = writeln!(out, "  Max Deployed:    ${:.2}", result.max_deployed);
    let _ = writeln!(out, "  Total Buys:      {}", result.total_buys);
    let _ = writeln!(out, "  Total Sells:     {}", result.total_sells);
    let _ = writeln!(out, "  Rebalances:      {}", result.num_rebalances);
    let _ = writeln!(
        out,
        "  Total Fills:     {}",
        result.total_buys + result.total_sells
    );
    let _ = writeln!(out, "{line}");

    if !result.trades.is_empty() {
        let shown = result.trades.len().min(20);
        let _ = writeln!(out, "\n  Last {shown} trades (of {}):", result.trades.len());
        let _ = writeln!(
            out,
            "  {:>4}  {:12}  {:4}  {:>10}  {:>8}",
            "#", "Product", "Side", "Price", "P&L"
        );
        let _ = writeln!(out, "  {}", "-".repeat(45));
        for t in result.trades.iter().rev().take(20).rev() {
            let pnl = if t.pnl != 0.0 {
                format!("${:>+7.4}", t.pnl)
            } else {
                "       -".to_string()
            };
            let _ = writeln!(
                out,
                "  {:4}  {:12}  {:<4}  ${:>9.4}  {pnl}",
                t.candle_idx,
                t.product_id,
                t.side.to_string(),
                t.price
            );
        }
    }

    out.push('\n');
    out
}
