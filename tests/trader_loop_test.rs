//! End-to-end paper trading loop tests with scripted market data.

mod common;

use common::{
    buy_series, grid_test_config, test_config, MemoryStore, RecordingNotifier, ScriptedMarket,
};
use tidetrader::adapters::paper_broker::PaperBroker;
use tidetrader::domain::stop_loss::ExitReason;
use tidetrader::trader::LiveTrader;

fn build_trader(
    config: tidetrader::domain::config::BotConfig,
    market: ScriptedMarket,
) -> (LiveTrader, MemoryStore, RecordingNotifier) {
    build_trader_with_store(config, market, MemoryStore::new())
}

fn build_trader_with_store(
    config: tidetrader::domain::config::BotConfig,
    market: ScriptedMarket,
    store: MemoryStore,
) -> (LiveTrader, MemoryStore, RecordingNotifier) {
    let notify = RecordingNotifier::new();
    let trader = LiveTrader::new(
        config,
        Box::new(market),
        Box::new(PaperBroker::new()),
        Box::new(store.clone()),
        Box::new(notify.clone()),
    );
    (trader, store, notify)
}

#[test]
fn confluence_signal_opens_position() {
    let market = ScriptedMarket::new().with_candles("ETH-USD", buy_series(60));
    let (mut trader, store, notify) = build_trader(test_config(), market);

    trader.tick();

    assert_eq!(trader.ledger().open_position_count(), 1);
    let pos = trader.ledger().position("ETH-USD").unwrap();
    // 2% of $300 at the last close of 100.
    assert!((pos.usd_cost - 6.0).abs() < 1e-9);
    assert!((pos.entry_price - 100.0).abs() < 1e-9);
    assert!((pos.stop_loss - 97.5).abs() < 1e-9);
    assert!((pos.take_profit - 104.0).abs() < 1e-9);

    let log = store.log.lock().unwrap();
    assert_eq!(log.opens.len(), 1);
    assert_eq!(log.signals.len(), 1);
    assert!(log.signals[0].1, "acted-on signal should be stored as such");
    drop(log);

    assert!(notify.contains("OPENED ETH-USD"));
}

#[test]
fn stop_loss_closes_position_next_tick() {
    let market = ScriptedMarket::new()
        .with_candles("ETH-USD", buy_series(60))
        .with_prices("ETH-USD", &[90.0]);
    let (mut trader, store, notify) = build_trader(test_config(), market);

    trader.tick();
    assert_eq!(trader.ledger().open_position_count(), 1);

    trader.tick();

    let log = store.log.lock().unwrap();
    assert_eq!(log.closes.len(), 1);
    let closed = &log.closes[0];
    assert_eq!(closed.exit_reason, ExitReason::StopLoss);
    assert!((closed.exit_price - 90.0).abs() < 1e-9);
    assert!(closed.pnl < 0.0);
    drop(log);

    assert!(notify.contains("CLOSED ETH-USD [LOSS]"));
    // Loss of $0.60 is under the $15 daily limit, so the loop re-enters on
    // the same still-bullish history.
    assert_eq!(trader.ledger().open_position_count(), 1);
}

#[test]
fn daily_loss_limit_pauses_entries() {
    let mut config = test_config();
    config.risk.daily_loss_limit_usd = 0.5;

    let market = ScriptedMarket::new()
        .with_candles("ETH-USD", buy_series(60))
        .with_prices("ETH-USD", &[90.0]);
    let (mut trader, _store, notify) = build_trader(config, market);

    trader.tick();
    trader.tick();

    assert!(notify.contains("DAILY LOSS LIMIT HIT"));
    // Entries are paused for the rest of the day, so nothing reopens.
    assert_eq!(trader.ledger().open_position_count(), 0);

    trader.tick();
    assert_eq!(trader.ledger().open_position_count(), 0);
}

#[test]
fn insufficient_history_holds() {
    let market = ScriptedMarket::new().with_candles("ETH-USD", buy_series(20));
    let (mut trader, store, _notify) = build_trader(test_config(), market);

    trader.tick();

    assert_eq!(trader.ledger().open_position_count(), 0);
    assert!(store.log.lock().unwrap().signals.is_empty());
}

#[test]
fn grid_places_ladder_and_fills_on_dip() {
    let market = ScriptedMarket::new().with_prices("ETH-USD", &[100.0, 97.0]);
    let (mut trader, store, notify) = build_trader(grid_test_config(), market);

    // First tick: fresh grid around 100, six limit orders placed.
    trader.tick();
    {
        let log = store.log.lock().unwrap();
        assert_eq!(log.grid_orders.len(), 6);
        assert!(log.grid_fills.is_empty());
    }

    // Second tick: price dips to 97, filling the buys at 99, 98, 97. Each
    // fill flips into a replacement sell order.
    trader.tick();
    {
        let log = store.log.lock().unwrap();
        assert_eq!(log.grid_fills.len(), 3);
        for (_, fill_price, pnl) in &log.grid_fills {
            assert!((fill_price - 97.0).abs() < 1e-9);
            assert_eq!(*pnl, 0.0);
        }
        assert_eq!(log.grid_orders.len(), 9);
    }

    assert!(notify.contains("GRID BUY FILLED ETH-USD"));
    // Buys realize nothing.
    assert_eq!(trader.grid_pnl(), 0.0);
}

#[test]
fn grid_sell_fill_realizes_spread() {
    // Dip fills the buys, then the bounce fills the flipped sells.
    let market = ScriptedMarket::new().with_prices("ETH-USD", &[100.0, 97.0, 103.0]);
    let (mut trader, store, notify) = build_trader(grid_test_config(), market);

    trader.tick();
    trader.tick();
    trader.tick();

    let log = store.log.lock().unwrap();
    let sell_fills: Vec<_> = log
        .grid_fills
        .iter()
        .filter(|(_, _, pnl)| *pnl > 0.0)
        .collect();
    assert!(!sell_fills.is_empty());
    drop(log);

    assert!(notify.contains("GRID SELL FILLED ETH-USD"));
    assert!(trader.grid_pnl() > 0.0);
}

#[test]
fn grid_skips_protected_pairs() {
    let mut config = grid_test_config();
    config.grid.pairs = vec!["BTC-USD".to_string()];

    let market = ScriptedMarket::new().with_prices("BTC-USD", &[50_000.0]);
    let (mut trader, store, _notify) = build_trader(config, market);

    trader.tick();
    assert!(store.log.lock().unwrap().grid_orders.is_empty());
}

#[test]
fn market_error_does_not_abort_tick() {
    // SOL-USD has no data at all; ETH-USD should still trade.
    let mut config = test_config();
    config.trading_pairs = vec!["ETH-USD".to_string(), "SOL-USD".to_string()];

    let market = ScriptedMarket::new().with_candles("ETH-USD", buy_series(60));
    let (mut trader, _store, notify) = build_trader(config, market);

    let failures = trader.tick();

    assert_eq!(failures, 1);
    assert_eq!(trader.ledger().open_position_count(), 1);
    assert!(notify.contains("ERROR in entry check SOL-USD"));
}

#[test]
fn clean_tick_reports_no_failures() {
    let market = ScriptedMarket::new().with_candles("ETH-USD", buy_series(60));
    let (mut trader, _store, _notify) = build_trader(test_config(), market);

    assert_eq!(trader.tick(), 0);
}

#[test]
fn store_outage_does_not_desync_ledger() {
    let market = ScriptedMarket::new().with_candles("ETH-USD", buy_series(60));
    let store = MemoryStore::new().with_failing_trade_writes();
    let (mut trader, _store, notify) = build_trader_with_store(test_config(), market, store);

    trader.tick();

    // The buy executed, so capital must be deducted and the stop tracked
    // even though the open row never reached the store.
    assert_eq!(trader.ledger().open_position_count(), 1);
    assert!((trader.ledger().capital - 294.0).abs() < 1e-9);
    assert!(notify.contains("OPENED ETH-USD"));
    assert!(notify.contains("ERROR in store open ETH-USD"));
}

#[test]
fn store_outage_still_records_daily_loss() {
    let mut config = test_config();
    config.risk.daily_loss_limit_usd = 0.5;

    let market = ScriptedMarket::new()
        .with_candles("ETH-USD", buy_series(60))
        .with_prices("ETH-USD", &[90.0]);
    let store = MemoryStore::new().with_failing_trade_writes();
    let (mut trader, _store, notify) = build_trader_with_store(config, market, store);

    trader.tick();
    assert_eq!(trader.ledger().open_position_count(), 1);

    trader.tick();

    // The realized loss reaches the risk gate before the failing store
    // write, so entries pause instead of reopening.
    assert!(notify.contains("CLOSED ETH-USD [LOSS]"));
    assert!(notify.contains("DAILY LOSS LIMIT HIT"));
    assert!(notify.contains("ERROR in store close ETH-USD"));
    assert_eq!(trader.ledger().open_position_count(), 0);

    trader.tick();
    assert_eq!(trader.ledger().open_position_count(), 0);
}
