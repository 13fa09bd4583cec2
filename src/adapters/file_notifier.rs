//! Notification adapters.
//!
//! The original deployment sent SMS alerts; here the same messages go to a
//! log file and/or stderr. Delivery failures are swallowed: a notification
//! problem must never stop the trading loop.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;

use crate::ports::notify_port::NotifyPort;

/// Appends one line per message to a file. With no path configured every
/// message is dropped.
pub struct FileNotifier {
    path: Option<PathBuf>,
}

impl FileNotifier {
    pub fn new(path: Option<PathBuf>) -> Self {
        FileNotifier { path }
    }
}

impl NotifyPort for FileNotifier {
    fn send(&self, text: &str) {
        let Some(path) = &self.path else {
            return;
        };
        let line = format!(
            "{} {}\n",
            Utc::now().to_rfc3339(),
            text.replace('\n', " | ")
        );
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = file.write_all(line.as_bytes());
        }
    }
}

/// Prints messages to stderr, next to the loop's progress output.
pub struct ConsoleNotifier;

impl NotifyPort for ConsoleNotifier {
    fn send(&self, text: &str) {
        eprintln!("[notify] {}", text.replace('\n', " | "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::portfolio::{ClosedTrade, Position};
    use crate::domain::stop_loss::ExitReason;

    #[test]
    fn writes_one_line_per_message() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("notify.log");
        let notifier = FileNotifier::new(Some(path.clone()));

        notifier.send("first");
        notifier.send("second\nwith newline");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("first"));
        assert!(lines[1].ends_with("second | with newline"));
    }

    #[test]
    fn no_path_is_silent() {
        let notifier = FileNotifier::new(None);
        notifier.send("dropped");
    }

    #[test]
    fn trade_messages_format() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("notify.log");
        let notifier = FileNotifier::new(Some(path.clone()));

        notifier.trade_opened(&Position {
            product_id: "ETH-USD".to_string(),
            entry_price: 2000.0,
            size: 0.003,
            usd_cost: 6.0,
            stop_loss: 1950.0,
            take_profit: 2080.0,
            order_id: "paper-000001".to_string(),
        });
        notifier.trade_closed(&ClosedTrade {
            product_id: "ETH-USD".to_string(),
            entry_price: 2000.0,
            exit_price: 2080.0,
            size: 0.003,
            usd_cost: 6.0,
            usd_return: 6.24,
            pnl: 0.24,
            pnl_pct: 4.0,
            exit_reason: ExitReason::TakeProfit,
        });
        notifier.daily_limit_hit(15.5);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("OPENED ETH-USD"));
        assert!(content.contains("CLOSED ETH-USD [WIN] | take_profit"));
        assert!(content.contains("(+4.00%)"));
        assert!(content.contains("DAILY LOSS LIMIT HIT: $15.50"));
    }
}
