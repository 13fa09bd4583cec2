//! CSV candle data adapter.
//!
//! Reads one file per product from a base directory: `{PRODUCT}.csv` with a
//! `timestamp,open,high,low,close,volume` header, timestamps in epoch
//! seconds. Rows are sorted and de-duplicated by timestamp on load.

use std::fs;
use std::path::PathBuf;

use crate::domain::candle::Candle;
use crate::domain::config::Granularity;
use crate::domain::error::TraderError;
use crate::ports::market_port::MarketPort;

pub struct CsvCandleAdapter {
    base_path: PathBuf,
}

impl CsvCandleAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, product_id: &str) -> PathBuf {
        self.base_path.join(format!("{product_id}.csv"))
    }

    fn parse_field(record: &csv::StringRecord, idx: usize, name: &str) -> Result<f64, TraderError> {
        record
            .get(idx)
            .ok_or_else(|| TraderError::Data {
                reason: format!("missing {name} column"),
            })?
            .parse()
            .map_err(|e| TraderError::Data {
                reason: format!("invalid {name} value: {e}"),
            })
    }

    /// Load the full candle history for one product.
    pub fn load(&self, product_id: &str) -> Result<Vec<Candle>, TraderError> {
        let path = self.csv_path(product_id);
        let content = fs::read_to_string(&path).map_err(|e| TraderError::Data {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| TraderError::Data {
                reason: format!("CSV parse error: {e}"),
            })?;

            let timestamp: i64 = record
                .get(0)
                .ok_or_else(|| TraderError::Data {
                    reason: "missing timestamp column".into(),
                })?
                .parse()
                .map_err(|e| TraderError::Data {
                    reason: format!("invalid timestamp: {e}"),
                })?;

            candles.push(Candle {
                timestamp,
                open: Self::parse_field(&record, 1, "open")?,
                high: Self::parse_field(&record, 2, "high")?,
                low: Self::parse_field(&record, 3, "low")?,
                close: Self::parse_field(&record, 4, "close")?,
                volume: Self::parse_field(&record, 5, "volume")?,
            });
        }

        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);
        Ok(candles)
    }

    /// Load candle history for several products at once.
    pub fn load_all(
        &self,
        product_ids: &[String],
    ) -> Result<std::collections::BTreeMap<String, Vec<Candle>>, TraderError> {
        let mut out = std::collections::BTreeMap::new();
        for pid in product_ids {
            out.insert(pid.clone(), self.load(pid)?);
        }
        Ok(out)
    }
}

impl MarketPort for CsvCandleAdapter {
    fn candles(
        &self,
        product_id: &str,
        _granularity: Granularity,
        count: usize,
    ) -> Result<Vec<Candle>, TraderError> {
        let all = self.load(product_id)?;
        let skip = all.len().saturating_sub(count);
        Ok(all.into_iter().skip(skip).collect())
    }

    fn current_price(&self, product_id: &str) -> Result<f64, TraderError> {
        let all = self.load(product_id)?;
        all.last().map(|c| c.close).ok_or(TraderError::NoData {
            product: product_id.to_string(),
        })
    }
}
