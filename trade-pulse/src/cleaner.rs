//! Validation of raw snapshot records.
//!
//! Rows failing validation are dropped, never repaired. Rejections are recovered locally and
//! only surface as logs.

use crate::event::{
    AggressorSide, DemandPoint, RawBatch, RawDemandRecord, RawEvent, RawTradeRecord, coerce_bool,
    coerce_f64, coerce_timestamp,
};
use derive_more::Display;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Reason a raw row was dropped.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum RowRejection {
    #[display("undecodable record")]
    Undecodable,
    #[display("missing {_0}")]
    MissingField(&'static str),
    #[display("unparseable {_0}")]
    Unparseable(&'static str),
    #[display("non-positive price")]
    NonPositivePrice,
    #[display("non-positive quantity")]
    NonPositiveQuantity,
    #[display("non-finite revenue")]
    NonFiniteRevenue,
    #[display("negative demand interest")]
    NegativeInterest,
}

/// Outcome of a cleaning pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Cleaned<T> {
    pub rows: Vec<T>,
    pub rejected: BTreeMap<RowRejection, usize>,
}

impl<T> Cleaned<T> {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    fn from_results(
        results: impl IntoIterator<Item = Result<T, RowRejection>>,
        undecodable: usize,
    ) -> Self {
        let mut rows = Vec::new();
        let mut rejected = BTreeMap::new();
        if undecodable > 0 {
            rejected.insert(RowRejection::Undecodable, undecodable);
        }

        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(row) => rows.push(row),
                Err(reason) => {
                    debug!(row = index, %reason, "dropping malformed row");
                    *rejected.entry(reason).or_insert(0) += 1;
                }
            }
        }

        Self { rows, rejected }
    }
}

/// Validates and filters raw trade and demand records.
#[derive(Debug, Clone)]
pub struct EventCleaner {
    demand_column: String,
}

impl Default for EventCleaner {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_DEMAND_COLUMN)
    }
}

impl EventCleaner {
    pub fn new(demand_column: impl Into<String>) -> Self {
        Self {
            demand_column: demand_column.into(),
        }
    }

    /// Validate raw trades. Any row with a missing or uncoercible required field, or with
    /// `price <= 0` / `quantity <= 0`, is dropped entirely.
    pub fn clean_trades(&self, records: &[RawTradeRecord]) -> Cleaned<RawEvent> {
        self.clean_trade_batch(&RawBatch::new(records.to_vec()))
    }

    /// [`EventCleaner::clean_trades`] over a decoded snapshot, counting its undecodable rows
    /// as [`RowRejection::Undecodable`].
    pub fn clean_trade_batch(&self, batch: &RawBatch<RawTradeRecord>) -> Cleaned<RawEvent> {
        let cleaned = Cleaned::from_results(
            batch.records.iter().map(validate_trade),
            batch.undecodable,
        );

        info!(
            kept = cleaned.rows.len(),
            dropped = cleaned.rejected_total(),
            "cleaned raw trades"
        );
        cleaned
    }

    /// Validate raw demand records, reading interest from the configured column.
    ///
    /// The output is sorted ascending by timestamp, as the asof join requires.
    pub fn clean_demand(&self, records: &[RawDemandRecord]) -> Cleaned<DemandPoint> {
        self.clean_demand_batch(&RawBatch::new(records.to_vec()))
    }

    /// [`EventCleaner::clean_demand`] over a decoded snapshot.
    pub fn clean_demand_batch(&self, batch: &RawBatch<RawDemandRecord>) -> Cleaned<DemandPoint> {
        let mut cleaned = Cleaned::from_results(
            batch
                .records
                .iter()
                .map(|record| validate_demand(record, &self.demand_column)),
            batch.undecodable,
        );
        cleaned.rows.sort_by_key(|point| point.event_time);

        info!(
            column = %self.demand_column,
            kept = cleaned.rows.len(),
            dropped = cleaned.rejected_total(),
            "cleaned demand signal"
        );
        cleaned
    }
}

fn required<'a, T>(
    value: Option<&'a serde_json::Value>,
    field: &'static str,
    coerce: impl Fn(&'a serde_json::Value) -> Option<T>,
) -> Result<T, RowRejection> {
    match value {
        None | Some(serde_json::Value::Null) => Err(RowRejection::MissingField(field)),
        Some(value) => coerce(value).ok_or(RowRejection::Unparseable(field)),
    }
}

fn validate_trade(record: &RawTradeRecord) -> Result<RawEvent, RowRejection> {
    let event_time = required(record.event_time.as_ref(), "event_time", coerce_timestamp)?;
    let price = required(record.price.as_ref(), "price", coerce_f64)?;
    let quantity = required(record.quantity.as_ref(), "quantity", coerce_f64)?;
    let buyer_maker = required(record.buyer_maker.as_ref(), "buyer_maker", coerce_bool)?;

    if price <= 0.0 {
        return Err(RowRejection::NonPositivePrice);
    }
    if quantity <= 0.0 {
        return Err(RowRejection::NonPositiveQuantity);
    }

    let event = RawEvent::new(
        event_time,
        price,
        quantity,
        AggressorSide::from_buyer_maker(buyer_maker),
    );
    if !event.revenue.is_finite() {
        return Err(RowRejection::NonFiniteRevenue);
    }
    Ok(event)
}

fn validate_demand(record: &RawDemandRecord, column: &str) -> Result<DemandPoint, RowRejection> {
    let event_time = required(record.time_value(), "date", coerce_timestamp)?;
    let search_interest = required(record.column(column), "search_interest", coerce_f64)?;

    if search_interest < 0.0 {
        return Err(RowRejection::NegativeInterest);
    }

    Ok(DemandPoint {
        event_time,
        search_interest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn trade(
        time: serde_json::Value,
        price: serde_json::Value,
        qty: serde_json::Value,
    ) -> RawTradeRecord {
        RawTradeRecord {
            event_time: Some(time),
            price: Some(price),
            quantity: Some(qty),
            buyer_maker: Some(json!(false)),
            product: Some(json!("BTCUSDT")),
        }
    }

    #[test]
    fn test_negative_price_single_row_yields_empty() {
        let cleaner = EventCleaner::default();
        let record = trade(json!("2025-01-01 12:00:00"), json!(-5), json!(1));
        let cleaned = cleaner.clean_trades(&[record]);

        assert!(cleaned.rows.is_empty());
        assert_eq!(cleaned.rejected.get(&RowRejection::NonPositivePrice), Some(&1));
    }

    #[test]
    fn test_clean_trades_filters_invalid_rows() {
        struct TestCase {
            input: RawTradeRecord,
            expected: Result<(), RowRejection>,
        }

        let tests = vec![
            TestCase {
                // TC0: valid row w/ numeric strings
                input: trade(json!("2025-01-01 12:00:00"), json!("100.5"), json!("0.1")),
                expected: Ok(()),
            },
            TestCase {
                // TC1: zero quantity
                input: trade(json!("2025-01-01 12:00:00"), json!(100), json!(0)),
                expected: Err(RowRejection::NonPositiveQuantity),
            },
            TestCase {
                // TC2: non-numeric price
                input: trade(json!("2025-01-01 12:00:00"), json!("abc"), json!(1)),
                expected: Err(RowRejection::Unparseable("price")),
            },
            TestCase {
                // TC3: missing timestamp
                input: RawTradeRecord {
                    event_time: None,
                    ..trade(json!(0), json!(100), json!(1))
                },
                expected: Err(RowRejection::MissingField("event_time")),
            },
            TestCase {
                // TC4: null side indicator
                input: RawTradeRecord {
                    buyer_maker: Some(serde_json::Value::Null),
                    ..trade(json!("2025-01-01 12:00:00"), json!(100), json!(1))
                },
                expected: Err(RowRejection::MissingField("buyer_maker")),
            },
            TestCase {
                // TC5: finite inputs whose product overflows
                input: trade(json!("2025-01-01 12:00:00"), json!(1e200), json!("1e200")),
                expected: Err(RowRejection::NonFiniteRevenue),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = validate_trade(&test.input).map(|_| ());
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_clean_trades_keeps_order_and_counts() {
        let cleaner = EventCleaner::default();
        let records = vec![
            trade(json!(1735732800000_i64), json!(100), json!(1)),
            trade(json!(1735732801000_i64), json!(0), json!(1)),
            trade(json!(1735732802000_i64), json!(101), json!(2)),
        ];

        let cleaned = cleaner.clean_trades(&records);
        assert_eq!(cleaned.rows.len(), 2);
        assert_eq!(cleaned.rejected_total(), 1);
        assert_eq!(cleaned.rows[1].revenue, 202.0);
        assert_eq!(cleaned.rows[1].side, AggressorSide::Buy);
    }

    #[test]
    fn test_clean_demand_sorts_and_filters() {
        let cleaner = EventCleaner::new("Bitcoin");
        let records: Vec<RawDemandRecord> = serde_json::from_value(json!([
            {"date": "2025-01-03", "Bitcoin": 70},
            {"date": "2025-01-01", "Bitcoin": "55"},
            {"date": "2025-01-02", "Bitcoin": -1},
            {"date": null, "Bitcoin": 60},
            {"date": "2025-01-04"}
        ]))
        .unwrap();

        let cleaned = cleaner.clean_demand(&records);
        assert_eq!(
            cleaned.rows,
            vec![
                DemandPoint {
                    event_time: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                    search_interest: 55.0,
                },
                DemandPoint {
                    event_time: Utc.with_ymd_and_hms(2025, 1, 3, 0, 0, 0).unwrap(),
                    search_interest: 70.0,
                },
            ]
        );
        assert_eq!(cleaned.rejected_total(), 3);
    }

    #[test]
    fn test_clean_trade_batch_counts_undecodable_rows() {
        let batch = RawBatch {
            records: vec![
                trade(json!("2025-01-01 12:00:00"), json!(100), json!(1)),
                trade(json!("2025-01-01 12:00:01"), json!(1e300), json!(1e300)),
            ],
            undecodable: 2,
        };

        let cleaned = EventCleaner::default().clean_trade_batch(&batch);
        assert_eq!(cleaned.rows.len(), 1);
        assert!(cleaned.rows[0].revenue.is_finite());
        assert_eq!(cleaned.rejected.get(&RowRejection::Undecodable), Some(&2));
        assert_eq!(cleaned.rejected.get(&RowRejection::NonFiniteRevenue), Some(&1));
        assert_eq!(cleaned.rejected_total(), 3);
    }

    #[test]
    fn test_row_rejection_display() {
        assert_eq!(RowRejection::MissingField("price").to_string(), "missing price");
        assert_eq!(RowRejection::NonPositivePrice.to_string(), "non-positive price");
    }
}
