//! Core event types consumed by the pipeline.
//!
//! Raw records mirror the loosely typed snapshots written by the ingestion collaborator
//! (exchange trade dumps, search-interest exports). Validated events are strongly typed and
//! immutable once constructed.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Aggressor side of a trade, derived from the exchange "buyer is maker" flag.
///
/// When the buyer is the maker the seller crossed the spread, so the trade counts as sell
/// pressure. Otherwise the buyer was the taker and it counts as buy pressure.
#[derive(Debug, Copy, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum AggressorSide {
    Buy,
    Sell,
}

impl AggressorSide {
    pub fn from_buyer_maker(buyer_maker: bool) -> Self {
        if buyer_maker {
            AggressorSide::Sell
        } else {
            AggressorSide::Buy
        }
    }

    /// Convert to display string
    pub fn as_str(&self) -> &'static str {
        match self {
            AggressorSide::Buy => "Buy",
            AggressorSide::Sell => "Sell",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, AggressorSide::Buy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, AggressorSide::Sell)
    }
}

impl std::fmt::Display for AggressorSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw trade record as found in a snapshot, before any validation.
///
/// Every field is optional and loosely typed; coercion happens in the
/// [`EventCleaner`](crate::cleaner::EventCleaner).
///
/// ### Raw Payload Examples
///```json
/// {"event_time": "2025-01-01 12:00:01.250", "price": "97250.10", "quantity": 0.004, "buyer_maker": false}
/// {"time": 1735732801250, "price": "97250.10", "qty": "0.004", "isBuyerMaker": true}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawTradeRecord {
    #[serde(default, alias = "time", alias = "T")]
    pub event_time: Option<Value>,

    #[serde(default, alias = "p")]
    pub price: Option<Value>,

    #[serde(default, alias = "qty", alias = "q")]
    pub quantity: Option<Value>,

    #[serde(default, alias = "isBuyerMaker", alias = "m")]
    pub buyer_maker: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Value>,
}

/// Raw demand-signal record. The interest column name is configurable, so the record is kept
/// as an open map of columns.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RawDemandRecord(pub Map<String, Value>);

impl RawDemandRecord {
    /// Timestamp column, `date` first, then `event_time`.
    pub fn time_value(&self) -> Option<&Value> {
        self.0
            .get("date")
            .filter(|value| !value.is_null())
            .or_else(|| self.0.get("event_time"))
    }

    pub fn column(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

/// Records decoded from one raw snapshot.
///
/// Rows that are not JSON objects, or that cannot be read as `T`, are counted in
/// `undecodable` instead of failing the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBatch<T> {
    pub records: Vec<T>,
    pub undecodable: usize,
}

impl<T> RawBatch<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self {
            records,
            undecodable: 0,
        }
    }
}

impl<T> Default for RawBatch<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Validated trade event.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawEvent {
    pub event_time: DateTime<Utc>,
    pub price: f64,
    pub quantity: f64,
    pub side: AggressorSide,
    /// Always `price * quantity`.
    pub revenue: f64,
}

impl RawEvent {
    pub fn new(event_time: DateTime<Utc>, price: f64, quantity: f64, side: AggressorSide) -> Self {
        Self {
            event_time,
            price,
            quantity,
            side,
            revenue: price * quantity,
        }
    }
}

/// One observation of the external demand signal (daily or hourly granularity).
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct DemandPoint {
    pub event_time: DateTime<Utc>,
    pub search_interest: f64,
}

/// Coerce a JSON value into a finite `f64`. Numeric strings are accepted.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    number.is_finite().then_some(number)
}

/// Coerce a JSON value into a boolean. Accepts JSON bools, `"true"`/`"false"` in any case and
/// `0`/`1` as number or string.
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Coerce a JSON value into a UTC timestamp.
///
/// Integers are epoch milliseconds. Strings may be RFC 3339, epoch milliseconds, or naive
/// `YYYY-MM-DD[( |T)HH:MM:SS[.fff]]` which is read as UTC.
pub fn coerce_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => {
            let millis = number
                .as_i64()
                .or_else(|| number.as_f64().filter(|ms| ms.is_finite()).map(|ms| ms as i64))?;
            DateTime::from_timestamp_millis(millis)
        }
        Value::String(text) => parse_timestamp_str(text.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }

    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Some(time.with_timezone(&Utc));
    }

    if let Ok(millis) = text.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis);
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
