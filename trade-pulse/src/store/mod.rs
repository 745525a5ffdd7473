use crate::{
    demand::{AlignmentRow, JoinedRow},
    error::PulseError,
    feature::FeatureRow,
};
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Serialize, de::DeserializeOwned};
use smol_str::SmolStr;
use std::collections::BTreeMap;
use tracing::debug;

/// Series files under a directory, guarded by OS advisory locks.
pub mod file;

/// JSON Lines encoding of series files.
pub mod jsonl;

/// In-memory store with the same contract, for tests and embedding.
pub mod memory;

/// Flat CSV encoding of series files.
pub mod table;

pub use file::{FileSeriesStore, SeriesFormat};
pub use jsonl::JsonlSeriesStore;
pub use memory::MemorySeriesStore;
pub use table::CsvSeriesStore;

/// Name of a persisted series, eg/ `trades_metrics`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub struct SeriesName(pub SmolStr);

impl SeriesName {
    pub const fn new_static(name: &'static str) -> Self {
        Self(SmolStr::new_static(name))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for SeriesName {
    fn from(value: &str) -> Self {
        Self(SmolStr::new(value))
    }
}

pub const TRADES_METRICS: SeriesName = SeriesName::new_static("trades_metrics");
pub const BUSINESS_METRICS_WITH_DEMAND: SeriesName =
    SeriesName::new_static("business_metrics_with_demand");
pub const CORE_KPIS: SeriesName = SeriesName::new_static("core_kpis");
pub const GROWTH_METRICS: SeriesName = SeriesName::new_static("growth_metrics");
pub const RISK_METRICS: SeriesName = SeriesName::new_static("risk_metrics");
pub const DEMAND_ALIGNMENT: SeriesName = SeriesName::new_static("demand_alignment");

/// Row of a series keyed by `event_time`.
pub trait Keyed {
    fn key(&self) -> DateTime<Utc>;
}

impl Keyed for FeatureRow {
    fn key(&self) -> DateTime<Utc> {
        self.event_time()
    }
}

impl Keyed for JoinedRow {
    fn key(&self) -> DateTime<Utc> {
        self.event_time()
    }
}

impl Keyed for AlignmentRow {
    fn key(&self) -> DateTime<Utc> {
        self.event_time
    }
}

/// Merge `new_rows` into `existing`.
///
/// The result is strictly ascending by key with no duplicate keys. On collision the new row
/// replaces the persisted one, and within `new_rows` the later row wins. Merging the same
/// batch twice yields the same series as merging it once.
pub fn merge<T: Keyed>(existing: Vec<T>, new_rows: Vec<T>) -> Vec<T> {
    let mut merged: BTreeMap<DateTime<Utc>, T> = BTreeMap::new();
    for row in existing {
        merged.insert(row.key(), row);
    }

    let mut replaced = 0usize;
    for row in new_rows {
        if merged.insert(row.key(), row).is_some() {
            replaced += 1;
        }
    }

    if replaced > 0 {
        debug!(replaced, "resolved timestamp collisions in favour of new rows");
    }
    merged.into_values().collect()
}

/// Persisted, timestamp-keyed named series.
///
/// Implementations hold exclusive access to a series for the whole read-merge-write sequence
/// of [`SeriesStore::merge`], and a failed write leaves the previous state untouched.
pub trait SeriesStore {
    /// Read a series. A missing or empty series is an empty `Vec`, not an error.
    fn load<T>(&self, name: &SeriesName) -> Result<Vec<T>, PulseError>
    where
        T: DeserializeOwned;

    /// Merge `new_rows` into the persisted series (see [`merge`]) and persist the result.
    fn merge<T>(&self, name: &SeriesName, new_rows: Vec<T>) -> Result<Vec<T>, PulseError>
    where
        T: Keyed + Serialize + DeserializeOwned;

    /// Replace a series wholesale. Used for derived projections.
    fn replace<T>(&self, name: &SeriesName, rows: &[T]) -> Result<(), PulseError>
    where
        T: Serialize;
}
