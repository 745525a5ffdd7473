use super::{Keyed, SeriesName, SeriesStore, merge};
use crate::error::PulseError;
use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;

/// Series held in memory as JSON values, so rows round-trip exactly as they would on disk.
///
/// A single mutex guards every series for the full read-merge-write sequence.
#[derive(Debug, Default)]
pub struct MemorySeriesStore {
    series: Mutex<HashMap<SeriesName, Vec<Value>>>,
}

impl MemorySeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &SeriesName) -> bool {
        self.series.lock().contains_key(name)
    }

    fn decode<T: DeserializeOwned>(values: &[Value]) -> Result<Vec<T>, PulseError> {
        values
            .iter()
            .map(|value| serde_json::from_value(value.clone()).map_err(PulseError::from))
            .collect()
    }

    fn encode<T: Serialize>(rows: &[T]) -> Result<Vec<Value>, PulseError> {
        rows.iter()
            .map(|row| serde_json::to_value(row).map_err(PulseError::from))
            .collect()
    }
}

impl SeriesStore for MemorySeriesStore {
    fn load<T>(&self, name: &SeriesName) -> Result<Vec<T>, PulseError>
    where
        T: DeserializeOwned,
    {
        match self.series.lock().get(name) {
            Some(values) => Self::decode(values),
            None => Ok(Vec::new()),
        }
    }

    fn merge<T>(&self, name: &SeriesName, new_rows: Vec<T>) -> Result<Vec<T>, PulseError>
    where
        T: Keyed + Serialize + DeserializeOwned,
    {
        let mut series = self.series.lock();
        let existing = match series.get(name) {
            Some(values) => Self::decode(values)?,
            None => Vec::new(),
        };

        let merged = merge(existing, new_rows);
        series.insert(name.clone(), Self::encode(&merged)?);
        Ok(merged)
    }

    fn replace<T>(&self, name: &SeriesName, rows: &[T]) -> Result<(), PulseError>
    where
        T: Serialize,
    {
        let encoded = Self::encode(rows)?;
        self.series.lock().insert(name.clone(), encoded);
        Ok(())
    }
}
