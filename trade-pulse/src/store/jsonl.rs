use super::file::{FileSeriesStore, SeriesFormat};
use crate::error::PulseError;
use serde::{Serialize, de::DeserializeOwned};
use std::io::Write;

/// Series persisted as `<dir>/<name>.jsonl`, one row per line.
pub type JsonlSeriesStore = FileSeriesStore<JsonLines>;

/// One JSON object per line. Blank lines are skipped on read.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLines;

impl SeriesFormat for JsonLines {
    const EXTENSION: &'static str = "jsonl";

    fn decode<T>(contents: &str) -> Result<Vec<T>, PulseError>
    where
        T: DeserializeOwned,
    {
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(PulseError::from))
            .collect()
    }

    fn encode<T, W>(rows: &[T], mut writer: W) -> Result<(), PulseError>
    where
        T: Serialize,
        W: Write,
    {
        for row in rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Keyed, SeriesStore, TRADES_METRICS};
    use chrono::{DateTime, TimeZone, Utc};
    use serde::Deserialize;
    use std::fs;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        event_time: DateTime<Utc>,
        value: f64,
    }

    impl Keyed for Row {
        fn key(&self) -> DateTime<Utc> {
            self.event_time
        }
    }

    #[test]
    fn test_jsonl_decode_skips_blank_lines() {
        let rows: Vec<Row> = JsonLines::decode(concat!(
            "{\"event_time\":\"2025-01-01T00:00:00Z\",\"value\":1.5}\n",
            "\n",
            "   \n",
            "{\"event_time\":\"2025-01-01T00:01:00Z\",\"value\":2}\n",
        ))
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].value, 2.0);
    }

    #[test]
    fn test_corrupt_series_fails_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlSeriesStore::new(dir.path());
        fs::write(store.path(&TRADES_METRICS), "{\"event_time\":\n").unwrap();

        let row = Row {
            event_time: Utc.timestamp_opt(1, 0).unwrap(),
            value: 1.0,
        };
        let result = store.merge(&TRADES_METRICS, vec![row]);
        assert!(matches!(result, Err(PulseError::Serde(_))));
        assert_eq!(
            fs::read_to_string(store.path(&TRADES_METRICS)).unwrap(),
            "{\"event_time\":\n"
        );
    }
}
