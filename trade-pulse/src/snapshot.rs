//! Resolution and decoding of raw input snapshots.
//!
//! Snapshots are written by the ingestion jobs as `{prefix}_{%Y%m%d_%H%M%S}.csv` (header row),
//! `.json` (a JSON array of objects) or `.jsonl` (one object per line).

use crate::{
    config::PipelineConfig,
    error::PulseError,
    event::{RawBatch, RawDemandRecord, RawTradeRecord},
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::{debug, info};

/// Provider of the raw records for one pipeline run.
pub trait SnapshotSource {
    fn trades(&self) -> Result<RawBatch<RawTradeRecord>, PulseError>;
    fn demand(&self) -> Result<RawBatch<RawDemandRecord>, PulseError>;
}

/// Reads two caller-supplied snapshot files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitSnapshotSource {
    pub trades: PathBuf,
    pub demand: PathBuf,
}

impl ExplicitSnapshotSource {
    pub fn new(trades: impl Into<PathBuf>, demand: impl Into<PathBuf>) -> Self {
        Self {
            trades: trades.into(),
            demand: demand.into(),
        }
    }

    /// Resolve both snapshot paths from configuration. Explicit files take precedence over a
    /// scan of the raw directory.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PulseError> {
        let directory = DirectorySnapshotSource::from_config(config);

        let trades = match &config.trades_file {
            Some(path) => path.clone(),
            None => directory.latest(&directory.trades_prefix)?,
        };
        let demand = match &config.demand_file {
            Some(path) => path.clone(),
            None => directory.latest(&directory.demand_prefix)?,
        };

        info!(trades = %trades.display(), demand = %demand.display(), "resolved raw snapshots");
        Ok(Self { trades, demand })
    }
}

impl SnapshotSource for ExplicitSnapshotSource {
    fn trades(&self) -> Result<RawBatch<RawTradeRecord>, PulseError> {
        read_records(&self.trades)
    }

    fn demand(&self) -> Result<RawBatch<RawDemandRecord>, PulseError> {
        read_records(&self.demand)
    }
}

/// Picks the most recent `{prefix}_*.{csv,json,jsonl}` snapshot in a directory at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySnapshotSource {
    pub dir: PathBuf,
    pub trades_prefix: String,
    pub demand_prefix: String,
}

impl DirectorySnapshotSource {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            dir: config.raw_dir.clone(),
            trades_prefix: config.trades_prefix.clone(),
            demand_prefix: config.demand_prefix.clone(),
        }
    }

    /// Latest snapshot for `prefix`: greatest file stem, then most recently modified (so a
    /// `.csv` and `.json` pair with the same stamp resolves to the newer write).
    pub fn latest(&self, prefix: &str) -> Result<PathBuf, PulseError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(PulseError::MissingInput(format!(
                    "raw directory {} does not exist",
                    self.dir.display()
                )));
            }
            Err(error) => return Err(error.into()),
        };

        let stamp_prefix = format!("{prefix}_");
        let mut latest: Option<(String, SystemTime, PathBuf)> = None;

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let Some(stem) = snapshot_stem(&path, &stamp_prefix) else {
                continue;
            };
            if !entry.file_type()?.is_file() {
                continue;
            }

            let modified = entry.metadata()?.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            let candidate = (stem, modified, path);
            if latest
                .as_ref()
                .is_none_or(|current| (&candidate.0, candidate.1) > (&current.0, current.1))
            {
                latest = Some(candidate);
            }
        }

        match latest {
            Some((_, _, path)) => {
                debug!(prefix, path = %path.display(), "selected latest snapshot");
                Ok(path)
            }
            None => Err(PulseError::MissingInput(format!(
                "no {prefix}_*.{{csv,json,jsonl}} snapshot in {}",
                self.dir.display()
            ))),
        }
    }
}

impl SnapshotSource for DirectorySnapshotSource {
    fn trades(&self) -> Result<RawBatch<RawTradeRecord>, PulseError> {
        read_records(&self.latest(&self.trades_prefix)?)
    }

    fn demand(&self) -> Result<RawBatch<RawDemandRecord>, PulseError> {
        read_records(&self.latest(&self.demand_prefix)?)
    }
}

/// File stem of a `.csv`/`.json`/`.jsonl` snapshot whose name starts with `stamp_prefix`.
fn snapshot_stem(path: &Path, stamp_prefix: &str) -> Option<String> {
    let extension = path.extension()?.to_str()?;
    if !matches!(extension, "json" | "jsonl" | "csv") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.starts_with(stamp_prefix).then(|| stem.to_string())
}

/// Read a snapshot file, decoding `.csv` by header and anything else as JSON.
///
/// A missing, empty or entirely undecodable file is [`PulseError::MissingInput`]. Individual
/// rows that fail to decode are counted in [`RawBatch::undecodable`].
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<RawBatch<T>, PulseError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            return Err(PulseError::MissingInput(format!(
                "snapshot {} does not exist",
                path.display()
            )));
        }
        Err(error) => return Err(error.into()),
    };

    let is_csv = path.extension().is_some_and(|extension| extension == "csv");
    let batch = if is_csv {
        parse_csv_records(&contents)
    } else {
        parse_records(&contents)
    }
    .map_err(|reason| PulseError::MissingInput(format!("{}: {reason}", path.display())))?;

    debug!(
        path = %path.display(),
        records = batch.records.len(),
        undecodable = batch.undecodable,
        "read raw snapshot"
    );
    Ok(batch)
}

/// Decode either a JSON array of records or JSON Lines.
pub fn parse_records<T: DeserializeOwned>(contents: &str) -> Result<RawBatch<T>, String> {
    let trimmed = contents.trim_start();
    if trimmed.is_empty() {
        return Err("snapshot is empty".to_string());
    }

    if trimmed.starts_with('[') {
        let values: Vec<Value> = serde_json::from_str(trimmed).map_err(|e| e.to_string())?;
        let mut batch = RawBatch::default();
        for (index, value) in values.into_iter().enumerate() {
            decode_row(&mut batch, index, serde_json::from_value(value));
        }
        return Ok(batch);
    }

    let mut batch = RawBatch::default();
    let mut json_lines = 0usize;
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => {
                json_lines += 1;
                decode_row(&mut batch, index, serde_json::from_value(value));
            }
            Err(error) => {
                debug!(line = index + 1, %error, "skipping malformed snapshot line");
                batch.undecodable += 1;
            }
        }
    }

    if json_lines == 0 {
        return Err("no line is a JSON record".to_string());
    }
    Ok(batch)
}

/// Decode a CSV snapshot with a header row. Empty cells read as missing values and every
/// other cell as a string, left to the cleaner's coercion.
pub fn parse_csv_records<T: DeserializeOwned>(contents: &str) -> Result<RawBatch<T>, String> {
    if contents.trim().is_empty() {
        return Err("snapshot is empty".to_string());
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());
    let headers = reader.headers().map_err(|error| error.to_string())?.clone();

    let mut batch = RawBatch::default();
    for (index, record) in reader.records().enumerate() {
        match record {
            Ok(record) => {
                let row: Map<String, Value> = headers
                    .iter()
                    .zip(record.iter())
                    .map(|(header, cell)| {
                        let value = match cell {
                            "" => Value::Null,
                            cell => Value::String(cell.to_string()),
                        };
                        (header.to_string(), value)
                    })
                    .collect();
                decode_row(&mut batch, index, serde_json::from_value(Value::Object(row)));
            }
            Err(error) => {
                debug!(row = index + 1, %error, "skipping malformed csv row");
                batch.undecodable += 1;
            }
        }
    }
    Ok(batch)
}

fn decode_row<T>(batch: &mut RawBatch<T>, index: usize, decoded: Result<T, serde_json::Error>) {
    match decoded {
        Ok(record) => batch.records.push(record),
        Err(error) => {
            debug!(row = index + 1, %error, "skipping undecodable snapshot record");
            batch.undecodable += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::coerce_f64;

    #[test]
    fn test_parse_records_formats() {
        struct TestCase {
            input: &'static str,
            expected: Option<(usize, usize)>,
        }

        let tests = vec![
            TestCase {
                // TC0: JSON array
                input: r#"[{"price": 1}, {"price": "2"}]"#,
                expected: Some((2, 0)),
            },
            TestCase {
                // TC1: JSON Lines with blank lines
                input: "{\"price\": 1}\n\n{\"p\": 2}\n",
                expected: Some((2, 0)),
            },
            TestCase {
                // TC2: a badly typed row and a truncated line are dropped, not fatal
                input: concat!(
                    "{\"price\": 1, \"product\": 7}\n",
                    "{\"price\": 2, \"event_time\": {}}\n",
                    "{\"price\": 3}\n",
                    "42\n",
                    "{\"price\": 4, \"qty\"",
                ),
                expected: Some((3, 2)),
            },
            TestCase {
                // TC3: array element that is not an object
                input: r#"[{"price": 1}, "oops", {"price": 2}]"#,
                expected: Some((2, 1)),
            },
            TestCase {
                // TC4: empty
                input: "  \n",
                expected: None,
            },
            TestCase {
                // TC5: not JSON records
                input: "event_time,price\n1,2\n",
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = parse_records::<RawTradeRecord>(test.input)
                .ok()
                .map(|batch| (batch.records.len(), batch.undecodable));
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_read_records_missing_file_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_records::<RawTradeRecord>(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(PulseError::MissingInput(_))));
        assert!(result.unwrap_err().is_fatal());
    }

    #[test]
    fn test_directory_source_picks_latest_stamp() {
        let dir = tempfile::tempdir().unwrap();
        for (name, price) in [
            ("binance_trades_20250101_120000.json", 1),
            ("binance_trades_20250102_090000.jsonl", 3),
            ("binance_trades_20241231_235959.json", 2),
            ("google_trends_20250301_000000.json", 9),
            ("binance_trades_notes.txt", 0),
        ] {
            fs::write(dir.path().join(name), format!("[{{\"price\": {price}}}]")).unwrap();
        }

        let source = DirectorySnapshotSource {
            dir: dir.path().to_path_buf(),
            trades_prefix: "binance_trades".to_string(),
            demand_prefix: "google_trends".to_string(),
        };

        let latest = source.latest("binance_trades").unwrap();
        assert!(latest.ends_with("binance_trades_20250102_090000.jsonl"));

        let trades = source.trades().unwrap();
        assert_eq!(trades.records.len(), 1);
        assert_eq!(trades.records[0].price.as_ref().and_then(coerce_f64), Some(3.0));
        assert_eq!(source.demand().unwrap().records.len(), 1);
    }

    #[test]
    fn test_directory_source_without_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySnapshotSource {
            dir: dir.path().to_path_buf(),
            trades_prefix: "binance_trades".to_string(),
            demand_prefix: "google_trends".to_string(),
        };

        assert!(matches!(source.trades(), Err(PulseError::MissingInput(_))));

        let source = DirectorySnapshotSource {
            dir: dir.path().join("missing"),
            ..source
        };
        assert!(matches!(source.demand(), Err(PulseError::MissingInput(_))));
    }

    #[test]
    fn test_explicit_source_from_config_prefers_explicit_files() {
        let dir = tempfile::tempdir().unwrap();
        let trades = dir.path().join("trades.jsonl");
        fs::write(&trades, "{\"price\": 1}\n").unwrap();
        fs::write(dir.path().join("google_trends_20250101_000000.json"), "[]").unwrap();

        let config = PipelineConfig {
            raw_dir: dir.path().to_path_buf(),
            trades_file: Some(trades.clone()),
            ..PipelineConfig::default()
        };

        let source = ExplicitSnapshotSource::from_config(&config).unwrap();
        assert_eq!(source.trades, trades);
        assert!(source.demand.ends_with("google_trends_20250101_000000.json"));
        assert_eq!(source.trades().unwrap().records.len(), 1);
        assert!(source.demand().unwrap().records.is_empty());
    }

    #[test]
    fn test_parse_csv_records() {
        let contents = "\
event_time,product,price,quantity,revenue,buyer_maker
2025-01-01 12:00:01.250000,BTCUSDT,97250.1,0.004,389.0004,False
2025-01-01 12:00:02.000000,BTCUSDT,,0.5,,True
2025-01-01 12:00:03.000000,BTCUSDT,97251.0
";
        let batch = parse_csv_records::<RawTradeRecord>(contents).unwrap();

        // ragged row
        assert_eq!(batch.undecodable, 1);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].price.as_ref().and_then(coerce_f64), Some(97250.1));
        assert_eq!(batch.records[0].buyer_maker, Some(Value::String("False".to_string())));
        assert_eq!(batch.records[1].price, None);

        assert!(parse_csv_records::<RawTradeRecord>("").is_err());
    }

    #[test]
    fn test_directory_source_reads_csv_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("google_trends_20250101_000000.csv"),
            "date,search_interest\n2025-01-01,55\n2025-01-02,61\n",
        )
        .unwrap();
        fs::write(dir.path().join("google_trends_20241231_000000.json"), "[]").unwrap();

        let source = DirectorySnapshotSource {
            dir: dir.path().to_path_buf(),
            trades_prefix: "binance_trades".to_string(),
            demand_prefix: "google_trends".to_string(),
        };

        let demand = source.demand().unwrap();
        assert_eq!(demand.records.len(), 2);
        assert_eq!(
            demand.records[1].column("search_interest"),
            Some(&Value::String("61".to_string()))
        );
    }
}
