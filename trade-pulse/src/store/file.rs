use super::{Keyed, SeriesName, SeriesStore, merge};
use crate::error::PulseError;
use serde::{Serialize, de::DeserializeOwned};
use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, ErrorKind, Write},
    marker::PhantomData,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// On-disk encoding of a whole series file.
pub trait SeriesFormat {
    /// File extension of `<name>.<EXTENSION>`, without the dot.
    const EXTENSION: &'static str;

    /// Decode every row of a series file. Empty contents are an empty series.
    fn decode<T>(contents: &str) -> Result<Vec<T>, PulseError>
    where
        T: DeserializeOwned;

    fn encode<T, W>(rows: &[T], writer: W) -> Result<(), PulseError>
    where
        T: Serialize,
        W: Write;
}

/// Series persisted as `<dir>/<name>.<ext>` in the encoding of `Format`.
///
/// Writes go to `<name>.<ext>.tmp` and are renamed over the target, so readers only ever see
/// a complete file. `merge` and `replace` hold an exclusive advisory lock on `<name>.lock`,
/// which serialises concurrent runs in this or any other process.
#[derive(Debug)]
pub struct FileSeriesStore<Format> {
    dir: PathBuf,
    format: PhantomData<Format>,
}

impl<Format> Clone for FileSeriesStore<Format> {
    fn clone(&self) -> Self {
        Self::new(self.dir.clone())
    }
}

impl<Format> FileSeriesStore<Format> {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            format: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock(&self, name: &SeriesName) -> Result<SeriesLock, PulseError> {
        fs::create_dir_all(&self.dir)?;
        SeriesLock::acquire(&self.dir.join(format!("{name}.lock")))
    }
}

impl<Format> FileSeriesStore<Format>
where
    Format: SeriesFormat,
{
    pub fn path(&self, name: &SeriesName) -> PathBuf {
        self.dir.join(format!("{name}.{}", Format::EXTENSION))
    }

    fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PulseError> {
        match fs::read_to_string(path) {
            Ok(contents) => Format::decode(&contents),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(error) => Err(error.into()),
        }
    }

    fn write_rows_atomic<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), PulseError> {
        let temp_path = path.with_extension(format!("{}.tmp", Format::EXTENSION));

        let result = (|| {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            Format::encode(rows, &mut writer)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            drop(writer);

            fs::rename(&temp_path, path)?;
            Ok::<(), PulseError>(())
        })();

        if result.is_err() {
            if let Err(error) = fs::remove_file(&temp_path) {
                if error.kind() != ErrorKind::NotFound {
                    warn!(path = %temp_path.display(), %error, "failed to remove temp file");
                }
            }
        }
        result
    }
}

impl<Format> SeriesStore for FileSeriesStore<Format>
where
    Format: SeriesFormat,
{
    fn load<T>(&self, name: &SeriesName) -> Result<Vec<T>, PulseError>
    where
        T: DeserializeOwned,
    {
        let rows = Self::read_rows(&self.path(name))?;
        debug!(series = %name, rows = rows.len(), "loaded series");
        Ok(rows)
    }

    fn merge<T>(&self, name: &SeriesName, new_rows: Vec<T>) -> Result<Vec<T>, PulseError>
    where
        T: Keyed + Serialize + DeserializeOwned,
    {
        let _lock = self.lock(name)?;
        let path = self.path(name);

        let existing: Vec<T> = Self::read_rows(&path)?;
        let (existing_len, new_len) = (existing.len(), new_rows.len());
        let merged = merge(existing, new_rows);
        Self::write_rows_atomic(&path, &merged)?;

        info!(
            series = %name,
            existing = existing_len,
            new = new_len,
            merged = merged.len(),
            "merged series"
        );
        Ok(merged)
    }

    fn replace<T>(&self, name: &SeriesName, rows: &[T]) -> Result<(), PulseError>
    where
        T: Serialize,
    {
        let _lock = self.lock(name)?;
        Self::write_rows_atomic(&self.path(name), rows)?;
        debug!(series = %name, rows = rows.len(), "replaced series");
        Ok(())
    }
}

/// Exclusive advisory lock on a series, released on drop or when the process exits.
#[derive(Debug)]
struct SeriesLock {
    file: File,
}

impl SeriesLock {
    fn acquire(path: &Path) -> Result<Self, PulseError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock()?;
        Ok(Self { file })
    }
}

impl Drop for SeriesLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
