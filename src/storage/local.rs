//! Local filesystem storage implementation.
//!
//! Snapshots are CSV files written atomically (temp file, then rename), so a
//! crash mid-write never leaves a truncated checkpoint behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{OutputRow, PathsConfig};
use crate::storage::RowStorage;

/// CSV snapshot storage: one checkpoint file and one output file.
#[derive(Debug, Clone)]
pub struct CsvStorage {
    checkpoint_path: PathBuf,
    output_path: PathBuf,
}

impl CsvStorage {
    /// Create storage writing both snapshot copies.
    pub fn new(checkpoint_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_path: checkpoint_path.into(),
            output_path: output_path.into(),
        }
    }

    /// Create storage from configured file names under `root`.
    pub fn from_paths(paths: &PathsConfig, root: &Path) -> Self {
        Self::new(paths.checkpoint_path(root), paths.output_path(root))
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

#[async_trait]
impl RowStorage for CsvStorage {
    async fn write_snapshot(&self, rows: &[OutputRow]) -> Result<()> {
        write_csv(&self.checkpoint_path, &OutputRow::HEADERS, rows).await?;
        if self.output_path != self.checkpoint_path {
            write_csv(&self.output_path, &OutputRow::HEADERS, rows).await?;
        }
        log::debug!(
            "Snapshot of {} rows written to {}",
            rows.len(),
            self.output_path.display()
        );
        Ok(())
    }

    async fn load_rows(&self) -> Result<Vec<OutputRow>> {
        match read_csv(&self.checkpoint_path).await? {
            Some(rows) => Ok(rows),
            None => {
                log::info!(
                    "No checkpoint found at {}. Starting fresh.",
                    self.checkpoint_path.display()
                );
                Ok(Vec::new())
            }
        }
    }
}

/// Ensure parent directory exists.
async fn ensure_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Write bytes atomically (write to temp, then rename).
async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_dir(path).await?;

    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Read bytes, returning None if file doesn't exist.
async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}

/// Serialize rows as CSV under a fixed header and overwrite `path`.
///
/// The header is written even when `rows` is empty.
pub async fn write_csv<T: Serialize>(path: &Path, headers: &[&str], rows: &[T]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))?;
    write_bytes(path, &bytes).await
}

/// Read CSV rows with a header line, returning None if the file doesn't exist.
pub async fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Option<Vec<T>>> {
    let Some(bytes) = read_bytes(path).await? else {
        return Ok(None);
    };
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, csv::Error>>()?;
    Ok(Some(rows))
}

/// Count CSV records under the header, returning None if the file doesn't exist.
///
/// Quoted fields may span lines, so this is not a line count.
pub async fn count_rows<T: DeserializeOwned>(path: &Path) -> Result<Option<usize>> {
    Ok(read_csv::<T>(path).await?.map(|rows| rows.len()))
}
