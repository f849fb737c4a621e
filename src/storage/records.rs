//! Append-only text files for collected records

use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;
use crate::models::Record;

/// Append one line (newline added) to `path`, creating the file if needed
///
/// There is no retry: a failed open or write is returned to the caller.
pub async fn append_line(path: &Path, line: &str) -> Result<(), StorageError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|source| StorageError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let mut buffer = String::with_capacity(line.len() + 1);
    buffer.push_str(line);
    buffer.push('\n');

    file.write_all(buffer.as_bytes())
        .await
        .map_err(|source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    file.flush().await.map_err(|source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Store one record as a CSV line in the data file
pub async fn store_record(path: &Path, record: &Record) -> Result<(), StorageError> {
    append_line(path, &record.to_string()).await
}
