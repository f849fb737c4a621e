//! Persistent list of collection labels
//!
//! Each label is stored on its own line as `<index>;<label>`, where the
//! index is the number of labels stored before it.

use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::storage::records::append_line;

/// Labels may contain lowercase ASCII letters, digits, `_` and `-`
pub fn is_valid_message(message: &str) -> bool {
    !message.is_empty()
        && message
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

/// Drop a leading `<digits>;` prefix if present
fn strip_index(line: &str) -> &str {
    let digits = line.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits > 0 && line.as_bytes().get(digits) == Some(&b';') {
        &line[digits + 1..]
    } else {
        line
    }
}

#[derive(Debug, Clone)]
pub struct MessageStore {
    path: PathBuf,
}

impl MessageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        MessageStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load stored labels in insertion order
    ///
    /// A missing or unreadable file yields an empty list.
    pub async fn load(&self) -> Vec<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents
                .lines()
                .map(|line| strip_index(line).to_string())
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("Failed to read {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// Validate and append a label, returning its index
    pub async fn add(&self, message: &str) -> Result<usize, StorageError> {
        if !is_valid_message(message) {
            return Err(StorageError::InvalidMessage(message.to_string()));
        }

        let index = self.load().await.len();
        append_line(&self.path, &format!("{};{}", index, message)).await?;
        info!("Stored message {} as #{}", message, index);
        Ok(index)
    }

    /// Most recently stored label
    pub async fn last(&self) -> Option<String> {
        self.load().await.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_message_validation() {
        assert!(is_valid_message("walking"));
        assert!(is_valid_message("bus_ride-2"));
        assert!(is_valid_message("0"));
        assert!(!is_valid_message(""));
        assert!(!is_valid_message("Walking"));
        assert!(!is_valid_message("in car"));
        assert!(!is_valid_message("a,b"));
        assert!(!is_valid_message("cafe\u{301}"));
        assert!(!is_valid_message("line\n"));
    }

    #[test]
    fn test_strip_index() {
        assert_eq!(strip_index("0;walking"), "walking");
        assert_eq!(strip_index("12;a;b"), "a;b");
        assert_eq!(strip_index("walking"), "walking");
        assert_eq!(strip_index(";walking"), ";walking");
        assert_eq!(strip_index("12walking"), "12walking");
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = MessageStore::new(dir.path().join("messages.csv"));
        assert!(store.load().await.is_empty());
        assert_eq!(store.last().await, None);
    }

    #[tokio::test]
    async fn test_add_and_load() {
        let dir = TempDir::new().unwrap();
        let store = MessageStore::new(dir.path().join("messages.csv"));

        assert_eq!(store.add("sitting").await.unwrap(), 0);
        assert_eq!(store.add("walking").await.unwrap(), 1);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, "0;sitting\n1;walking\n");
        assert_eq!(store.load().await, vec!["sitting", "walking"]);
        assert_eq!(store.last().await.as_deref(), Some("walking"));
    }

    #[tokio::test]
    async fn test_invalid_message_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let store = MessageStore::new(dir.path().join("messages.csv"));

        let err = store.add("Not Valid").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidMessage(_)));
        assert!(!store.path().exists());
    }
}
