use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::QuizError;
use crate::models::HistoryEntry;

// Import logging macros
use crate::{log_service_start, log_service_success};

/// Append-only record of answered questions, persisted as one JSON array.
///
/// Every append rewrites the whole file. Appends inside this process are
/// serialized by the caller's lock; two processes sharing a file are
/// last-writer-wins.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    /// Read the log at `path`, or start empty if the file does not exist
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        log_service_start!("history_log", "load");

        if !path.exists() {
            debug!(path = %path.display(), "No history file yet, starting empty");
            return Ok(Self {
                path,
                entries: Vec::new(),
            });
        }

        let content = std::fs::read_to_string(&path).map_err(QuizError::HistoryIo)?;
        let entries: Vec<HistoryEntry> = serde_json::from_str(&content).map_err(|source| {
            QuizError::MalformedPersistedHistory {
                path: path.clone(),
                source,
            }
        })?;

        log_service_success!(
            "history_log",
            "load",
            format!("{} entries from {}", entries.len(), path.display())
        );

        Ok(Self { path, entries })
    }

    /// Add `entry` at the end and rewrite the file with the full sequence
    pub async fn append(&mut self, entry: HistoryEntry) -> Result<()> {
        self.entries.push(entry);

        if let Err(e) = self.persist().await {
            // keep memory and disk in step
            self.entries.pop();
            return Err(e);
        }

        log_service_success!(
            "history_log",
            "append",
            format!("{} entries persisted", self.entries.len())
        );
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(QuizError::HistoryIo)?;
        }

        let tmp_path = temp_path_for(&self.path);
        tokio::fs::write(&tmp_path, json).await.map_err(QuizError::HistoryIo)?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(QuizError::HistoryIo)?;

        Ok(())
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            question_text: format!("Question {}", n),
            user_answer: "A".to_string(),
            correct_answer: "B".to_string(),
            explanation: format!("Because of reason {}", n),
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::load(dir.path().join("quiz_log.json")).unwrap();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiz_log.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = HistoryLog::load(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QuizError>(),
            Some(QuizError::MalformedPersistedHistory { .. })
        ));
    }

    #[tokio::test]
    async fn test_append_survives_reload_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiz_log.json");

        let mut log = HistoryLog::load(&path).unwrap();
        log.append(entry(1)).await.unwrap();
        log.append(entry(2)).await.unwrap();

        let mut reloaded = HistoryLog::load(&path).unwrap();
        assert_eq!(reloaded.entries(), &[entry(1), entry(2)]);

        reloaded.append(entry(3)).await.unwrap();
        let again = HistoryLog::load(&path).unwrap();
        assert_eq!(again.len(), 3);
        assert_eq!(again.entries().last(), Some(&entry(3)));
        assert_eq!(&again.entries()[..2], &[entry(1), entry(2)]);
    }

    #[tokio::test]
    async fn test_file_is_pretty_printed_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("quiz_log.json");

        let mut log = HistoryLog::load(&path).unwrap();
        log.append(entry(1)).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("[\n"));
        assert!(content.contains("\"your_answer\": \"A\""));
        assert!(!dir.path().join("nested").join("quiz_log.json.tmp").exists());
    }
}
