//! Read-only access to the task document and progress log.
//!
//! The agent edits these files while the loop runs, so every call re-reads
//! from disk. Nothing here locks or writes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use super::{next_pending, Task, TaskParser, TaskStats};

/// Reads and parses the PRD on demand.
#[derive(Debug, Clone)]
pub struct PrdReader {
    prd_path: PathBuf,
    progress_path: PathBuf,
    parser: TaskParser,
}

impl PrdReader {
    /// Create a reader for the given PRD and progress log paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the task pattern fails to compile.
    pub fn new(prd_path: impl Into<PathBuf>, progress_path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            prd_path: prd_path.into(),
            progress_path: progress_path.into(),
            parser: TaskParser::new()?,
        })
    }

    /// Path of the task document.
    #[must_use]
    pub fn prd_path(&self) -> &Path {
        &self.prd_path
    }

    /// Path of the progress log.
    #[must_use]
    pub fn progress_path(&self) -> &Path {
        &self.progress_path
    }

    /// Read the PRD, returning `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn read_prd(&self) -> Result<Option<String>> {
        read_optional(&self.prd_path).await
    }

    /// Read the progress log, or an empty string if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn read_progress(&self) -> Result<String> {
        Ok(read_optional(&self.progress_path)
            .await?
            .unwrap_or_default())
    }

    /// Parse tasks from already-read content.
    #[must_use]
    pub fn parse(&self, content: &str) -> Vec<Task> {
        self.parser.parse(content)
    }

    /// Read and parse the PRD. A missing PRD yields no tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn tasks(&self) -> Result<Vec<Task>> {
        let content = self.read_prd().await?.unwrap_or_default();
        Ok(self.parse(&content))
    }

    /// Current task statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn stats(&self) -> Result<TaskStats> {
        Ok(TaskStats::from_tasks(&self.tasks().await?))
    }

    /// The first pending task, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn next_task(&self) -> Result<Option<Task>> {
        let tasks = self.tasks().await?;
        Ok(next_pending(&tasks).cloned())
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} not found", path.display());
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use tempfile::TempDir;

    fn reader_in(dir: &TempDir) -> PrdReader {
        PrdReader::new(dir.path().join("PRD.md"), dir.path().join("progress.txt")).unwrap()
    }

    #[tokio::test]
    async fn test_missing_prd() {
        let dir = TempDir::new().unwrap();
        let reader = reader_in(&dir);

        assert!(reader.read_prd().await.unwrap().is_none());
        assert!(reader.tasks().await.unwrap().is_empty());
        assert_eq!(reader.stats().await.unwrap(), TaskStats::default());
        assert!(reader.next_task().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reads_tasks_and_stats() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("PRD.md"),
            "# PRD\n- [x] done\n- [~] doing\n- [ ] todo\n",
        )
        .unwrap();
        let reader = reader_in(&dir);

        let stats = reader.stats().await.unwrap();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.total, 3);

        let next = reader.next_task().await.unwrap().unwrap();
        assert_eq!(next.description, "todo");
        assert_eq!(next.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_sees_external_edits() {
        let dir = TempDir::new().unwrap();
        let prd = dir.path().join("PRD.md");
        std::fs::write(&prd, "- [ ] first\n- [ ] second\n").unwrap();
        let reader = reader_in(&dir);

        assert_eq!(reader.next_task().await.unwrap().unwrap().description, "first");
        std::fs::write(&prd, "- [x] first\n- [ ] second\n").unwrap();
        assert_eq!(reader.next_task().await.unwrap().unwrap().description, "second");
    }

    #[tokio::test]
    async fn test_progress_defaults_to_empty() {
        let dir = TempDir::new().unwrap();
        let reader = reader_in(&dir);
        assert_eq!(reader.read_progress().await.unwrap(), "");

        std::fs::write(dir.path().join("progress.txt"), "did a thing").unwrap();
        assert_eq!(reader.read_progress().await.unwrap(), "did a thing");
    }
}
