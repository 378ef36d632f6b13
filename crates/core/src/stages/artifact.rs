//! Artifact persistence for the save stage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::types::StageError;

/// Persists the markdown produced by a run.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write the artifact for `task_id`, returning its path.
    ///
    /// Must never overwrite an existing artifact.
    async fn save(&self, task_id: &str, markdown: &str) -> Result<PathBuf, StageError>;

    /// Where the artifact for `task_id` lives (whether or not it exists).
    fn artifact_path(&self, task_id: &str) -> Result<PathBuf, StageError>;
}

/// Filesystem artifact store writing `output_<task_id>.md` files.
pub struct FsArtifactStore {
    output_dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Check that a task id is safe to embed in a file name.
pub fn validate_task_id(task_id: &str) -> Result<(), StageError> {
    let valid = !task_id.is_empty()
        && task_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StageError::InvalidTaskId(task_id.to_string()))
    }
}

/// File name of the artifact for a task.
pub fn artifact_file_name(task_id: &str) -> String {
    format!("output_{}.md", task_id)
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn save(&self, task_id: &str, markdown: &str) -> Result<PathBuf, StageError> {
        let final_path = self.artifact_path(task_id)?;

        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| StageError::io(&self.output_dir, e))?;

        // Write under a private name first so a partial file is never visible
        // under the artifact name.
        let temp_path = self.output_dir.join(format!(
            ".{}.{}.tmp",
            artifact_file_name(task_id),
            uuid::Uuid::new_v4().simple()
        ));

        let written = write_new(&temp_path, markdown.as_bytes()).await;
        let linked = match written {
            Ok(()) => match fs::hard_link(&temp_path, &final_path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    same_content(&final_path, markdown.as_bytes(), e).await
                }
                Err(e) => Err(StageError::io(&final_path, e)),
            },
            Err(e) => Err(e),
        };

        if let Err(e) = fs::remove_file(&temp_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove temp file {}: {}", temp_path.display(), e);
            }
        }

        linked?;
        debug!("Saved artifact {}", final_path.display());
        Ok(final_path)
    }

    fn artifact_path(&self, task_id: &str) -> Result<PathBuf, StageError> {
        validate_task_id(task_id)?;
        Ok(self.output_dir.join(artifact_file_name(task_id)))
    }
}

/// A redelivered job may save the same artifact again. Identical content
/// counts as saved; anything else keeps the original `exists` error.
async fn same_content(
    path: &Path,
    contents: &[u8],
    exists: std::io::Error,
) -> Result<(), StageError> {
    match fs::read(path).await {
        Ok(existing) if existing == contents => {
            debug!("Artifact {} already saved with same content", path.display());
            Ok(())
        }
        _ => Err(StageError::io(path, exists)),
    }
}

async fn write_new(path: &Path, contents: &[u8]) -> Result<(), StageError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| StageError::io(path, e))?;
    file.write_all(contents)
        .await
        .map_err(|e| StageError::io(path, e))?;
    file.sync_all().await.map_err(|e| StageError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_save_creates_nested_dirs() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("a").join("b");
        let store = FsArtifactStore::new(&out);

        let path = store.save("task_1", "# Hello").await.unwrap();
        assert_eq!(path, out.join("output_task_1.md"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Hello");
        assert_eq!(dir_entries(&out), vec!["output_task_1.md"]);
    }

    #[tokio::test]
    async fn test_save_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let store = FsArtifactStore::new(temp.path());

        store.save("task_2", "first").await.unwrap();
        let result = store.save("task_2", "second").await;
        assert!(matches!(result, Err(StageError::Io { .. })));

        let path = temp.path().join("output_task_2.md");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "first");
        // The temp file of the failed attempt is cleaned up
        assert_eq!(dir_entries(temp.path()), vec!["output_task_2.md"]);
    }

    #[tokio::test]
    async fn test_saving_same_content_again_succeeds() {
        let temp = TempDir::new().unwrap();
        let store = FsArtifactStore::new(temp.path());

        let first = store.save("task_4", "Page1Page2").await.unwrap();
        let second = store.save("task_4", "Page1Page2").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "Page1Page2");
        assert_eq!(dir_entries(temp.path()), vec!["output_task_4.md"]);
    }

    #[tokio::test]
    async fn test_rejects_unsafe_task_ids() {
        let temp = TempDir::new().unwrap();
        let store = FsArtifactStore::new(temp.path());

        for bad in ["", "../escape", "a/b", "name.md", "sp ace"] {
            let result = store.save(bad, "x").await;
            assert!(
                matches!(result, Err(StageError::InvalidTaskId(_))),
                "accepted {:?}",
                bad
            );
        }
        assert!(dir_entries(temp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_unwritable_output_dir_is_io_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("not_a_dir");
        std::fs::write(&blocker, "file").unwrap();

        let store = FsArtifactStore::new(&blocker);
        let result = store.save("task_3", "x").await;
        assert!(matches!(result, Err(StageError::Io { .. })));
    }

    #[test]
    fn test_validate_task_id() {
        assert!(validate_task_id("task_0123abcd").is_ok());
        assert!(validate_task_id("task-20240101_120000").is_ok());
        assert!(validate_task_id("..").is_err());
    }
}
