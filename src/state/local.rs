//! Local file-based state storage backend.
//!
//! Each tracked object is stored as its own JSON document under
//! `{state_dir}/resources/{key}.json`, the same layout the S3 backend uses.
//! A commit only ever touches its own key's file and replaces it atomically
//! (temp file, sync, rename), so writers on different keys, in this process
//! or in another one, never lose each other's commits.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{LifecycleError, Result, StateError};

use super::store::StateStore;
use super::types::{ResourceState, StateDocument};

/// Default state directory name.
const STATE_DIR: &str = ".halldyll";

/// Directory under the state directory holding resource documents.
const RESOURCES_DIR: &str = "resources";

/// Extension of every resource document.
const DOCUMENT_EXTENSION: &str = "json";

/// Local file-based state store.
#[derive(Debug)]
pub struct LocalStateStore {
    /// Base directory for state files.
    base_dir: PathBuf,
    /// Directory holding one document per key.
    resources_dir: PathBuf,
}

impl LocalStateStore {
    /// Creates a local state store under `.halldyll/` in `dir`.
    #[must_use]
    pub fn in_project(dir: impl AsRef<Path>) -> Self {
        Self::with_base_dir(dir.as_ref().join(STATE_DIR))
    }

    /// Creates a new local state store with a custom base directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let resources_dir = base_dir.join(RESOURCES_DIR);

        Self {
            base_dir,
            resources_dir,
        }
    }

    /// Returns the state directory.
    #[must_use]
    pub fn state_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Maps a durable key to its document path.
    ///
    /// Keys are `/`-joined identity components; each becomes a directory
    /// level. Empty, `.` and `..` segments are rejected so a key can never
    /// escape the resources directory.
    fn document_path(&self, key: &str) -> Result<PathBuf> {
        let segments: Vec<&str> = key.split('/').collect();
        if segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains('\\'))
        {
            return Err(LifecycleError::State(StateError::local(format!(
                "Invalid state key '{key}'"
            ))));
        }

        let mut path = self.resources_dir.clone();
        if let Some((last, parents)) = segments.split_last() {
            path.extend(parents);
            path.push(format!("{last}.{DOCUMENT_EXTENSION}"));
        }
        Ok(path)
    }

    /// Reads one document, returning `None` if the file does not exist.
    async fn read_document(path: &Path) -> Result<Option<ResourceState>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("State file does not exist: {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(LifecycleError::State(StateError::Corrupted {
                    message: format!("Failed to read state file {}: {e}", path.display()),
                }));
            }
        };

        StateDocument::parse(&content).map(Some)
    }

    /// Writes one document atomically.
    ///
    /// The temp file name is unique per write, so concurrent writers never
    /// share a half-written file.
    async fn write_document(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                LifecycleError::State(StateError::local(format!(
                    "Failed to create state directory: {e}"
                )))
            })?;
        }

        let temp_path =
            path.with_extension(format!("{DOCUMENT_EXTENSION}.{}.tmp", Uuid::new_v4().simple()));

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            LifecycleError::State(StateError::local(format!(
                "Failed to create temp state file: {e}"
            )))
        })?;

        file.write_all(content.as_bytes()).await.map_err(|e| {
            LifecycleError::State(StateError::local(format!("Failed to write state file: {e}")))
        })?;

        file.sync_all().await.map_err(|e| {
            LifecycleError::State(StateError::local(format!("Failed to sync state file: {e}")))
        })?;

        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(LifecycleError::State(StateError::local(format!(
                "Failed to rename state file: {e}"
            ))));
        }

        Ok(())
    }

    /// Collects every document path below the resources directory.
    async fn document_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let mut pending = vec![self.resources_dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(LifecycleError::State(StateError::local(format!(
                        "Failed to list state directory {}: {e}",
                        dir.display()
                    ))));
                }
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext == DOCUMENT_EXTENSION) {
                    paths.push(path);
                }
            }
        }

        Ok(paths)
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self, key: &str) -> Result<Option<ResourceState>> {
        let path = self.document_path(key)?;
        Self::read_document(&path).await
    }

    async fn commit(&self, state: &ResourceState) -> Result<()> {
        let path = self.document_path(&state.key())?;
        let content = StateDocument::render(state)?;
        Self::write_document(&path, &content).await?;

        info!(
            "Committed {} state for {} to {}",
            state.completeness,
            state.key(),
            path.display()
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.document_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Removed state for {key}");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No local state to remove for {key}");
                Ok(())
            }
            Err(e) => Err(LifecycleError::State(StateError::local(format!(
                "Failed to remove state file: {e}"
            )))),
        }
    }

    async fn list(&self) -> Result<Vec<ResourceState>> {
        let mut states = Vec::new();
        for path in self.document_paths().await? {
            if let Some(state) = Self::read_document(&path).await? {
                states.push(state);
            }
        }

        states.sort_by_key(ResourceState::key);
        Ok(states)
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
