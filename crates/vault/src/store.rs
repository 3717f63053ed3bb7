//! Document storage backends.
//!
//! Paths handed to a [`DocumentStore`] are vault-relative strings such as
//! `Daily/2024-01-20.md`.  Date keys come from a remote sensor, so the
//! filesystem store refuses any path that would leave the vault root.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool>;
    async fn read(&self, path: &str) -> Result<String>;
    /// Replace the full content of an existing document.
    async fn write(&self, path: &str, content: &str) -> Result<()>;
    /// Create a new document.  Fails when one already exists at `path`.
    async fn create(&self, path: &str, content: &str) -> Result<()>;
    async fn create_dir_all(&self, path: &str) -> Result<()>;
}

// ── Filesystem ───────────────────────────────────────────────────────────────

/// Lexically resolve `.` and `..` without touching the filesystem, so paths
/// of documents that do not exist yet can still be validated.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, rel_path: &str) -> Result<PathBuf> {
        let root = normalize_path(&self.root);
        let full = normalize_path(&self.root.join(rel_path));
        if !full.starts_with(&root) || full == root {
            bail!("path escapes vault root: {rel_path}");
        }
        Ok(full)
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&full).await?)
    }

    async fn read(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .with_context(|| format!("reading {}", full.display()))
    }

    /// Crash-safe replace: the content goes to a `.tmp` sibling first and is
    /// renamed over the original, so readers never see a half-written note.
    async fn write(&self, path: &str, content: &str) -> Result<()> {
        let full = self.resolve(path)?;
        let tmp_path = {
            let filename = full
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "note.md".to_string());
            full.with_file_name(format!("{filename}.tmp"))
        };

        let write_result: Result<()> = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok(())
        }
        .await;

        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err.context(format!("writing {}", full.display())));
        }

        if let Err(err) = tokio::fs::rename(&tmp_path, &full).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(anyhow!(err).context(format!("replacing {}", full.display())));
        }
        Ok(())
    }

    async fn create(&self, path: &str, content: &str) -> Result<()> {
        let full = self.resolve(path)?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
            .with_context(|| format!("creating {}", full.display()))?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn create_dir_all(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        tokio::fs::create_dir_all(&full)
            .await
            .with_context(|| format!("creating folder {}", full.display()))
    }
}

// ── In-memory ────────────────────────────────────────────────────────────────

/// Map-backed store used by tests and offline runs.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<BTreeMap<String, String>>,
    folders: Mutex<BTreeSet<String>>,
    failing_prefixes: Mutex<Vec<String>>,
    writes: Mutex<usize>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, path: &str, content: &str) -> Self {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), content.to_string());
        self
    }

    /// Make every `create` under `prefix` fail, simulating a storage error.
    pub fn fail_creates_under(&self, prefix: &str) {
        self.failing_prefixes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prefix.to_string());
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_folder(&self, path: &str) -> bool {
        self.folders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
    }

    /// Number of successful `write` calls (creations excluded).
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        let documents = self
            .documents
            .lock()
            .map_err(|_| anyhow!("document map lock poisoned"))?;
        Ok(documents.contains_key(path))
    }

    async fn read(&self, path: &str) -> Result<String> {
        let documents = self
            .documents
            .lock()
            .map_err(|_| anyhow!("document map lock poisoned"))?;
        documents
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("no document at {path}"))
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|_| anyhow!("document map lock poisoned"))?;
        let Some(slot) = documents.get_mut(path) else {
            bail!("no document at {path}");
        };
        *slot = content.to_string();
        *self.writes.lock().map_err(|_| anyhow!("write counter lock poisoned"))? += 1;
        Ok(())
    }

    async fn create(&self, path: &str, content: &str) -> Result<()> {
        let failing = self
            .failing_prefixes
            .lock()
            .map_err(|_| anyhow!("failure list lock poisoned"))?
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()));
        if failing {
            bail!("storage refused to create {path}");
        }

        let mut documents = self
            .documents
            .lock()
            .map_err(|_| anyhow!("document map lock poisoned"))?;
        if documents.contains_key(path) {
            bail!("document already exists at {path}");
        }
        documents.insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn create_dir_all(&self, path: &str) -> Result<()> {
        let mut folders = self
            .folders
            .lock()
            .map_err(|_| anyhow!("folder set lock poisoned"))?;
        let mut prefix = String::new();
        for part in path.split('/').filter(|part| !part.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            folders.insert(prefix.clone());
        }
        Ok(())
    }
}
