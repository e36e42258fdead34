//! In-memory runtime for tests and hosts without a real filesystem

use async_trait::async_trait;
use dashmap::DashMap;
use path_clean::PathClean;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

/// Runtime that keeps every file in a concurrent in-memory map.
///
/// Paths are cleaned before lookup, so `/src/./App.svelte` and
/// `/src/App.svelte` address the same entry. Cloning shares the same files.
#[derive(Debug, Clone, Default)]
pub struct MemoryRuntime {
    files: Arc<DashMap<PathBuf, Vec<u8>>>,
    read_only: Arc<AtomicBool>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file, bypassing the read-only switch.
    pub fn insert(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.files.insert(path.as_ref().clean(), content.into());
    }

    /// Read a file as UTF-8, if present.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files
            .get(&path.as_ref().clean())
            .map(|entry| String::from_utf8_lossy(entry.value()).into_owned())
    }

    /// Make every subsequent write fail with an I/O error.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.files
            .iter()
            .any(|entry| entry.key().starts_with(path) && entry.key().as_path() != path)
    }
}

#[async_trait]
impl Runtime for MemoryRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        self.files
            .get(&path.clean())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RuntimeError::FileNotFound(path.to_path_buf()))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(RuntimeError::Io(format!(
                "Failed to write {}: read-only filesystem",
                path.display()
            )));
        }
        self.files.insert(path.clean(), content.to_vec());
        Ok(())
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let path = path.clean();
        if let Some(entry) = self.files.get(&path) {
            return Ok(FileMetadata {
                size: entry.value().len() as u64,
                is_dir: false,
                is_file: true,
            });
        }
        if self.is_dir(&path) {
            return Ok(FileMetadata {
                size: 0,
                is_dir: true,
                is_file: false,
            });
        }
        Err(RuntimeError::FileNotFound(path))
    }

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
        self.files
            .remove(&path.clean())
            .map(|_| ())
            .ok_or_else(|| RuntimeError::FileNotFound(path.to_path_buf()))
    }

    fn exists(&self, path: &Path) -> bool {
        let path = path.clean();
        self.files.contains_key(&path) || self.is_dir(&path)
    }
}
