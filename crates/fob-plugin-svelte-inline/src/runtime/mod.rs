//! Filesystem runtime abstraction
//!
//! Every file the plugin touches (sub-component artifacts, `package.json`
//! lookups) goes through the [`Runtime`] trait. The native runtime is backed by
//! tokio; [`MemoryRuntime`] keeps everything in memory for tests and hosts
//! without a real filesystem.

#[cfg(not(target_family = "wasm"))]
mod native;

mod memory;

#[cfg(not(target_family = "wasm"))]
pub use native::NativeRuntime;

pub use memory::MemoryRuntime;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur during runtime operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Other runtime error
    #[error("Runtime error: {0}")]
    Other(String),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::FileNotFound(_))
    }
}

/// File metadata
#[derive(Debug, Clone, Copy)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: u64,
    /// Whether this is a directory
    pub is_dir: bool,
    /// Whether this is a file
    pub is_file: bool,
}

/// Platform runtime trait
///
/// `write_file` must be atomic with respect to concurrent readers: a reader
/// sees either the previous content or the complete new content, never a
/// partially written file.
#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    /// Read a file from the filesystem
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    /// Atomically create or replace a file
    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()>;

    /// Get file metadata
    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata>;

    /// Remove a file. Missing files yield [`RuntimeError::FileNotFound`].
    async fn remove_file(&self, path: &Path) -> RuntimeResult<()>;

    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;
}
