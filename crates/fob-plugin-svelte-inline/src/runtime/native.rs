//! Native runtime backed by `tokio::fs`

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

/// Filesystem runtime for native targets.
///
/// Writes go to a uniquely named sibling temp file which is then renamed over
/// the destination, so the destination is never observed half-written.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRuntime;

impl NativeRuntime {
    pub fn new() -> Self {
        Self
    }
}

fn map_io_error(path: &Path, action: &str, error: std::io::Error) -> RuntimeError {
    if error.kind() == ErrorKind::NotFound {
        RuntimeError::FileNotFound(path.to_path_buf())
    } else {
        RuntimeError::Io(format!("Failed to {} {}: {}", action, path.display(), error))
    }
}

/// `<dir>/.<file_name>.<uuid>.tmp`, next to the destination so the rename
/// never crosses filesystems.
fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()))
}

#[async_trait]
impl Runtime for NativeRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| map_io_error(path, "read", e))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        let temp = temp_path_for(path);

        tokio::fs::write(&temp, content)
            .await
            .map_err(|e| map_io_error(&temp, "write", e))?;

        if let Err(error) = tokio::fs::rename(&temp, path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(map_io_error(path, "replace", error));
        }

        Ok(())
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| map_io_error(path, "stat", e))?;

        Ok(FileMetadata {
            size: metadata.len(),
            is_dir: metadata.is_dir(),
            is_file: metadata.is_file(),
        })
    }

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| map_io_error(path, "remove", e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
