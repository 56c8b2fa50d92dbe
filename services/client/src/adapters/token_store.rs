//! services/client/src/adapters/token_store.rs
//!
//! A file-backed implementation of the `TokenStore` port: the persisted
//! bearer token lives in a single file that is replaced on every save.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use theses_core::ports::{PortError, PortResult, TokenStore};
use tokio::fs;

/// Keeps the session token in one file on disk.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn storage_error(path: &Path, e: std::io::Error) -> PortError {
    PortError::Storage(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> PortResult<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(&self.path, e)),
        }
    }

    async fn save(&self, token: &str) -> PortResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(parent, e))?;
        }

        // Write aside, then rename over the old file so a reader never sees a partial token.
        let staging = self.staging_path();
        fs::write(&staging, token.as_bytes())
            .await
            .map_err(|e| storage_error(&staging, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&staging, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| storage_error(&staging, e))?;
        }
        fs::rename(&staging, &self.path)
            .await
            .map_err(|e| storage_error(&self.path, e))
    }

    async fn clear(&self) -> PortResult<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(&self.path, e)),
        }
    }
}
