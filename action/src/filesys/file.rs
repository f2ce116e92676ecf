//! File operations

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::ActionError;

/// A file wrapper with path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name of the file
    pub fn name(&self) -> Result<String, ActionError> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ActionError::InvalidInput(format!("{} has no file name", self.path.display()))
            })
    }

    /// Check if a regular file exists at the path
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Fail with `FileNotFound` unless the file exists
    pub async fn require(&self) -> Result<(), ActionError> {
        if self.exists().await {
            Ok(())
        } else {
            Err(ActionError::FileNotFound(self.path.display().to_string()))
        }
    }

    /// Read file contents as string
    pub async fn read_string(&self) -> Result<String, ActionError> {
        self.require().await?;
        Ok(fs::read_to_string(&self.path).await?)
    }

    /// Read file contents as bytes
    pub async fn read_bytes(&self) -> Result<Vec<u8>, ActionError> {
        self.require().await?;
        Ok(fs::read(&self.path).await?)
    }

    /// Write string to file, replacing its contents
    pub async fn write_string(&self, contents: &str) -> Result<(), ActionError> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&self.path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Append string to file, creating it when missing
    pub async fn append_string(&self, contents: &str) -> Result<(), ActionError> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(contents.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
