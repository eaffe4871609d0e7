// The "current image" slot shared by all request handlers.

use crate::storage::is_plain_file_name;
use std::{fmt, path::PathBuf};
use tokio::sync::RwLock;

#[derive(Debug)]
pub enum SelectionError {
    NotFound(String),
    Io(std::io::Error),
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "File not found: {}", name),
            Self::Io(e) => write!(f, "Failed to inspect file: {}", e),
        }
    }
}

impl std::error::Error for SelectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::NotFound(_) => None,
        }
    }
}

/// Holds the currently selected file name. Empty means nothing is selected.
/// The selection is not kept in sync with the directory: a selected file may
/// be removed later, so readers must check existence themselves.
#[derive(Debug)]
pub struct SelectionState {
    upload_dir: PathBuf,
    current: RwLock<String>,
}

impl SelectionState {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            current: RwLock::new(String::new()),
        }
    }

    /// Selects `filename` if it names a regular file in the upload
    /// directory. The previous selection is kept on failure.
    pub async fn select(&self, filename: &str) -> Result<(), SelectionError> {
        let path = self
            .resolve(filename)
            .ok_or_else(|| SelectionError::NotFound(filename.to_string()))?;

        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(SelectionError::NotFound(filename.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SelectionError::NotFound(filename.to_string()));
            }
            Err(e) => return Err(SelectionError::Io(e)),
        }

        *self.current.write().await = filename.to_string();
        Ok(())
    }

    pub async fn current(&self) -> String {
        self.current.read().await.clone()
    }

    /// Path of the current selection, or `None` if nothing is selected.
    pub async fn current_path(&self) -> Option<PathBuf> {
        let current = self.current().await;
        if current.is_empty() {
            return None;
        }
        self.resolve(&current)
    }

    fn resolve(&self, filename: &str) -> Option<PathBuf> {
        is_plain_file_name(filename).then(|| self.upload_dir.join(filename))
    }
}
