// Upload directory management: the startup writability check, listing of
// stored files and the rule for which names may refer to a stored file.

use std::{
    fmt,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

const PROBE_FILE_NAME: &str = ".write-probe";

/// Reasons the upload directory cannot be used. Both are fatal at startup.
#[derive(Debug)]
pub enum StorageSetupError {
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    NotWritable {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for StorageSetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDir { path, source } => write!(
                f,
                "Failed to create upload directory {}: {}",
                path.display(),
                source
            ),
            Self::NotWritable { path, source } => write!(
                f,
                "Upload directory {} is not writable: {}",
                path.display(),
                source
            ),
        }
    }
}

impl std::error::Error for StorageSetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } | Self::NotWritable { source, .. } => Some(source),
        }
    }
}

/// Creates `dir` (and its parents) and proves it is writable by writing and
/// removing a probe file.
pub fn prepare_upload_dir(dir: &Path) -> Result<(), StorageSetupError> {
    std::fs::create_dir_all(dir).map_err(|source| StorageSetupError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let probe = dir.join(PROBE_FILE_NAME);
    std::fs::write(&probe, b"probe").map_err(|source| StorageSetupError::NotWritable {
        path: dir.to_path_buf(),
        source,
    })?;

    if let Err(e) = std::fs::remove_file(&probe) {
        warn!("Failed to remove probe file {}: {}", probe.display(), e);
    }

    debug!("Upload directory {} is ready", dir.display());
    Ok(())
}

/// Returns the names of all non-directory entries in `dir`, sorted by name.
pub async fn list_stored_files(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            continue;
        }
        names.push(entry.file_name().to_string_lossy().into_owned());
    }

    names.sort();
    Ok(names)
}

/// Whether `name` can refer to a file directly inside the upload directory.
/// Rejects separators, traversal segments and NUL bytes.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
