//! Marker file primitives.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::fs;

use crate::error::{Error, Result};

fn stamp() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    format!("{secs}\n")
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::Io("failed to create marker directory", e))?;
    }
    Ok(())
}

/// Creates an in-progress marker holding the creation time.
pub async fn create(path: &Path) -> Result<()> {
    ensure_parent(path).await?;
    fs::write(path, stamp())
        .await
        .map_err(|e| Error::Io("failed to create marker", e))
}

/// Writes a marker by rename, so it either exists completely or not at all.
pub async fn create_atomic(path: &Path) -> Result<()> {
    ensure_parent(path).await?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    fs::write(&tmp, stamp())
        .await
        .map_err(|e| Error::Io("failed to write marker", e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| Error::Io("failed to publish marker", e))
}

/// Removes `path`, returning whether it existed.
pub async fn remove(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Io("failed to remove file", e)),
    }
}

/// Whether `path` exists.
pub async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Size of `path`, or zero if it does not exist.
pub async fn len(path: &Path) -> u64 {
    fs::metadata(path).await.map_or(0, |m| m.len())
}
