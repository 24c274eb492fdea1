use crate::error::Result;
use chrono::Local;
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusive advisory lock on `<file>.lock`, held for one read-transform-write cycle.
pub struct FileLock {
    file: File,
}

impl FileLock {
    pub fn acquire(target: &Path) -> Result<Self> {
        let path = sidecar_path(target, "lock");
        ensure_parent_dir(&path)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        file.lock_exclusive()?;
        debug!(path = %path.display(), "backing store lock acquired");

        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Writes `<file>.tmp` and renames it over `path`.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    ensure_parent_dir(path)?;

    let temp_path = sidecar_path(path, "tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Moves a malformed backing file aside so the caller can treat the store as empty.
pub fn quarantine(path: &Path, reason: &str) {
    let suffix = format!("malformed-{}", Local::now().format("%Y%m%d%H%M%S"));
    let target = sidecar_path(path, &suffix);

    match fs::rename(path, &target) {
        Ok(()) => warn!(
            path = %path.display(),
            moved_to = %target.display(),
            reason,
            "malformed backing file quarantined; continuing with an empty store"
        ),
        Err(error) => warn!(
            path = %path.display(),
            error = %error,
            reason,
            "malformed backing file could not be moved aside; continuing with an empty store"
        ),
    }
}

pub fn sidecar_path(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| OsString::from("store"));
    name.push(".");
    name.push(suffix);
    target.with_file_name(name)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    Ok(())
}
