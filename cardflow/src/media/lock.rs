//! Single-writer run lock shared across process invocations.
//!
//! The lock is a sentinel file created with `create_new`, so at most one
//! process can hold it. Its body records the owner; a lock left behind by a
//! crashed run is reported, never stolen, and cleared with [`RunLock::force_clear`].

use crate::errors::{LockOwnerInfo, MediaError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockBody {
    pid: u32,
    run_id: Uuid,
    hostname: String,
    acquired_at: String,
}

impl LockBody {
    fn owner_info(&self) -> LockOwnerInfo {
        let local = self.hostname == hostname();
        LockOwnerInfo {
            pid: self.pid,
            hostname: self.hostname.clone(),
            acquired_at: self.acquired_at.clone(),
            alive: if local { process_alive(self.pid) } else { None },
        }
    }
}

/// A held run lock. Dropping it removes the lock file.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    released: bool,
}

impl RunLock {
    /// Takes the lock at `path` for `run_id`.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::RunInProgress` if the file already exists, or an
    /// IO error if it cannot be created.
    pub fn acquire(path: &Path, run_id: Uuid) -> Result<Self, MediaError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(MediaError::RunInProgress {
                    path: path.to_path_buf(),
                    owner: read_owner(path),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let lock = Self {
            path: path.to_path_buf(),
            released: false,
        };

        let body = LockBody {
            pid: std::process::id(),
            run_id,
            hostname: hostname(),
            acquired_at: Utc::now().to_rfc3339(),
        };
        let json = serde_json::to_vec_pretty(&body).map_err(std::io::Error::other)?;
        file.write_all(&json)?;

        tracing::debug!(lock = %path.display(), run_id = %run_id, "Run lock acquired");
        Ok(lock)
    }

    /// Returns the lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the lock now instead of on drop.
    pub fn release(mut self) {
        self.remove();
    }

    /// Returns true if a lock file exists at `path`.
    #[must_use]
    pub fn is_held(path: &Path) -> bool {
        path.exists()
    }

    /// Removes a lock left behind by another run.
    ///
    /// Returns the recorded owner, or `None` if no lock was held.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file exists but cannot be removed.
    pub fn force_clear(path: &Path) -> std::io::Result<Option<LockOwnerInfo>> {
        if !path.exists() {
            return Ok(None);
        }
        let owner = read_owner(path);
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        }
        tracing::warn!(lock = %path.display(), owner = ?owner, "Run lock cleared");
        Ok(owner)
    }

    fn remove(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(lock = %self.path.display(), error = %e, "Failed to remove run lock");
        } else {
            tracing::debug!(lock = %self.path.display(), "Run lock released");
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        self.remove();
    }
}

fn read_owner(path: &Path) -> Option<LockOwnerInfo> {
    let raw = std::fs::read_to_string(path).ok()?;
    let body: LockBody = serde_json::from_str(&raw).ok()?;
    Some(body.owner_info())
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
}

/// Best-effort liveness probe for a local process id.
#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> Option<bool> {
    Some(Path::new("/proc").join(pid.to_string()).exists())
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> Option<bool> {
    None
}
