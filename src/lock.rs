//! Per-service deployment lease.
//!
//! One rolling update per service at a time: the lease is an exclusively
//! created lock file, held for the whole attempt and removed on drop so
//! every exit path releases it. A crash can leave a stale file behind;
//! removing it manually is the recovery.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use log::{debug, warn};

use crate::error::{Error, Result};

pub struct DeployLock {
    path: PathBuf,
}

impl DeployLock {
    /// Acquire the lease for one service, failing fast when another
    /// invocation already holds it.
    pub fn acquire(project: Option<&str>, service: &str) -> Result<Self> {
        let file_name = match project {
            Some(p) => format!("ztd-{p}-{service}.lock"),
            None => format!("ztd-{service}.lock"),
        };
        let path = std::env::temp_dir().join(file_name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = write!(file, "{}", std::process::id());
                debug!("Acquired deploy lock {}", path.display());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(Error::LockHeld {
                service: service.to_string(),
                path,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(
                "Failed to remove deploy lock {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
