//! Single-instance guard on the capture root.
//!
//! Two probes driving the same account would answer each other's prompts,
//! so the CLI holds `<capture_root>/.quoteprobe.lock` for its lifetime.

use crate::error::{ProbeError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lock file name inside the capture root.
pub const LOCK_FILE: &str = ".quoteprobe.lock";

const MAX_ATTEMPTS: u32 = 3;

/// Held for as long as this process owns the capture root.
///
/// Dropping it releases the file lock and removes the lock file.
#[derive(Debug)]
pub struct InstanceLock {
    file: Option<File>,
    path: PathBuf,
}

impl InstanceLock {
    /// Acquires the lock in `root`, creating the directory if needed.
    ///
    /// A lock left behind by a dead process, or one with unreadable content,
    /// is removed and acquisition retried.
    pub fn acquire(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        let path = root.join(LOCK_FILE);

        for attempt in 0..MAX_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    writeln!(file, "{}", std::process::id())?;
                    file.flush()?;
                    file.try_lock_exclusive().map_err(|_| ProbeError::InstanceLocked {
                        pid: std::process::id(),
                    })?;
                    debug!(path = %path.display(), "instance lock acquired");
                    return Ok(Self {
                        file: Some(file),
                        path,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    match read_holder(&path)? {
                        Holder::Alive(pid) => return Err(ProbeError::InstanceLocked { pid }),
                        Holder::Stale(pid) => {
                            warn!(pid, attempt, "removing stale instance lock");
                        }
                        Holder::Unreadable => {
                            warn!(attempt, "instance lock has invalid content; removing");
                        }
                        Holder::Gone => continue,
                    }
                    if let Err(e) = fs::remove_file(&path) {
                        if e.kind() != ErrorKind::NotFound {
                            return Err(e.into());
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ProbeError::InstanceLocked { pid: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
        let _ = fs::remove_file(&self.path);
    }
}

enum Holder {
    Alive(u32),
    Stale(u32),
    Unreadable,
    Gone,
}

fn read_holder(path: &Path) -> Result<Holder> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(match content.trim().parse::<u32>() {
            Ok(pid) if is_process_alive(pid) => Holder::Alive(pid),
            Ok(pid) => Holder::Stale(pid),
            Err(_) => Holder::Unreadable,
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Holder::Gone),
        Err(e) => Err(e.into()),
    }
}

/// Whether `pid` names a live process.
///
/// Linux checks `/proc/<pid>/stat`; other Unix asks `kill -0`; elsewhere the
/// holder is assumed alive and the lock must be removed by hand.
#[cfg(target_os = "linux")]
fn is_process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}/stat")).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(true)
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    true
}
