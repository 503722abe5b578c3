use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::io::vault_io::FsVault;

/// How long a command waits for another tagflow process before giving up.
const VAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Advisory lock serializing registry and note rewrites between tagflow
/// processes (a running `tagflow watch` and one-shot commands).
///
/// The lock file stays in place and holds the pid of the last holder, so a
/// blocked command can say who it is waiting on. Only the flock matters;
/// it is released when the file closes.
pub struct VaultLock {
    _file: File,
}

/// Error type for lock operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not create lock file at {path}: {source}")]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("vault is busy: another tagflow process{} holds {path}", holder_suffix(.holder))]
    Timeout { path: PathBuf, holder: Option<u32> },
}

fn holder_suffix(holder: &Option<u32>) -> String {
    holder.map(|pid| format!(" (pid {})", pid)).unwrap_or_default()
}

impl VaultLock {
    /// Lock the vault, waiting up to the default timeout.
    pub fn for_vault(vault: &FsVault) -> Result<Self, LockError> {
        Self::acquire(&vault.tagflow_dir(), VAULT_LOCK_TIMEOUT)
    }

    /// Acquire the lock in `tagflow_dir`, waiting up to `timeout`.
    pub fn acquire(tagflow_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let lock_path = lock_path(tagflow_dir);
        let mut file = fs::create_dir_all(tagflow_dir)
            .and_then(|_| {
                OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(false)
                    .open(&lock_path)
            })
            .map_err(|e| LockError::CreateError {
                path: lock_path.clone(),
                source: e,
            })?;

        let start = Instant::now();
        while try_lock(&file).is_err() {
            if start.elapsed() >= timeout {
                let holder = read_holder(&lock_path);
                log::warn!(
                    "event=vault_lock status=timeout path={} holder={:?}",
                    lock_path.display(),
                    holder
                );
                return Err(LockError::Timeout {
                    path: lock_path,
                    holder,
                });
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        if let Err(e) = file
            .set_len(0)
            .and_then(|_| write!(file, "{}", std::process::id()))
        {
            log::debug!("event=vault_lock status=pid_unwritten error={}", e);
        }
        Ok(VaultLock { _file: file })
    }
}

fn lock_path(tagflow_dir: &Path) -> PathBuf {
    tagflow_dir.join(".lock")
}

/// Pid recorded by whoever holds (or last held) the lock.
fn read_holder(lock_path: &Path) -> Option<u32> {
    fs::read_to_string(lock_path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn try_lock(file: &File) -> Result<(), std::io::Error> {
    use std::os::unix::io::AsRawFd;
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> Result<(), std::io::Error> {
    Ok(())
}
