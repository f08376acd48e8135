//! Single-instance guard.
//!
//! Ownership is an exclusive advisory lock on the lock file, taken without
//! blocking at startup. The kernel drops the lock when its holder exits, so a
//! file left behind by a dead process is simply taken over. The PID inside
//! the file is informational. The file is removed when the guard drops.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::result::{ProbeError, ProbeResult};

/// Held lock file; removed on drop
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    pid: u32,
    file: File,
}

impl InstanceLock {
    /// Lock `path` and write the current PID into it.
    ///
    /// # Errors
    ///
    /// `InstanceLocked` when another process holds the lock, I/O errors otherwise
    pub fn acquire(path: &Path) -> ProbeResult<Self> {
        let pid = std::process::id();

        for _ in 0..3 {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)?;

            if let Err(err) = file.try_lock_exclusive() {
                if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                    return Err(ProbeError::InstanceLocked {
                        pid: read_pid(path),
                        path: path.display().to_string(),
                    });
                }
                return Err(err.into());
            }

            // The previous holder unlinks the file before releasing it.
            if !still_linked(&file, path)? {
                tracing::debug!(
                    path = %path.display(),
                    "lock file replaced while locking, retrying"
                );
                continue;
            }

            if let Some(previous) = read_pid(path).filter(|&owner| owner != pid) {
                tracing::warn!(
                    "Taking over lock file '{}' left by pid {previous}",
                    path.display()
                );
            }
            file.set_len(0)?;
            writeln!(file, "{pid}")?;
            tracing::debug!(path = %path.display(), pid, "lock acquired");
            return Ok(Self {
                path: path.to_path_buf(),
                pid,
                file,
            });
        }

        Err(ProbeError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("lock file '{}' keeps being replaced", path.display()),
        )))
    }

    /// Lock file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID written into the file
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // Unlink while still holding the lock; closing `file` releases it.
        let ours = read_pid(&self.path) == Some(self.pid);
        if ours && still_linked(&self.file, &self.path).unwrap_or(false) {
            if let Err(err) = remove_if_present(&self.path) {
                tracing::warn!("Failed to remove lock file '{}': {err}", self.path.display());
            }
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// Whether `path` still names the file behind `file`
#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Open files cannot be unlinked here, so the path is enough
#[cfg(not(unix))]
fn still_linked(_file: &File, path: &Path) -> io::Result<bool> {
    Ok(path.exists())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_writes_pid_and_drop_removes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinprobe.lock");

        let lock = InstanceLock::acquire(&path).unwrap();
        assert_eq!(read_pid(&path), Some(std::process::id()));
        assert_eq!(lock.path(), path);

        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn test_second_instance_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinprobe.lock");

        let _held = InstanceLock::acquire(&path).unwrap();
        let err = InstanceLock::acquire(&path).unwrap_err();

        assert!(matches!(
            err,
            ProbeError::InstanceLocked { pid, .. } if pid == Some(std::process::id())
        ));
        assert!(path.exists());
    }

    #[test]
    fn test_owner_without_pid_yet_still_holds_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinprobe.lock");
        let owner = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .unwrap();
        owner.try_lock_exclusive().unwrap();

        let err = InstanceLock::acquire(&path).unwrap_err();

        assert!(matches!(err, ProbeError::InstanceLocked { pid: None, .. }));
        assert!(err.to_string().contains("pid unknown"));
        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_unlocked_leftover_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinprobe.lock");
        fs::write(&path, "4194305\n").unwrap();

        let lock = InstanceLock::acquire(&path).unwrap();
        assert_eq!(read_pid(&path), Some(lock.pid()));
    }

    #[test]
    fn test_garbage_lock_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinprobe.lock");
        fs::write(&path, "not a pid").unwrap();

        let lock = InstanceLock::acquire(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{}\n", lock.pid()));
    }

    #[test]
    fn test_released_lock_can_be_taken_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinprobe.lock");

        drop(InstanceLock::acquire(&path).unwrap());
        let again = InstanceLock::acquire(&path).unwrap();
        assert_eq!(read_pid(&path), Some(again.pid()));
    }

    #[test]
    fn test_drop_leaves_foreign_lock_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinprobe.lock");

        let lock = InstanceLock::acquire(&path).unwrap();
        fs::write(&path, "1\n").unwrap();
        drop(lock);

        assert!(path.exists());
    }
}
