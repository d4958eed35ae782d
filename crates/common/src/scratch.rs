//! Per-job scratch storage with guaranteed, bounded-retry cleanup.
//!
//! A [`ScratchSpace`] owns one directory for the lifetime of a job. Every
//! file handed out through it is removed when the space is released or
//! dropped, on success and failure paths alike. Removal failures are retried
//! a fixed number of times and then logged; they never fail the job.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CleanupSettings;
use crate::error::{FramezoomError, FramezoomResult};

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How many times a removal is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&CleanupSettings::default())
    }
}

impl From<&CleanupSettings> for RetryPolicy {
    fn from(settings: &CleanupSettings) -> Self {
        Self {
            attempts: settings.attempts.max(1),
            pause: settings.pause(),
        }
    }
}

/// Filesystem removal operations, injectable for tests.
pub trait FileRemover: Send + Sync {
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn remove_dir(&self, path: &Path) -> io::Result<()>;
}

/// [`FileRemover`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsRemover;

impl FileRemover for FsRemover {
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }
}

/// Run `remove` until it succeeds or the policy's attempts are exhausted.
///
/// A path that is already gone counts as removed. Returns the number of
/// attempts used, or a [`FramezoomError::Cleanup`] carrying the last error.
pub fn remove_with_retry<F>(path: &Path, policy: RetryPolicy, mut remove: F) -> FramezoomResult<u32>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match remove(path) {
            Ok(()) => return Ok(attempt),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(attempt),
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    attempt,
                    attempts,
                    error = %e,
                    "Scratch removal attempt failed"
                );
                last_error = Some(e);
                if attempt < attempts {
                    std::thread::sleep(policy.pause);
                }
            }
        }
    }

    Err(FramezoomError::Cleanup {
        path: path.to_path_buf(),
        message: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "removal did not succeed".to_string()),
    })
}

/// A job-scoped temporary directory.
pub struct ScratchSpace {
    dir: PathBuf,
    files: Vec<PathBuf>,
    policy: RetryPolicy,
    remover: Arc<dyn FileRemover>,
    released: bool,
}

impl std::fmt::Debug for ScratchSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchSpace")
            .field("dir", &self.dir)
            .field("files", &self.files)
            .field("policy", &self.policy)
            .field("released", &self.released)
            .finish()
    }
}

impl ScratchSpace {
    /// Create a fresh, uniquely named directory under `root`.
    pub fn create(root: &Path, policy: RetryPolicy) -> FramezoomResult<Self> {
        std::fs::create_dir_all(root)?;
        let name = format!(
            "job-{}-{}-{}",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%3f"),
            std::process::id(),
            SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let dir = root.join(name);
        std::fs::create_dir(&dir)?;
        tracing::debug!(dir = %dir.display(), "Created scratch space");

        Ok(Self {
            dir,
            files: Vec::new(),
            policy,
            remover: Arc::new(FsRemover),
            released: false,
        })
    }

    /// Replace the removal backend.
    pub fn with_remover(mut self, remover: Arc<dyn FileRemover>) -> Self {
        self.remover = remover;
        self
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Reserve a tracked path inside the scratch directory.
    pub fn file(&mut self, name: &str) -> PathBuf {
        let path = self.dir.join(name);
        if !self.files.contains(&path) {
            self.files.push(path.clone());
        }
        path
    }

    /// Remove every tracked file, then the directory itself.
    ///
    /// Failures are logged and returned for inspection; callers are not
    /// expected to act on them.
    pub fn release(&mut self) -> Vec<FramezoomError> {
        if self.released {
            return Vec::new();
        }
        self.released = true;

        let mut failures = Vec::new();
        let remover = Arc::clone(&self.remover);

        for file in self.files.drain(..) {
            if let Err(err) = remove_with_retry(&file, self.policy, |p| remover.remove_file(p)) {
                tracing::warn!(
                    path = %file.display(),
                    category = err.category(),
                    error = %err,
                    "Giving up on scratch file removal"
                );
                failures.push(err);
            }
        }

        if let Err(err) = remove_with_retry(&self.dir, self.policy, |p| remover.remove_dir(p)) {
            tracing::warn!(
                path = %self.dir.display(),
                category = err.category(),
                error = %err,
                "Giving up on scratch directory removal"
            );
            failures.push(err);
        }

        failures
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            pause: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_retry_succeeds_on_fifth_attempt() {
        let mut calls = 0;
        let used = remove_with_retry(Path::new("/nonexistent/x"), fast_policy(5), |_| {
            calls += 1;
            if calls < 5 {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "busy"))
            } else {
                Ok(())
            }
        })
        .unwrap();
        assert_eq!(used, 5);
        assert_eq!(calls, 5);
    }

    #[test]
    fn test_retry_exhaustion_reports_cleanup_error() {
        let mut calls = 0;
        let err = remove_with_retry(Path::new("/locked"), fast_policy(3), |_| {
            calls += 1;
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "busy"))
        })
        .unwrap_err();
        assert_eq!(calls, 3);
        assert!(matches!(err, FramezoomError::Cleanup { .. }));
    }

    #[test]
    fn test_missing_path_counts_as_removed() {
        let used = remove_with_retry(Path::new("/gone"), fast_policy(5), |_| {
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"))
        })
        .unwrap();
        assert_eq!(used, 1);
    }

    #[test]
    fn test_scratch_space_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let dir;
        let file;
        {
            let mut scratch = ScratchSpace::create(root.path(), fast_policy(2)).unwrap();
            dir = scratch.path().to_path_buf();
            file = scratch.file("input.webm");
            std::fs::write(&file, b"data").unwrap();
            assert!(file.exists());
        }
        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_scratch_names_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let a = ScratchSpace::create(root.path(), fast_policy(1)).unwrap();
        let b = ScratchSpace::create(root.path(), fast_policy(1)).unwrap();
        assert_ne!(a.path(), b.path());
    }

    struct AlwaysBusy {
        calls: AtomicU32,
    }

    impl FileRemover for AlwaysBusy {
        fn remove_file(&self, _path: &Path) -> io::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "busy"))
        }

        fn remove_dir(&self, path: &Path) -> io::Result<()> {
            std::fs::remove_dir_all(path)
        }
    }

    #[test]
    fn test_release_collects_failures_without_panicking() {
        let root = tempfile::tempdir().unwrap();
        let remover = Arc::new(AlwaysBusy {
            calls: AtomicU32::new(0),
        });
        let mut scratch = ScratchSpace::create(root.path(), fast_policy(3))
            .unwrap()
            .with_remover(remover.clone());
        let file = scratch.file("stuck.bin");
        std::fs::write(&file, b"x").unwrap();

        let failures = scratch.release();
        assert_eq!(failures.len(), 1);
        assert_eq!(remover.calls.load(Ordering::SeqCst), 3);
        assert!(scratch.release().is_empty());
    }
}
