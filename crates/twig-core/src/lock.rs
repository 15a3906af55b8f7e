//! Repository locking.
//!
//! Commands that read-modify-write the index or refs hold an exclusive
//! advisory lock (`flock(2)` on Unix, via `fs2`) on `.twig/twig.lock` for
//! their whole duration. The OS drops the lock if the process dies, so
//! there is no stale-lock cleanup. Processes that bypass the lock get no
//! guarantees.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::debug;

use crate::error::{TwigError, TwigResult};

pub const LOCK_FILE: &str = "twig.lock";

/// An exclusive repository lock, released on drop.
pub struct RepoLock {
    _file: File,
}

impl RepoLock {
    /// Acquire the lock, polling until `timeout` expires.
    pub fn acquire(twig_dir: &Path, timeout: Duration) -> TwigResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(twig_dir.join(LOCK_FILE))?;

        let start = Instant::now();
        let poll_interval = Duration::from_millis(10);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(waited_ms = start.elapsed().as_millis() as u64, "acquired repository lock");
                    return Ok(RepoLock { _file: file });
                }
                Err(_) if start.elapsed() >= timeout => return Err(TwigError::LockTimeout),
                Err(_) => std::thread::sleep(poll_interval),
            }
        }
    }
}
