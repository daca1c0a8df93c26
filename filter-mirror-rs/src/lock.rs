use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

use fslock::LockFile;

use crate::error::{MirrorError, Result};

const RETRY_WAIT: Duration = Duration::from_secs(2);

/// Scoped exclusive-run guard over the worker sentinel file.
///
/// Holds an OS-level advisory lock for as long as the value lives; dropping
/// it (on any exit path, including panics) releases the lock. With locking
/// disabled the guard is inert and concurrent runs are the operator's
/// problem.
pub struct RunGuard {
    _lock: Option<LockFile>,
}

pub fn acquire(path: &Path, enabled: bool) -> Result<RunGuard> {
    if !enabled {
        eprintln!("NOTICE: run locking disabled; concurrent runs may corrupt the worker");
        return Ok(RunGuard { _lock: None });
    }
    let mut lock = LockFile::open(path.as_os_str()).map_err(lock_err)?;
    loop {
        if lock.try_lock_with_pid().map_err(lock_err)? {
            return Ok(RunGuard { _lock: Some(lock) });
        }
        eprintln!(
            "NOTICE: waiting for a concurrent run to release {}",
            path.display()
        );
        thread::sleep(RETRY_WAIT);
    }
}

fn lock_err(err: fslock::Error) -> MirrorError {
    MirrorError::Io(io::Error::new(io::ErrorKind::Other, err.to_string()))
}
