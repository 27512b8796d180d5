use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as PathMutex, OwnedMutexGuard};

/// Exclusive access to one storage path. Dropping the guard releases it.
pub type PathGuard = OwnedMutexGuard<()>;

/// Hands out one lock per storage path.
///
/// Locks are created the first time a path is seen and kept for the life of
/// the process. The table mutex is only held long enough to look up or insert
/// an entry; waiting for a path happens outside it.
#[derive(Default)]
pub struct PathLocks {
    table: Mutex<HashMap<PathBuf, Arc<PathMutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `path`.
    pub async fn acquire(&self, path: &Path) -> PathGuard {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.entry(path.to_path_buf()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of distinct paths that have been locked so far.
    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
