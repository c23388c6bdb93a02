//! Process-local cache of the worker's active wallpapers.

use crate::model::WallpaperRecord;
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{Mutex, MutexGuard};

/// Immutable point-in-time view of the cache.
///
/// Shares nothing mutable with the cache: a later replacement installs a new
/// slice and leaves every outstanding snapshot untouched.
#[derive(Debug, Clone)]
pub struct Snapshot(Arc<[WallpaperRecord]>);

impl Snapshot {
    pub fn for_display(&self, device_id: &str) -> Option<&WallpaperRecord> {
        self.0.iter().find(|w| w.display.device_id == device_id)
    }

    pub fn for_library<'a>(
        &'a self,
        info_folder_path: &'a str,
    ) -> impl Iterator<Item = &'a WallpaperRecord> + 'a {
        self.0
            .iter()
            .filter(move |w| w.info_folder_path == info_folder_path)
    }
}

impl Deref for Snapshot {
    type Target = [WallpaperRecord];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub struct StateCache {
    current: RwLock<Arc<[WallpaperRecord]>>,
    refresh: Mutex<()>,
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCache {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::from(Vec::new())),
            refresh: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        // The slot only ever holds a complete slice, so a poisoned lock is still consistent.
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Snapshot(Arc::clone(&current))
    }

    /// Exclusive writer access. Refreshes are serialized on this guard.
    pub(crate) async fn begin_refresh(&self) -> RefreshGuard<'_> {
        RefreshGuard {
            cache: self,
            _permit: self.refresh.lock().await,
        }
    }
}

pub(crate) struct RefreshGuard<'a> {
    cache: &'a StateCache,
    _permit: MutexGuard<'a, ()>,
}

impl RefreshGuard<'_> {
    /// Swaps the whole contents in one step.
    pub(crate) fn replace_all(&self, records: Vec<WallpaperRecord>) {
        let next: Arc<[WallpaperRecord]> = records.into();
        let mut slot = self
            .cache
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = next;
    }
}
