//! Single-flight guard per folder
//!
//! Two operations on the same folder would read the same sync key and race
//! to persist diverging successors. [`FolderLocks`] rejects the second one.

use anyhow::Result;
use log::warn;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::FolderBusyError;

/// Set of folders with an operation in flight
#[derive(Debug, Default)]
pub struct FolderLocks {
    active: Mutex<HashSet<String>>,
}

impl FolderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `folder_id`, failing with [`FolderBusyError`] if already claimed
    ///
    /// The claim is released when the returned guard is dropped.
    pub fn try_acquire(&self, folder_id: &str) -> Result<FolderGuard<'_>> {
        let mut active = self.active.lock().unwrap();

        if !active.insert(folder_id.to_string()) {
            warn!("Rejecting concurrent operation on folder {}", folder_id);
            return Err(FolderBusyError {
                folder: folder_id.to_string(),
            }
            .into());
        }

        Ok(FolderGuard {
            locks: self,
            folder_id: folder_id.to_string(),
        })
    }

    pub fn is_active(&self, folder_id: &str) -> bool {
        self.active.lock().unwrap().contains(folder_id)
    }
}

/// Claim on one folder, released on drop
#[derive(Debug)]
pub struct FolderGuard<'a> {
    locks: &'a FolderLocks,
    folder_id: String,
}

impl FolderGuard<'_> {
    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }
}

impl Drop for FolderGuard<'_> {
    fn drop(&mut self) {
        // Release even if a panicking sync poisoned the lock
        let mut active = self
            .locks
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.folder_id);
    }
}
