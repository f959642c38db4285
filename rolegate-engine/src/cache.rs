//! Decision cache
//!
//! Memoizes, per (subject, target) pair, the ranked list of roles held and
//! their grants. Entries are filled lazily by a store read and removed
//! eagerly by every mutation that touches the pair.
//!
//! The cache is advisory: a missing entry is always rebuilt from the store.
//! Correctness rests on the caller invalidating inside the same critical
//! section as the store write (see [`crate::authorizer::Authorizer`]).

use dashmap::DashMap;
use rolegate_core::catalog::PermissionId;
use rolegate_core::error::Result;
use rolegate_core::ids::{SubjectId, TargetRef};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Structural cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Subject queried
    pub subject: SubjectId,
    /// Target level queried; `None` for the global level
    pub target: Option<TargetRef>,
    /// Whether the entry aggregates the subject's assignments on any object
    pub any_object: bool,
}

impl CacheKey {
    /// Key for one target level
    pub fn new(subject: &SubjectId, target: Option<&TargetRef>, any_object: bool) -> Self {
        Self {
            subject: subject.clone(),
            target: target.cloned(),
            any_object,
        }
    }
}

/// One role held at a target level, with its effective grants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrants {
    /// Role class name
    pub role: String,
    /// Role rank; the entry is sorted by it
    pub rank: usize,
    /// Effective grants sorted by permission id
    pub grants: Vec<(PermissionId, bool)>,
}

impl RoleGrants {
    /// Recorded grant for `permission`
    pub fn grant(&self, permission: PermissionId) -> Option<bool> {
        self.grants
            .binary_search_by_key(&permission, |(id, _)| *id)
            .ok()
            .map(|idx| self.grants[idx].1)
    }
}

/// Ranked role grants for one cache key
pub type CacheEntry = Arc<[RoleGrants]>;

/// Counters exposed for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups served from memory
    pub hits: u64,
    /// Lookups that read the store
    pub misses: u64,
    /// Entries removed by invalidation
    pub invalidations: u64,
    /// Entries currently held
    pub entries: usize,
}

/// Concurrent decision cache
#[derive(Debug)]
pub struct DecisionCache {
    enabled: bool,
    entries: DashMap<CacheKey, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl DecisionCache {
    /// Create a cache; a disabled cache never stores anything
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Whether entries are memoized
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Cached entry for `key`, or the result of `load` (stored on success)
    pub fn get_or_load<F>(&self, key: CacheKey, load: F) -> Result<CacheEntry>
    where
        F: FnOnce() -> Result<Vec<RoleGrants>>,
    {
        if self.enabled
            && let Some(entry) = self.entries.get(&key)
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry.value().clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let entry: CacheEntry = load()?.into();
        if self.enabled {
            self.entries.insert(key, entry.clone());
        }
        Ok(entry)
    }

    /// Drop everything cached for (subject, target).
    ///
    /// The subject's any-object entry aggregates all of its assignments, so
    /// it goes too.
    pub fn invalidate(&self, subject: &SubjectId, target: Option<&TargetRef>) {
        let mut removed = 0;
        if self.entries.remove(&CacheKey::new(subject, target, false)).is_some() {
            removed += 1;
        }
        if self.entries.remove(&CacheKey::new(subject, None, true)).is_some() {
            removed += 1;
        }
        if removed > 0 {
            self.invalidations.fetch_add(removed, Ordering::Relaxed);
            debug!(subject = %subject, removed, "Decision cache invalidated");
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry is held
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}
