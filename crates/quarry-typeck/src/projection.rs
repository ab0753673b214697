//! Memoized, cycle-safe normalization state for associated-type projections.
//!
//! Each key moves from absent to in-progress via `try_start`, then to one of
//! the terminal states. The cache takes part in `InferCtx` snapshots: while
//! a snapshot is open every write is logged and can be undone.

use rustc_hash::FxHashMap;

use quarry_hir::ty::{ProjectionTy, Ty};

use crate::obligation::TyWithObligations;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProjectionCacheEntry {
    InProgress,
    Ambiguous,
    Error,
    NormalizedTy(TyWithObligations<Ty>),
}

#[derive(Debug)]
enum UndoEntry {
    Inserted(ProjectionTy),
    Overwrote(ProjectionTy, ProjectionCacheEntry),
}

#[derive(Debug)]
pub struct ProjectionCacheSnapshot {
    undo_len: usize,
}

#[derive(Debug, Default)]
pub struct ProjectionCache {
    map: FxHashMap<ProjectionTy, ProjectionCacheEntry>,
    undo_log: Vec<UndoEntry>,
    open_snapshots: usize,
}

impl ProjectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` in progress and returns `Ok` if it was absent; otherwise
    /// returns the current entry unchanged.
    pub fn try_start(&mut self, key: &ProjectionTy) -> Result<(), ProjectionCacheEntry> {
        if let Some(entry) = self.map.get(key) {
            return Err(entry.clone());
        }
        self.insert(key.clone(), ProjectionCacheEntry::InProgress);
        Ok(())
    }

    pub fn insert_ty(&mut self, key: ProjectionTy, value: TyWithObligations<Ty>) {
        self.insert(key, ProjectionCacheEntry::NormalizedTy(value));
    }

    pub fn ambiguous(&mut self, key: ProjectionTy) {
        tracing::trace!(?key, "projection ambiguous");
        self.insert(key, ProjectionCacheEntry::Ambiguous);
    }

    pub fn error(&mut self, key: ProjectionTy) {
        tracing::trace!(?key, "projection error");
        self.insert(key, ProjectionCacheEntry::Error);
    }

    pub fn get(&self, key: &ProjectionTy) -> Option<&ProjectionCacheEntry> {
        self.map.get(key)
    }

    fn insert(&mut self, key: ProjectionTy, entry: ProjectionCacheEntry) {
        let previous = self.map.insert(key.clone(), entry);
        if self.open_snapshots == 0 {
            return;
        }
        self.undo_log.push(match previous {
            Some(previous) => UndoEntry::Overwrote(key, previous),
            None => UndoEntry::Inserted(key),
        });
    }

    // ── Snapshots ──────────────────────────────────────────────────────

    pub fn snapshot(&mut self) -> ProjectionCacheSnapshot {
        self.open_snapshots += 1;
        ProjectionCacheSnapshot { undo_len: self.undo_log.len() }
    }

    pub fn rollback_to(&mut self, snapshot: ProjectionCacheSnapshot) {
        while self.undo_log.len() > snapshot.undo_len {
            match self.undo_log.pop() {
                Some(UndoEntry::Inserted(key)) => {
                    self.map.remove(&key);
                }
                Some(UndoEntry::Overwrote(key, previous)) => {
                    self.map.insert(key, previous);
                }
                None => break,
            }
        }
        self.open_snapshots -= 1;
    }

    pub fn commit(&mut self, _snapshot: ProjectionCacheSnapshot) {
        self.open_snapshots -= 1;
        // An enclosing snapshot may still roll back past this point.
        if self.open_snapshots == 0 {
            self.undo_log.clear();
        }
    }
}
