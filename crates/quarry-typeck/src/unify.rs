//! Snapshot-able union-find over inference variables.
//!
//! Built on `ena`'s `SnapshotVec`, which keeps the undo log: every write to
//! a node (including path compression) is recorded while a snapshot is open
//! and reverted in reverse order on rollback. Commit only truncates the log.
//!
//! Unlike a rank-balanced table, `unify_var_var` always makes the first
//! root the representative, so the outcome depends only on argument order.

use std::fmt;
use std::marker::PhantomData;

use ena::snapshot_vec::{Snapshot, SnapshotVec, SnapshotVecDelegate};
use quarry_hir::ty::{FloatTy, FloatVid, IntTy, IntVid, Ty, TyVid};

/// A variable kind that can key a `UnificationTable`.
pub trait UnifyKey: Copy + Eq + fmt::Debug {
    fn index(self) -> u32;
    fn from_index(index: u32) -> Self;
    fn tag() -> &'static str;
}

impl UnifyKey for TyVid {
    fn index(self) -> u32 {
        self.0
    }
    fn from_index(index: u32) -> Self {
        TyVid(index)
    }
    fn tag() -> &'static str {
        "TyVid"
    }
}

impl UnifyKey for IntVid {
    fn index(self) -> u32 {
        self.0
    }
    fn from_index(index: u32) -> Self {
        IntVid(index)
    }
    fn tag() -> &'static str {
        "IntVid"
    }
}

impl UnifyKey for FloatVid {
    fn index(self) -> u32 {
        self.0
    }
    fn from_index(index: u32) -> Self {
        FloatVid(index)
    }
    fn tag() -> &'static str {
        "FloatVid"
    }
}

#[derive(Clone, Debug)]
struct VarValue<K, V> {
    parent: K,
    value: Option<V>,
}

struct Delegate<K, V>(PhantomData<(K, V)>);

impl<K, V> SnapshotVecDelegate for Delegate<K, V> {
    type Value = VarValue<K, V>;
    type Undo = ();

    fn reverse(_values: &mut Vec<VarValue<K, V>>, _action: ()) {}
}

/// An open snapshot of one table. Must be rolled back or committed in
/// LIFO order with respect to other snapshots of the same table.
pub struct TableSnapshot<K> {
    snapshot: Snapshot,
    _key: PhantomData<K>,
}

pub struct UnificationTable<K: UnifyKey, V: Clone> {
    values: SnapshotVec<Delegate<K, V>>,
}

/// Integer variables resolve to an integer type.
pub type IntTable = UnificationTable<IntVid, IntTy>;
/// Float variables resolve to a float type.
pub type FloatTable = UnificationTable<FloatVid, FloatTy>;
/// General type variables resolve to any type.
pub type TyTable = UnificationTable<TyVid, Ty>;

impl<K: UnifyKey, V: Clone + PartialEq> Default for UnificationTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: UnifyKey, V: Clone + PartialEq> UnificationTable<K, V> {
    pub fn new() -> Self {
        UnificationTable { values: SnapshotVec::new() }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.len() == 0
    }

    pub fn new_key(&mut self) -> K {
        let key = K::from_index(self.values.len() as u32);
        self.values.push(VarValue { parent: key, value: None });
        tracing::trace!(key = ?key, tag = K::tag(), "new variable");
        key
    }

    fn node(&self, key: K) -> &VarValue<K, V> {
        self.values.get(key.index() as usize)
    }

    /// The representative of `key`'s set, compressing the path on the way.
    pub fn find_root(&mut self, key: K) -> K {
        let parent = self.node(key).parent;
        if parent == key {
            return key;
        }
        let root = self.find_root(parent);
        if root != parent {
            self.values.update(key.index() as usize, |node| node.parent = root);
        }
        root
    }

    /// The value bound to `key`'s set, if any.
    pub fn find_value(&mut self, key: K) -> Option<V> {
        let root = self.find_root(key);
        self.node(root).value.clone()
    }

    /// Merges `b`'s set into `a`'s. If only `b`'s set had a value, the
    /// merged set keeps it.
    pub fn unify_var_var(&mut self, a: K, b: K) {
        let root_a = self.find_root(a);
        let root_b = self.find_root(b);
        if root_a == root_b {
            return;
        }
        let value_b = self.node(root_b).value.clone();
        self.values.update(root_b.index() as usize, |node| node.parent = root_a);
        if self.node(root_a).value.is_none() && value_b.is_some() {
            self.values.update(root_a.index() as usize, |node| node.value = value_b);
        }
    }

    /// Binds `key`'s set to `value`. Rebinding to an equal value is a
    /// no-op; checking for conflicts is the caller's job.
    pub fn unify_var_value(&mut self, key: K, value: V) {
        let root = self.find_root(key);
        if self.node(root).value.as_ref() == Some(&value) {
            return;
        }
        self.values.update(root.index() as usize, |node| node.value = Some(value));
    }

    // ── Snapshots ──────────────────────────────────────────────────────

    pub fn start_snapshot(&mut self) -> TableSnapshot<K> {
        TableSnapshot { snapshot: self.values.start_snapshot(), _key: PhantomData }
    }

    pub fn rollback_to(&mut self, snapshot: TableSnapshot<K>) {
        self.values.rollback_to(snapshot.snapshot);
    }

    pub fn commit(&mut self, snapshot: TableSnapshot<K>) {
        self.values.commit(snapshot.snapshot);
    }
}
