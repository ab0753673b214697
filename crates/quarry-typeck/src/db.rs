//! Read-only collaborators of inference.
//!
//! Everything inference needs from outside the body being inferred goes
//! through `HirDatabase`: declarations, well-known items, other bodies,
//! name resolution and trait selection. Implementations are shared between
//! threads inferring different bodies and are never mutated by inference.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use quarry_hir::body::{Body, BodyOwner, ExprId, ExprOrPatId};
use quarry_hir::item::{TraitId, VariantRef};
use quarry_hir::{ItemTree, KnownItems, PathResolution, ResolvedNames, Substitution};

use crate::select::{ImplLookup, TraitSelection};

pub trait HirDatabase: Sync {
    fn item_tree(&self) -> &ItemTree;

    fn known_items(&self) -> &KnownItems;

    fn body(&self, owner: BodyOwner) -> Option<Arc<Body>>;

    /// Candidates for the path expression `expr`, in resolution order.
    fn resolve_path(&self, owner: BodyOwner, expr: ExprId) -> Vec<PathResolution>;

    /// The struct or variant named by a struct literal or pattern.
    fn resolve_variant(
        &self,
        owner: BodyOwner,
        site: ExprOrPatId,
    ) -> Option<(VariantRef, Substitution)>;

    /// Traits whose methods are callable with method syntax at `expr`.
    fn traits_in_scope(&self, owner: BodyOwner, expr: ExprId) -> Vec<TraitId>;

    fn trait_selection(&self) -> &dyn TraitSelection;
}

/// A `HirDatabase` over bodies lowered ahead of time.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    items: ItemTree,
    known: KnownItems,
    bodies: FxHashMap<BodyOwner, (Arc<Body>, ResolvedNames)>,
    selection: ImplLookup,
}

impl MemoryDatabase {
    pub fn new(items: ItemTree, known: KnownItems) -> Self {
        MemoryDatabase { items, known, bodies: FxHashMap::default(), selection: ImplLookup }
    }

    pub fn add_body(&mut self, owner: BodyOwner, body: Body, names: ResolvedNames) {
        self.bodies.insert(owner, (Arc::new(body), names));
    }

    fn names(&self, owner: BodyOwner) -> Option<&ResolvedNames> {
        self.bodies.get(&owner).map(|(_, names)| names)
    }
}

impl HirDatabase for MemoryDatabase {
    fn item_tree(&self) -> &ItemTree {
        &self.items
    }

    fn known_items(&self) -> &KnownItems {
        &self.known
    }

    fn body(&self, owner: BodyOwner) -> Option<Arc<Body>> {
        self.bodies.get(&owner).map(|(body, _)| Arc::clone(body))
    }

    fn resolve_path(&self, owner: BodyOwner, expr: ExprId) -> Vec<PathResolution> {
        self.names(owner).map(|names| names.path(expr).to_vec()).unwrap_or_default()
    }

    fn resolve_variant(
        &self,
        owner: BodyOwner,
        site: ExprOrPatId,
    ) -> Option<(VariantRef, Substitution)> {
        self.names(owner)?.variant(site).cloned()
    }

    fn traits_in_scope(&self, owner: BodyOwner, _expr: ExprId) -> Vec<TraitId> {
        match self.names(owner).and_then(ResolvedNames::traits_in_scope) {
            Some(traits) => traits.to_vec(),
            None => self.items.trait_ids().collect(),
        }
    }

    fn trait_selection(&self) -> &dyn TraitSelection {
        &self.selection
    }
}
