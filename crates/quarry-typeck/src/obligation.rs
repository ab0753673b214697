//! Obligations: deferred trait-bound and associated-type requirements.
//!
//! The walker registers obligations whenever it instantiates something with
//! bounds; `InferCtx::select_where_possible` repeatedly hands them to the
//! trait selection service and drops the ones that are decided.

use quarry_hir::fold::{TypeFoldable, TypeFolder, TypeVisitor};
use quarry_hir::ty::{ProjectionTy, TraitRef, Ty};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    /// `T: Trait<Args>`
    Trait(TraitRef),
    /// `<T as Trait>::Name == Ty`
    Projection(ProjectionTy, Ty),
}

impl TypeFoldable for Predicate {
    fn fold_with<F: TypeFolder + ?Sized>(self, folder: &mut F) -> Self {
        match self {
            Predicate::Trait(trait_ref) => Predicate::Trait(trait_ref.fold_with(folder)),
            Predicate::Projection(proj, ty) => {
                Predicate::Projection(proj.fold_with(folder), folder.fold_ty(ty))
            }
        }
    }

    fn visit_with<V: TypeVisitor + ?Sized>(&self, visitor: &mut V) -> bool {
        match self {
            Predicate::Trait(trait_ref) => trait_ref.visit_with(visitor),
            Predicate::Projection(proj, ty) => proj.visit_with(visitor) || visitor.visit_ty(ty),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Obligation {
    /// Nesting depth; obligations produced while confirming another one
    /// are one level deeper.
    pub depth: u32,
    pub predicate: Predicate,
}

impl Obligation {
    pub fn new(depth: u32, predicate: Predicate) -> Obligation {
        Obligation { depth, predicate }
    }

    pub fn trait_bound(depth: u32, trait_ref: TraitRef) -> Obligation {
        Obligation::new(depth, Predicate::Trait(trait_ref))
    }

    pub fn projection_eq(depth: u32, proj: ProjectionTy, ty: Ty) -> Obligation {
        Obligation::new(depth, Predicate::Projection(proj, ty))
    }
}

/// A value together with the obligations that must hold for it to be valid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TyWithObligations<T> {
    pub value: T,
    pub obligations: Vec<Obligation>,
}

impl<T> TyWithObligations<T> {
    pub fn new(value: T, obligations: Vec<Obligation>) -> Self {
        TyWithObligations { value, obligations }
    }

    pub fn plain(value: T) -> Self {
        TyWithObligations { value, obligations: Vec::new() }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TyWithObligations<U> {
        TyWithObligations { value: f(self.value), obligations: self.obligations }
    }
}

/// The queue of obligations not yet decided.
#[derive(Clone, Debug, Default)]
pub struct FulfillmentContext {
    pending: Vec<Obligation>,
}

impl FulfillmentContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, obligation: Obligation) {
        self.pending.push(obligation);
    }

    pub fn register_all(&mut self, obligations: impl IntoIterator<Item = Obligation>) {
        self.pending.extend(obligations);
    }

    pub fn pending(&self) -> &[Obligation] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn take_pending(&mut self) -> Vec<Obligation> {
        std::mem::take(&mut self.pending)
    }
}
