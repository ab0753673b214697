//! Structural folding and visiting over types and the values that embed them.

use crate::ty::{BoundTrait, FnSig, ProjectionTy, TraitRef, Ty};

/// Rewrites types bottom-up or top-down, as the implementor decides.
///
/// The default `fold_ty` just recurses; override it and call
/// `Ty::super_fold_with` to continue into children.
pub trait TypeFolder {
    fn fold_ty(&mut self, ty: Ty) -> Ty {
        ty.super_fold_with(self)
    }
}

/// Walks types; returning `true` from `visit_ty` stops the walk.
pub trait TypeVisitor {
    fn visit_ty(&mut self, ty: &Ty) -> bool {
        ty.super_visit_with(self)
    }
}

/// Anything that contains types.
pub trait TypeFoldable: Sized {
    fn fold_with<F: TypeFolder + ?Sized>(self, folder: &mut F) -> Self;
    fn visit_with<V: TypeVisitor + ?Sized>(&self, visitor: &mut V) -> bool;
}

impl TypeFoldable for Ty {
    fn fold_with<F: TypeFolder + ?Sized>(self, folder: &mut F) -> Self {
        folder.fold_ty(self)
    }

    fn visit_with<V: TypeVisitor + ?Sized>(&self, visitor: &mut V) -> bool {
        visitor.visit_ty(self)
    }
}

impl<T: TypeFoldable> TypeFoldable for Vec<T> {
    fn fold_with<F: TypeFolder + ?Sized>(self, folder: &mut F) -> Self {
        self.into_iter().map(|t| t.fold_with(folder)).collect()
    }

    fn visit_with<V: TypeVisitor + ?Sized>(&self, visitor: &mut V) -> bool {
        self.iter().any(|t| t.visit_with(visitor))
    }
}

impl<T: TypeFoldable> TypeFoldable for Option<T> {
    fn fold_with<F: TypeFolder + ?Sized>(self, folder: &mut F) -> Self {
        self.map(|t| t.fold_with(folder))
    }

    fn visit_with<V: TypeVisitor + ?Sized>(&self, visitor: &mut V) -> bool {
        self.as_ref().is_some_and(|t| t.visit_with(visitor))
    }
}

impl<A: TypeFoldable, B: TypeFoldable> TypeFoldable for (A, B) {
    fn fold_with<F: TypeFolder + ?Sized>(self, folder: &mut F) -> Self {
        (self.0.fold_with(folder), self.1.fold_with(folder))
    }

    fn visit_with<V: TypeVisitor + ?Sized>(&self, visitor: &mut V) -> bool {
        self.0.visit_with(visitor) || self.1.visit_with(visitor)
    }
}

impl TypeFoldable for String {
    fn fold_with<F: TypeFolder + ?Sized>(self, _folder: &mut F) -> Self {
        self
    }

    fn visit_with<V: TypeVisitor + ?Sized>(&self, _visitor: &mut V) -> bool {
        false
    }
}

impl TypeFoldable for FnSig {
    fn fold_with<F: TypeFolder + ?Sized>(self, folder: &mut F) -> Self {
        FnSig { params: self.params.fold_with(folder), ret: Box::new(folder.fold_ty(*self.ret)) }
    }

    fn visit_with<V: TypeVisitor + ?Sized>(&self, visitor: &mut V) -> bool {
        self.params.visit_with(visitor) || visitor.visit_ty(&self.ret)
    }
}

impl TypeFoldable for TraitRef {
    fn fold_with<F: TypeFolder + ?Sized>(self, folder: &mut F) -> Self {
        TraitRef {
            self_ty: folder.fold_ty(self.self_ty),
            trait_id: self.trait_id,
            args: self.args.fold_with(folder),
        }
    }

    fn visit_with<V: TypeVisitor + ?Sized>(&self, visitor: &mut V) -> bool {
        visitor.visit_ty(&self.self_ty) || self.args.visit_with(visitor)
    }
}

impl TypeFoldable for BoundTrait {
    fn fold_with<F: TypeFolder + ?Sized>(self, folder: &mut F) -> Self {
        BoundTrait {
            trait_id: self.trait_id,
            args: self.args.fold_with(folder),
            assoc: self.assoc.fold_with(folder),
        }
    }

    fn visit_with<V: TypeVisitor + ?Sized>(&self, visitor: &mut V) -> bool {
        self.args.visit_with(visitor) || self.assoc.visit_with(visitor)
    }
}

impl TypeFoldable for ProjectionTy {
    fn fold_with<F: TypeFolder + ?Sized>(self, folder: &mut F) -> Self {
        ProjectionTy { trait_ref: self.trait_ref.fold_with(folder), name: self.name }
    }

    fn visit_with<V: TypeVisitor + ?Sized>(&self, visitor: &mut V) -> bool {
        self.trait_ref.visit_with(visitor)
    }
}
