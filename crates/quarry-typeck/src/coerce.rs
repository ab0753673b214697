//! Implicit coercions at typed slots.
//!
//! Tried in order: `&[T; N]` to `&[T]`, reference to raw pointer (and
//! `*mut` to `*const`), reborrow through the dereference sequence, and
//! finally plain unification.

use quarry_hir::body::ExprId;
use quarry_hir::ty::{Mutability, Region, Ty};

use crate::context::InferCtx;
use crate::result::Adjustment;

/// `&mut` may be used where `&` is expected, not the other way round.
fn coerce_mutability(from: Mutability, to: Mutability) -> bool {
    from == to || (from.is_mut() && !to.is_mut())
}

impl<'a> InferCtx<'a> {
    /// Coerces the value of `expr` from `inferred` to `expected`, reporting
    /// a mismatch on failure.
    pub fn coerce(&mut self, expr: ExprId, inferred: &Ty, expected: &Ty) -> bool {
        let inferred = self.resolve_vars_with_obligations(inferred.clone());
        let expected = self.resolve_vars_with_obligations(expected.clone());
        let ok = self.try_coerce(expr, &inferred, &expected);
        if !ok {
            self.report_type_mismatch(expr.into(), &expected, &inferred);
        }
        ok
    }

    /// Like `coerce`, without reporting.
    pub fn try_coerce(&mut self, expr: ExprId, inferred: &Ty, expected: &Ty) -> bool {
        let inferred = self.shallow_resolve(inferred);
        let expected = self.shallow_resolve(expected);
        match (&inferred, &expected) {
            (Ty::Ref(from, from_mut, _), Ty::Ref(to, to_mut, _))
                if coerce_mutability(*from_mut, *to_mut) =>
            {
                let from = self.shallow_resolve(from);
                let to = self.shallow_resolve(to);
                if let (Ty::Array(elem, _), Ty::Slice(slice_elem)) = (&from, &to) {
                    return self.combine_types(elem, slice_elem);
                }
                self.coerce_reference(expr, &inferred, &to, *to_mut)
            }
            (Ty::Ref(from, from_mut, _), Ty::Ptr(to, to_mut))
                if coerce_mutability(*from_mut, *to_mut) =>
            {
                let ok = self.combine_types(from, to);
                if ok {
                    let borrow =
                        Adjustment::BorrowPointer { target: expected.clone(), mutability: *to_mut };
                    self.add_adjustments(expr, [borrow]);
                }
                ok
            }
            (Ty::Ptr(from, Mutability::Mut), Ty::Ptr(to, Mutability::Not)) => {
                self.combine_types(from, to)
            }
            _ => self.combine_types(&inferred, &expected),
        }
    }

    /// Reborrow: `&U` coerces to `&T` when some dereference of `U` is `T`.
    /// The shallowest match wins; a direct match needs no adjustment.
    fn coerce_reference(
        &mut self,
        expr: ExprId,
        inferred: &Ty,
        to: &Ty,
        to_mut: Mutability,
    ) -> bool {
        let seq = self.deref_sequence(inferred);
        for (depth, target) in seq.iter().enumerate().skip(1) {
            let candidate = Ty::reference(target.clone(), to_mut);
            let expected = Ty::reference(to.clone(), to_mut);
            if !self.combine_types_if_ok(&candidate, &expected) {
                continue;
            }
            if depth > 1 {
                let derefs = seq[1..=depth].iter().cloned().map(Adjustment::Deref);
                let borrow = Adjustment::BorrowReference {
                    target: candidate,
                    region: Region::erased(),
                    mutability: to_mut,
                };
                self.add_adjustments(expr, derefs.chain([borrow]));
            }
            return true;
        }
        false
    }
}
