//! Call expressions and argument inference.

use quarry_hir::body::ExprId;
use quarry_hir::item::{VariantRef, VariantShape};
use quarry_hir::ty::{FnSig, Ty};
use quarry_hir::ValueNs;

use super::{fn_sig_from_bound, InferResult, InferenceWalker};

impl InferenceWalker<'_, '_> {
    /// Infer the type of `callee(args..)`.
    pub(super) fn infer_call(
        &mut self,
        callee: ExprId,
        args: &[ExprId],
        expected: Option<&Ty>,
    ) -> InferResult<Ty> {
        let callee_ty = self.infer_expr(callee, None)?;
        let callee_ty = self.ctx.resolve_vars_with_obligations(callee_ty);

        if self.is_fieldless_ctor(callee) {
            for arg in args {
                self.infer_expr(*arg, None)?;
            }
            return Ok(callee_ty);
        }

        let sig = self.as_fn_sig(&callee_ty).unwrap_or_else(|| FnSig::unknown(args.len()));
        if let Some(expected) = expected {
            self.ctx.combine_types(expected, &sig.ret);
        }
        self.infer_arguments(&sig.params, args)?;
        Ok(*sig.ret)
    }

    /// `S()` where `S` is a unit struct or variant: the callee already is
    /// the value.
    fn is_fieldless_ctor(&self, callee: ExprId) -> bool {
        let items = self.ctx.items();
        let variant = match self.ctx.resolved_path_of(callee) {
            [ValueNs::Struct(adt)] => VariantRef::Struct(*adt),
            [ValueNs::Variant(adt, idx)] => VariantRef::EnumVariant(*adt, *idx),
            _ => return false,
        };
        matches!(items[variant.adt()].shape(variant), Some(VariantShape::Unit))
    }

    /// The signature `ty` can be called with: a function type, a closure,
    /// or anything bounded by one of the fn traits.
    pub(super) fn as_fn_sig(&mut self, ty: &Ty) -> Option<FnSig> {
        let known = self.ctx.known();
        match ty {
            Ty::Fn(sig) => Some(sig.clone()),
            Ty::Dyn(bound) => fn_sig_from_bound(known, bound),
            Ty::Opaque(opaque) => {
                opaque.bounds.iter().find_map(|bound| fn_sig_from_bound(known, bound))
            }
            Ty::Param(_) => {
                self.ctx.env.bounds_for(ty).find_map(|bound| fn_sig_from_bound(known, bound))
            }
            Ty::Ref(inner, ..) => {
                let inner = self.ctx.shallow_resolve(inner);
                self.as_fn_sig(&inner)
            }
            _ => None,
        }
    }

    /// Arguments are inferred in two passes: everything but closures first,
    /// then closures, so a closure sees parameter types the other arguments
    /// already pinned down.
    pub(super) fn infer_arguments(&mut self, params: &[Ty], args: &[ExprId]) -> InferResult<()> {
        for closures in [false, true] {
            if closures {
                self.ctx.select_where_possible();
            }
            for (i, arg) in args.iter().enumerate() {
                if self.body.is_closure(*arg) != closures {
                    continue;
                }
                let param = params.get(i).cloned().unwrap_or(Ty::Unknown);
                let param = self.ctx.resolve_vars_if_possible(param);
                self.infer_expr_coercable_to(*arg, &param)?;
            }
        }
        Ok(())
    }
}
