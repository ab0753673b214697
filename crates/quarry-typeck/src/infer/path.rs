//! Path expressions, constructors and struct literals.

use quarry_hir::body::{BodyOwner, ExprId, Path, StructField};
use quarry_hir::item::{ConstId, FnOwner, FunctionId, TypeParamId, VariantRef, VariantShape};
use quarry_hir::ty::{TraitRef, Ty};
use quarry_hir::{ItemTree, PathResolution, Substitution, ValueNs};

use super::{fn_value_ty, InferResult, InferenceWalker};
use crate::error::InferError;
use crate::obligation::Obligation;

/// The trait function standing in for several same-named functions, when
/// every one of them is an impl of (or a default in) the same trait.
pub(crate) fn collapse_to_trait(items: &ItemTree, funcs: &[FunctionId]) -> Option<FunctionId> {
    let (first, rest) = funcs.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let trait_id = items.fn_trait(*first)?;
    if rest.iter().any(|func| items.fn_trait(*func) != Some(trait_id)) {
        return None;
    }
    items.trait_method(trait_id, &items[*first].name)
}

impl InferenceWalker<'_, '_> {
    /// Infer the type of a path expression from its resolutions.
    pub(super) fn infer_path(&mut self, expr: ExprId, path: &Path) -> InferResult<Ty> {
        let db = self.ctx.session.db();
        let items = self.ctx.items();
        let resolutions = db.resolve_path(self.ctx.owner, expr);
        self.ctx.write_path(expr, resolutions.iter().map(|res| res.value).collect());

        let funcs: Vec<FunctionId> = resolutions
            .iter()
            .filter_map(|res| match res.value {
                ValueNs::Function(func) => Some(func),
                _ => None,
            })
            .collect();
        if resolutions.len() > 1 && funcs.len() == resolutions.len() && path.is_qualified() {
            if let Some(trait_fn) = collapse_to_trait(items, &funcs) {
                tracing::debug!(
                    ?expr,
                    ?trait_fn,
                    candidates = funcs.len(),
                    "collapsed path to trait function"
                );
                let subst = self.collapse_subst(trait_fn, &funcs, &resolutions);
                let collapsed = PathResolution::with_subst(ValueNs::Function(trait_fn), subst);
                return self.instantiate_value(expr, &collapsed, true);
            }
        }

        match resolutions.as_slice() {
            [single] => self.instantiate_value(expr, single, true),
            _ => Ok(Ty::Unknown),
        }
    }

    /// Explicit arguments for the collapsed trait function: a position
    /// keeps its argument when every candidate agrees on it, otherwise it
    /// gets a fresh variable. `Self` comes from the first candidate.
    fn collapse_subst(
        &mut self,
        trait_fn: FunctionId,
        funcs: &[FunctionId],
        resolutions: &[PathResolution],
    ) -> Substitution {
        let items = self.ctx.items();
        let mut collapsed = Substitution::new();
        for (i, param) in items[trait_fn].generics.params.iter().enumerate() {
            let mut agreed: Option<Ty> = None;
            let mut conflict = false;
            for (func, res) in funcs.iter().zip(resolutions) {
                let arg = items[*func].generics.params.get(i).and_then(|p| res.subst.get(*p));
                let Some(arg) = arg else {
                    continue;
                };
                match &agreed {
                    None => agreed = Some(arg.clone()),
                    Some(prev) if prev != arg => conflict = true,
                    Some(_) => {}
                }
            }
            match agreed {
                Some(_) if conflict => collapsed.insert(*param, self.ctx.new_ty_var()),
                Some(arg) => collapsed.insert(*param, arg),
                None => {}
            }
        }
        let first_self = resolutions.first().and_then(|res| res.subst.get(TypeParamId::SELF));
        if let Some(self_ty) = first_self {
            collapsed.insert(TypeParamId::SELF, self_ty.clone());
        }
        collapsed
    }

    /// The type of the value a path resolved to, with fresh variables for
    /// everything generic.
    fn instantiate_value(
        &mut self,
        expr: ExprId,
        res: &PathResolution,
        try_refine: bool,
    ) -> InferResult<Ty> {
        match res.value {
            ValueNs::Local(pat) => Ok(self.ctx.binding_ty(pat)),
            ValueNs::Function(func) => Ok(self.instantiate_fn(expr, func, &res.subst, try_refine)),
            ValueNs::Const(konst) => self.const_ty(konst),
            ValueNs::Struct(adt) => Ok(self.instantiate_ctor(VariantRef::Struct(adt), &res.subst)),
            ValueNs::Variant(adt, idx) => {
                Ok(self.instantiate_ctor(VariantRef::EnumVariant(adt, idx), &res.subst))
            }
        }
    }

    fn instantiate_fn(
        &mut self,
        expr: ExprId,
        func: FunctionId,
        explicit: &Substitution,
        try_refine: bool,
    ) -> Ty {
        let items = self.ctx.items();
        let data = &items[func];

        let mut subst = match data.owner {
            FnOwner::Free => Substitution::new(),
            FnOwner::Impl(imp) => {
                let impl_data = &items[imp];
                let mut subst = self.instantiate_generics(&impl_data.generics, None);
                let self_ty = subst.apply(impl_data.self_ty.clone());
                if let Some(explicit_self) = explicit.get(TypeParamId::SELF) {
                    self.ctx.combine_types(&self_ty, explicit_self);
                }
                subst.insert(TypeParamId::SELF, self_ty);
                subst
            }
            FnOwner::Trait(tr) => {
                let self_ty = match explicit.get(TypeParamId::SELF) {
                    Some(ty) => ty.clone(),
                    None => self.ctx.new_ty_var(),
                };
                let trait_generics = &items[tr].generics;
                let subst = self.instantiate_generics(trait_generics, Some(self_ty.clone()));
                let trait_ref = TraitRef::new(self_ty, tr, subst.apply(trait_generics.param_tys()));
                self.ctx.register_obligation(Obligation::trait_bound(0, trait_ref.clone()));
                if try_refine {
                    self.ctx.register_path_refinement(expr, trait_ref);
                }
                subst
            }
        };

        let own = self.ctx.fresh_subst(&data.generics);
        subst = subst.union(&own);
        self.register_bounds(&data.generics, &subst);
        self.unify_subst(explicit, &subst);

        let ty = subst.apply(fn_value_ty(self.ctx.known(), data));
        self.ctx.normalize_and_register(ty)
    }

    /// A tuple-like constructor is a function from its fields; a unit or
    /// record one denotes the ADT itself.
    fn instantiate_ctor(&mut self, variant: VariantRef, explicit: &Substitution) -> Ty {
        let items = self.ctx.items();
        let adt = variant.adt();
        let data = &items[adt];
        let subst = self.instantiate_generics(&data.generics, None);
        self.unify_subst(explicit, &subst);
        let adt_ty = Ty::Adt(adt, subst.apply(data.generics.param_tys()));
        let ty = match data.shape(variant) {
            Some(VariantShape::Tuple(fields)) => Ty::function(subst.apply(fields.clone()), adt_ty),
            _ => adt_ty,
        };
        self.ctx.normalize_and_register(ty)
    }

    /// A constant's declared type, or the type of its body when the
    /// declaration has none. A constant whose body depends on itself is
    /// unknown.
    fn const_ty(&mut self, konst: ConstId) -> InferResult<Ty> {
        let items = self.ctx.items();
        if let Some(ty) = &items[konst].ty {
            return Ok(self.ctx.normalize_and_register(ty.clone()));
        }
        let owner = BodyOwner::Const(konst);
        let session = self.ctx.session;
        match session.infer(owner) {
            Ok(result) => Ok(session
                .db()
                .body(owner)
                .map(|body| result.expr_type(body.root))
                .unwrap_or(Ty::Unknown)),
            Err(InferError::Cancelled(cancelled)) => Err(cancelled),
            Err(err) => {
                tracing::debug!(%err, "constant type unavailable");
                Ok(Ty::Unknown)
            }
        }
    }

    // ── Struct literals ────────────────────────────────────────────────

    /// Infer the type of a struct literal: `S { a: 1, ..base }`.
    pub(super) fn infer_struct_literal(
        &mut self,
        expr: ExprId,
        fields: &[StructField],
        spread: Option<ExprId>,
        expected: Option<&Ty>,
    ) -> InferResult<Ty> {
        let db = self.ctx.session.db();
        let items = self.ctx.items();
        let Some((variant, explicit)) = db.resolve_variant(self.ctx.owner, expr.into()) else {
            for field in fields {
                self.infer_expr(field.expr, None)?;
            }
            if let Some(spread) = spread {
                self.infer_expr(spread, None)?;
            }
            return Ok(Ty::Unknown);
        };

        let adt = variant.adt();
        let data = &items[adt];
        let subst = self.instantiate_generics(&data.generics, None);
        self.unify_subst(&explicit, &subst);
        let args = subst.apply(data.generics.param_tys());
        if let Some(Ty::Adt(expected_adt, expected_args)) = expected {
            if *expected_adt == adt {
                self.ctx.combine_pairs(&args, expected_args);
            }
        }
        let ty = Ty::Adt(adt, args);

        for field in fields {
            let declared = data
                .shape(variant)
                .and_then(|shape| shape.field(&field.name))
                .map(|(_, ty)| ty.clone());
            let field_ty = match declared {
                Some(declared) => self.ctx.normalize_and_register(subst.apply(declared)),
                None => Ty::Unknown,
            };
            self.infer_expr_coercable_to(field.expr, &field_ty)?;
        }
        if let Some(spread) = spread {
            self.infer_expr_coercable_to(spread, &ty)?;
        }
        Ok(ty)
    }
}
