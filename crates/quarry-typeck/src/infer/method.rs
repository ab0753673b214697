//! Method calls and field accesses.
//!
//! Method lookup collects every same-named function reachable from some
//! step of the receiver's dereference sequence, then narrows the set in
//! four stages:
//!
//! 1. keep inherent methods and methods of traits in scope (unless that
//!    leaves nothing);
//! 2. drop impl candidates whose where-clauses cannot hold;
//! 3. walk the dereference sequence again and keep the candidates whose
//!    self parameter accepts the first step that matches, by value, then
//!    by `&`, then by `&mut`;
//! 4. if several remain and all implement the same trait, stand in that
//!    trait's declaration for them.
//!
//! Stages only apply while more than one candidate is left.

use quarry_hir::body::{ExprId, FieldName};
use quarry_hir::item::{AdtKind, FnOwner, FunctionId, ImplId, TraitId, TypeParamId, VariantRef};
use quarry_hir::ty::{BoundTrait, InferTy, Mutability, Region, TraitRef, Ty};
use quarry_hir::Substitution;

use super::path::collapse_to_trait;
use super::{fn_output_ty, self_param_ty, InferResult, InferenceWalker};
use crate::obligation::Obligation;
use crate::result::{Adjustment, FieldResolution, MethodResolution, MethodSource};

#[derive(Clone, Debug)]
enum CandidateSource {
    Impl(ImplId),
    Bound(BoundTrait),
    Object(BoundTrait),
    Collapsed(TraitId),
}

#[derive(Clone, Debug)]
struct MethodCandidate {
    func: FunctionId,
    /// The dereference step the candidate was found at.
    self_ty: Ty,
    deref_count: usize,
    source: CandidateSource,
}

impl MethodCandidate {
    fn resolution(&self) -> MethodResolution {
        let source = match &self.source {
            CandidateSource::Impl(imp) => MethodSource::Impl(*imp),
            CandidateSource::Bound(bound) => MethodSource::TraitBound(bound.trait_id),
            CandidateSource::Object(bound) => MethodSource::Object(bound.trait_id),
            CandidateSource::Collapsed(tr) => MethodSource::Collapsed(*tr),
        };
        MethodResolution {
            func: self.func,
            self_ty: self.self_ty.clone(),
            deref_count: self.deref_count,
            source,
        }
    }
}

impl InferenceWalker<'_, '_> {
    /// Infer the type of `receiver.method::<generic_args>(args..)`.
    pub(super) fn infer_method_call(
        &mut self,
        expr: ExprId,
        receiver: ExprId,
        method: &str,
        generic_args: &[Ty],
        args: &[ExprId],
        expected: Option<&Ty>,
    ) -> InferResult<Ty> {
        let receiver_ty = self.infer_expr(receiver, None)?;
        let receiver_ty = self.ctx.resolve_vars_with_obligations(receiver_ty);
        let steps = self.ctx.deref_sequence(&receiver_ty);

        let candidates = self.method_candidates(&steps, method);
        let picked = self.pick_method(expr, &steps, candidates.clone());
        let recorded = match &picked {
            Some(callee) => vec![callee.clone()],
            None => candidates,
        };
        let resolutions = recorded.iter().map(MethodCandidate::resolution).collect();
        self.ctx.write_resolved_method(expr, resolutions);

        let Some(callee) = picked.or_else(|| recorded.first().cloned()) else {
            tracing::debug!(?expr, method, receiver = %receiver_ty, "no method candidates");
            self.infer_arguments(&[], args)?;
            return Ok(Ty::Unknown);
        };

        let (params, ret) = self.instantiate_method(expr, &callee, generic_args);
        let items = self.ctx.items();
        let data = &items[callee.func];
        if let Some(expected) = expected {
            if !data.is_async {
                self.ctx.combine_types(expected, &ret);
            }
        }
        if let Some(param) = &data.self_param {
            let self_param = self_param_ty(param, callee.self_ty.clone());
            self.adjust_receiver(receiver, &steps, &self_param);
        }
        self.infer_arguments(&params, args)?;
        Ok(ret)
    }

    // ── Candidates ─────────────────────────────────────────────────────

    fn method_candidates(&mut self, steps: &[Ty], name: &str) -> Vec<MethodCandidate> {
        let items = self.ctx.items();
        let mut candidates = Vec::new();
        for (depth, step) in steps.iter().enumerate() {
            if matches!(step, Ty::Unknown | Ty::Infer(InferTy::TyVar(_))) {
                continue;
            }
            let mut push = |func: FunctionId, source: CandidateSource| {
                let self_ty = step.clone();
                candidates.push(MethodCandidate { func, self_ty, deref_count: depth, source });
            };

            for imp in items.inherent_impls().iter().copied().chain(items.trait_impls()) {
                let Some(func) = items.impl_method(imp, name) else {
                    continue;
                };
                if self.impl_self_may_match(imp, step) {
                    push(func, CandidateSource::Impl(imp));
                }
            }
            for bound in self.ctx.env.bounds_for(step) {
                if let Some(func) = items.trait_method(bound.trait_id, name) {
                    push(func, CandidateSource::Bound(bound.clone()));
                }
            }
            let object_bounds: &[BoundTrait] = match step {
                Ty::Dyn(bound) => std::slice::from_ref(bound),
                Ty::Opaque(opaque) => &opaque.bounds,
                _ => &[],
            };
            for bound in object_bounds {
                if let Some(func) = items.trait_method(bound.trait_id, name) {
                    push(func, CandidateSource::Object(bound.clone()));
                }
            }
        }
        candidates
    }

    fn impl_self_may_match(&mut self, imp: ImplId, ty: &Ty) -> bool {
        let data = &self.ctx.items()[imp];
        self.ctx.in_snapshot(|ctx| {
            let subst = ctx.fresh_subst(&data.generics);
            ctx.combine_types(ty, &subst.apply(data.self_ty.clone()))
        })
    }

    // ── Picking ────────────────────────────────────────────────────────

    fn pick_method(
        &mut self,
        expr: ExprId,
        steps: &[Ty],
        candidates: Vec<MethodCandidate>,
    ) -> Option<MethodCandidate> {
        let items = self.ctx.items();
        let mut candidates = candidates;

        if candidates.len() > 1 {
            let in_scope = self.ctx.session.db().traits_in_scope(self.ctx.owner, expr);
            let visible: Vec<_> = candidates
                .iter()
                .filter(|c| match &c.source {
                    CandidateSource::Impl(imp) => {
                        items[*imp].trait_id().map_or(true, |tr| in_scope.contains(&tr))
                    }
                    _ => true,
                })
                .cloned()
                .collect();
            if visible.is_empty() {
                tracing::debug!(?expr, "no candidate from a trait in scope, keeping all");
            } else {
                candidates = visible;
            }
        }

        if candidates.len() > 1 {
            candidates.retain(|c| match &c.source {
                CandidateSource::Impl(imp) => {
                    let self_ty = c.self_ty.clone();
                    self.ctx.can_evaluate_bounds(*imp, &self_ty)
                }
                _ => true,
            });
        }

        if candidates.len() > 1 {
            candidates = self.filter_by_receiver(steps, candidates);
        }

        match candidates.len() {
            0 => None,
            1 => candidates.pop(),
            _ => {
                let funcs: Vec<FunctionId> = candidates.iter().map(|c| c.func).collect();
                let trait_fn = collapse_to_trait(items, &funcs)?;
                let first = &candidates[0];
                let trait_id = items.fn_trait(trait_fn)?;
                tracing::debug!(
                    ?expr,
                    ?trait_fn,
                    candidates = funcs.len(),
                    "collapsed method to trait function"
                );
                Some(MethodCandidate {
                    func: trait_fn,
                    self_ty: first.self_ty.clone(),
                    deref_count: first.deref_count,
                    source: CandidateSource::Collapsed(trait_id),
                })
            }
        }
    }

    /// The candidates whose self parameter accepts the first step (or its
    /// `&`/`&mut` borrow) that any candidate accepts.
    fn filter_by_receiver(
        &mut self,
        steps: &[Ty],
        candidates: Vec<MethodCandidate>,
    ) -> Vec<MethodCandidate> {
        let items = self.ctx.items();
        let self_params: Vec<Option<Ty>> = candidates
            .iter()
            .map(|c| {
                let param = items[c.func].self_param.as_ref()?;
                Some(self.ctx.resolve_vars_if_possible(self_param_ty(param, c.self_ty.clone())))
            })
            .collect();
        for step in steps {
            let step = self.ctx.resolve_vars_if_possible(step.clone());
            let forms = [
                step.clone(),
                Ty::reference(step.clone(), Mutability::Not),
                Ty::reference(step, Mutability::Mut),
            ];
            for form in &forms {
                let picked: Vec<MethodCandidate> = candidates
                    .iter()
                    .zip(&self_params)
                    .filter(|(_, param)| param.as_ref() == Some(form))
                    .map(|(c, _)| c.clone())
                    .collect();
                if !picked.is_empty() {
                    return picked;
                }
            }
        }
        Vec::new()
    }

    // ── Instantiation ──────────────────────────────────────────────────

    /// Fresh variables for the callee's generics; returns its parameter
    /// types (without the self parameter) and its return type.
    fn instantiate_method(
        &mut self,
        expr: ExprId,
        callee: &MethodCandidate,
        generic_args: &[Ty],
    ) -> (Vec<Ty>, Ty) {
        let items = self.ctx.items();
        let data = &items[callee.func];

        let mut subst = match &callee.source {
            CandidateSource::Impl(imp) => {
                let impl_data = &items[*imp];
                let impl_subst = self.instantiate_generics(&impl_data.generics, None);
                let impl_self = impl_subst.apply(impl_data.self_ty.clone());
                self.ctx.combine_types(&callee.self_ty, &impl_self);
                match (data.owner, &impl_data.trait_ref) {
                    // A default body inherited from the trait.
                    (FnOwner::Trait(tr), Some((_, trait_args))) => {
                        let trait_args = impl_subst.apply(trait_args.clone());
                        Substitution::from_pairs(
                            items[tr].generics.params.iter().copied().zip(trait_args),
                        )
                    }
                    _ => impl_subst,
                }
            }
            CandidateSource::Bound(bound) | CandidateSource::Object(bound) => {
                let params = items[bound.trait_id].generics.params.iter().copied();
                Substitution::from_pairs(params.zip(bound.args.iter().cloned()))
            }
            CandidateSource::Collapsed(tr) => {
                let trait_generics = &items[*tr].generics;
                let subst = self.instantiate_generics(trait_generics, Some(callee.self_ty.clone()));
                let trait_args = subst.apply(trait_generics.param_tys());
                let trait_ref = TraitRef::new(callee.self_ty.clone(), *tr, trait_args);
                self.ctx.register_obligation(Obligation::trait_bound(0, trait_ref.clone()));
                self.ctx.register_method_refinement(expr, trait_ref);
                subst
            }
        };
        subst.insert(TypeParamId::SELF, callee.self_ty.clone());

        let own = self.ctx.fresh_subst(&data.generics);
        for (param, arg) in data.generics.params.iter().zip(generic_args) {
            if let Some(var) = own.get(*param) {
                self.ctx.combine_types(var, arg);
            }
        }
        let subst = subst.union(&own);
        self.register_bounds(&data.generics, &subst);

        let params = subst.apply(data.params.clone());
        let ret = subst.apply(fn_output_ty(self.ctx.known(), data));
        let params = self.ctx.normalize_and_register(params);
        let ret = self.ctx.normalize_and_register(ret);
        (params, ret)
    }

    /// Records how the receiver is turned into the self argument: the
    /// dereferences down to the accepting step, then a borrow when the
    /// method takes `&self` or `&mut self`.
    fn adjust_receiver(&mut self, receiver: ExprId, steps: &[Ty], self_param: &Ty) {
        let self_param = self.ctx.resolve_vars_if_possible(self_param.clone());
        for (depth, step) in steps.iter().enumerate() {
            let step = self.ctx.resolve_vars_if_possible(step.clone());
            let borrow = if step == self_param {
                None
            } else if let Ty::Ref(inner, mutability, _) = &self_param {
                if **inner != step {
                    continue;
                }
                Some(Adjustment::BorrowReference {
                    target: self_param.clone(),
                    region: Region::erased(),
                    mutability: *mutability,
                })
            } else {
                continue;
            };
            let derefs = steps[1..=depth].iter().cloned().map(Adjustment::Deref);
            self.ctx.add_adjustments(receiver, derefs.chain(borrow));
            return;
        }
    }

    // ── Fields ─────────────────────────────────────────────────────────

    /// Infer the type of `receiver.name` through the receiver's
    /// dereference sequence; the shallowest match wins.
    pub(super) fn infer_field(
        &mut self,
        expr: ExprId,
        receiver: ExprId,
        name: &FieldName,
    ) -> InferResult<Ty> {
        let receiver_ty = self.infer_expr(receiver, None)?;
        let steps = self.ctx.deref_sequence(&receiver_ty);
        let items = self.ctx.items();

        for (depth, step) in steps.iter().enumerate() {
            let found = match (step, name) {
                (Ty::Adt(adt, args), _) => {
                    let data = &items[*adt];
                    let AdtKind::Struct(shape) = &data.kind else {
                        continue;
                    };
                    let field = match name {
                        FieldName::Named(field) => shape.field(field),
                        FieldName::Index(index) => shape.tuple_field(*index).map(|ty| (*index, ty)),
                    };
                    field.map(|(index, ty)| {
                        let params = data.generics.params.iter().copied();
                        let subst = Substitution::from_pairs(params.zip(args.iter().cloned()));
                        let variant = VariantRef::Struct(*adt);
                        (FieldResolution::Field { variant, index }, subst.apply(ty.clone()))
                    })
                }
                (Ty::Tuple(elems), FieldName::Index(index)) => {
                    elems.get(*index).map(|ty| (FieldResolution::TupleIndex(*index), ty.clone()))
                }
                _ => None,
            };
            if let Some((resolution, ty)) = found {
                if depth > 0 {
                    let derefs = steps[1..=depth].iter().cloned().map(Adjustment::Deref);
                    self.ctx.add_adjustments(receiver, derefs);
                }
                self.ctx.write_resolved_field(expr, vec![resolution]);
                return Ok(self.ctx.normalize_and_register(ty));
            }
        }

        tracing::trace!(?expr, receiver = %receiver_ty, "unresolved field");
        self.ctx.write_resolved_field(expr, Vec::new());
        Ok(Ty::Unknown)
    }
}
