//! Closure literals.
//!
//! A closure's type is a plain function type. Parameter and return types
//! come from annotations, else from what the context expects: a function
//! type, a fn-trait object, or the fn-trait obligations pending on the
//! variable the closure is about to be unified with.

use quarry_hir::body::{BlockKind, ClosureParam, Expr, ExprId};
use quarry_hir::ty::{BoundTrait, FnSig, InferTy, OpaqueTy, Ty};

use super::{fn_sig_from_bound, future_ty, InferResult, InferenceWalker};
use crate::obligation::Predicate;

impl InferenceWalker<'_, '_> {
    /// Infer the type of `|params| body`.
    pub(super) fn infer_closure(
        &mut self,
        params: &[ClosureParam],
        ret: Option<&Ty>,
        body: ExprId,
        is_async: bool,
        expected: Option<&Ty>,
    ) -> InferResult<Ty> {
        let deduced = expected.and_then(|expected| self.deduce_closure_sig(expected));
        let deduced = deduced.unwrap_or_else(|| FnSig::unknown(params.len()));

        let mut param_tys = Vec::with_capacity(params.len());
        for (i, param) in params.iter().enumerate() {
            let ty = match &param.ty {
                Some(annotated) => self.ctx.normalize_and_register(annotated.clone()),
                None => deduced.params.get(i).cloned().unwrap_or(Ty::Unknown),
            };
            self.infer_pat(param.pat, &ty)?;
            param_tys.push(ty);
        }

        let declared_ret = match ret {
            Some(annotated) => Some(self.ctx.normalize_and_register(annotated.clone())),
            None if !matches!(*deduced.ret, Ty::Unknown) => Some((*deduced.ret).clone()),
            None => None,
        };
        let fresh_ret = declared_ret.is_none();
        let ret_ty = declared_ret.unwrap_or_else(|| self.ctx.new_ty_var());

        let saved_return = std::mem::replace(&mut self.return_ty, ret_ty.clone());
        let saved_try = std::mem::replace(&mut self.try_ty, Some(ret_ty.clone()));
        let saved_yield = self.yield_ty.take();
        let result = self.infer_closure_body(body);
        self.return_ty = saved_return;
        self.try_ty = saved_try;
        let yield_ty = std::mem::replace(&mut self.yield_ty, saved_yield);
        result?;

        let ret_ty = match ret_ty.as_ty_var() {
            Some(var) if fresh_ret && !self.ctx.is_ty_var_affected(var) => Ty::unit(),
            _ => ret_ty,
        };
        let ty = match yield_ty {
            Some(yield_ty) => {
                // Only bare `yield`s: the generator yields unit.
                let yield_ty = match yield_ty.as_ty_var() {
                    Some(var) if !self.ctx.is_ty_var_affected(var) => Ty::unit(),
                    _ => yield_ty,
                };
                self.generator_ty(yield_ty, ret_ty)
            }
            None if is_async => Ty::function(param_tys, future_ty(self.ctx.known(), ret_ty)),
            None => Ty::function(param_tys, ret_ty),
        };
        Ok(ty)
    }

    fn infer_closure_body(&mut self, body: ExprId) -> InferResult<()> {
        let is_block = matches!(
            self.body[body],
            Expr::Block { kind: BlockKind::Plain | BlockKind::Unsafe, label: None, .. }
        );
        if is_block {
            self.infer_body_root(body)
        } else {
            let return_ty = self.return_ty.clone();
            self.infer_expr_coercable_to(body, &return_ty)?;
            Ok(())
        }
    }

    /// What the context says the closure's signature should be.
    fn deduce_closure_sig(&mut self, expected: &Ty) -> Option<FnSig> {
        let known = self.ctx.known();
        match expected {
            Ty::Fn(sig) => Some(sig.clone()),
            Ty::Dyn(bound) => fn_sig_from_bound(known, bound),
            Ty::Opaque(opaque) => {
                opaque.bounds.iter().find_map(|bound| fn_sig_from_bound(known, bound))
            }
            Ty::Infer(InferTy::TyVar(_)) => self.deduce_sig_from_obligations(expected),
            _ => None,
        }
    }

    /// Reads `?F: Fn(args)` and `<?F as Fn(args)>::Output == R` back from
    /// the pending obligations on `var`.
    fn deduce_sig_from_obligations(&mut self, var: &Ty) -> Option<FnSig> {
        let known = self.ctx.known();
        let var = self.ctx.shallow_resolve(var);
        let pending: Vec<Predicate> =
            self.ctx.fulfill.pending().iter().map(|o| o.predicate.clone()).collect();

        let mut params = None;
        let mut ret = None;
        for predicate in pending {
            match predicate {
                Predicate::Trait(trait_ref)
                    if known.is_fn_trait(trait_ref.trait_id) && params.is_none() =>
                {
                    if self.ctx.shallow_resolve(&trait_ref.self_ty) != var {
                        continue;
                    }
                    let args = trait_ref.args.first().cloned();
                    let args = args.map(|a| self.ctx.resolve_vars_if_possible(a));
                    if let Some(Ty::Tuple(args)) = args {
                        params = Some(args);
                    }
                }
                Predicate::Projection(proj, ty)
                    if known.is_fn_trait(proj.trait_ref.trait_id) && proj.name == "Output" =>
                {
                    if ret.is_none() && self.ctx.shallow_resolve(proj.self_ty()) == var {
                        ret = Some(ty);
                    }
                }
                _ => {}
            }
        }
        let params = params?;
        Some(FnSig::new(params, ret.unwrap_or(Ty::Unknown)))
    }

    /// `impl Generator<Yield = yield_ty, Return = ret>`.
    fn generator_ty(&mut self, yield_ty: Ty, ret: Ty) -> Ty {
        match self.ctx.known().generator {
            Some(generator) => {
                let bound = BoundTrait::new(generator, Vec::new())
                    .with_assoc("Yield", yield_ty)
                    .with_assoc("Return", ret);
                Ty::Opaque(OpaqueTy { def: None, bounds: vec![bound] })
            }
            None => Ty::Unknown,
        }
    }
}
