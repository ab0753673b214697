//! Blocks, conditionals, loops and the `?`/`.await`/`yield` family.

use quarry_hir::body::{BlockKind, ExprId, MatchArm, PatId, Statement};
use quarry_hir::ty::{InferTy, ProjectionTy, TraitRef, Ty};

use super::{future_ty, InferResult, InferenceWalker};
use crate::obligation::Obligation;

impl InferenceWalker<'_, '_> {
    // ── Blocks ─────────────────────────────────────────────────────────

    /// Infer the type of a block expression of any kind.
    pub(super) fn infer_block_expr(
        &mut self,
        expr: ExprId,
        kind: BlockKind,
        stmts: &[Statement],
        tail: Option<ExprId>,
        expected: Option<&Ty>,
    ) -> InferResult<Ty> {
        match kind {
            BlockKind::Plain | BlockKind::Unsafe => {
                let ty = self.infer_block_stmts(stmts, tail, expected, false)?;
                Ok(self.labeled_expr_ty(expr, ty, true))
            }
            BlockKind::Async => self.infer_async_block(stmts, tail),
            BlockKind::Try => self.infer_try_block(stmts, tail, expected),
        }
    }

    /// Statements, then the tail. A block containing a diverging statement
    /// diverges.
    pub(super) fn infer_block_stmts(
        &mut self,
        stmts: &[Statement],
        tail: Option<ExprId>,
        expected: Option<&Ty>,
        coerce: bool,
    ) -> InferResult<Ty> {
        let mut diverges = false;
        for stmt in stmts {
            diverges |= self.infer_statement(stmt)?;
        }
        let ty = match (tail, expected) {
            (Some(tail), Some(expected)) if coerce => self.infer_expr_coercable_to(tail, expected)?,
            (Some(tail), _) => self.infer_expr(tail, expected)?,
            (None, _) => Ty::unit(),
        };
        Ok(if diverges { Ty::Never } else { ty })
    }

    /// Returns whether the statement diverges.
    fn infer_statement(&mut self, stmt: &Statement) -> InferResult<bool> {
        match stmt {
            Statement::Let { pat, ty, init } => self.infer_let(*pat, ty.as_ref(), *init),
            Statement::Expr(expr) => Ok(self.infer_expr(*expr, None)? == Ty::Never),
        }
    }

    fn infer_let(
        &mut self,
        pat: PatId,
        annotation: Option<&Ty>,
        init: Option<ExprId>,
    ) -> InferResult<bool> {
        let explicit = annotation.map(|ty| self.ctx.normalize_and_register(ty.clone()));
        let (diverges, inferred) = match init {
            Some(init) => {
                let inferred = self.infer_expr(init, explicit.as_ref())?;
                let diverges = inferred == Ty::Never;
                let coerced = match &explicit {
                    Some(explicit) if self.ctx.coerce(init, &inferred, explicit) => {
                        explicit.clone()
                    }
                    _ => inferred,
                };
                (diverges, coerced)
            }
            None => (false, self.ctx.new_ty_var()),
        };
        let pat_ty = match explicit {
            Some(explicit) => explicit,
            None => self.ctx.resolve_vars_with_obligations(inferred),
        };
        self.infer_pat(pat, &pat_ty)?;
        Ok(diverges)
    }

    /// `async { .. }`: a future of the block's value. `return` and `?`
    /// inside target the block.
    fn infer_async_block(&mut self, stmts: &[Statement], tail: Option<ExprId>) -> InferResult<Ty> {
        let output = self.ctx.new_ty_var();
        let saved_return = std::mem::replace(&mut self.return_ty, output.clone());
        let saved_try = std::mem::replace(&mut self.try_ty, Some(output.clone()));
        let result = self.infer_block_stmts(stmts, tail, Some(&output), false);
        self.return_ty = saved_return;
        self.try_ty = saved_try;

        let ty = result?;
        if ty != Ty::Never {
            self.ctx.combine_types(&output, &ty);
        }
        let output = self.ctx.resolve_vars_if_possible(output);
        Ok(future_ty(self.ctx.known(), output))
    }

    /// `try { .. }`: `?` inside propagates into the block's own type, whose
    /// `Ok` is the block's value.
    fn infer_try_block(
        &mut self,
        stmts: &[Statement],
        tail: Option<ExprId>,
        expected: Option<&Ty>,
    ) -> InferResult<Ty> {
        let try_ty = match expected {
            Some(expected) => expected.clone(),
            None => self.ctx.new_ty_var(),
        };
        let saved_try = std::mem::replace(&mut self.try_ty, Some(try_ty.clone()));
        let result = self.infer_block_stmts(stmts, tail, None, false);
        self.try_ty = saved_try;

        let ok = result?;
        if let Some(try_trait) = self.ctx.known().try_trait {
            let trait_ref = TraitRef::new(try_ty.clone(), try_trait, Vec::new());
            let proj = ProjectionTy::new(trait_ref, "Ok");
            self.ctx.register_obligation(Obligation::projection_eq(0, proj, ok));
        }
        Ok(try_ty)
    }

    // ── Conditionals ───────────────────────────────────────────────────

    /// Infer the type of `if`; without `else` it is unit.
    pub(super) fn infer_if(
        &mut self,
        condition: ExprId,
        then_branch: ExprId,
        else_branch: Option<ExprId>,
        expected: Option<&Ty>,
    ) -> InferResult<Ty> {
        self.infer_condition(condition)?;
        let then_ty = self.infer_expr(then_branch, expected)?;
        match else_branch {
            Some(else_branch) => {
                let else_ty = self.infer_expr(else_branch, expected)?;
                Ok(self.more_complete_ty(vec![then_ty, else_ty]))
            }
            None => Ok(Ty::unit()),
        }
    }

    /// Infer the type of `match`: the join of its arms.
    pub(super) fn infer_match(
        &mut self,
        scrutinee: ExprId,
        arms: &[MatchArm],
        expected: Option<&Ty>,
    ) -> InferResult<Ty> {
        let scrutinee_ty = self.infer_expr(scrutinee, None)?;
        let scrutinee_ty = self.ctx.resolve_vars_with_obligations(scrutinee_ty);
        let mut arm_tys = Vec::with_capacity(arms.len());
        for arm in arms {
            self.infer_pat(arm.pat, &scrutinee_ty)?;
            if let Some(guard) = arm.guard {
                self.infer_condition(guard)?;
            }
            arm_tys.push(self.infer_expr(arm.expr, expected)?);
        }
        Ok(self.more_complete_ty(arm_tys))
    }

    // ── Loops ──────────────────────────────────────────────────────────

    /// Infer the type of `for pat in iterable { .. }`; the pattern takes
    /// `IntoIterator::Item` of the iterable.
    pub(super) fn infer_for(
        &mut self,
        pat: PatId,
        iterable: ExprId,
        body: ExprId,
    ) -> InferResult<Ty> {
        let iterable_ty = self.infer_expr(iterable, None)?;
        let iterable_ty = self.ctx.resolve_vars_with_obligations(iterable_ty);
        let item_ty = match self.ctx.known().into_iterator {
            Some(into_iter) if !matches!(iterable_ty, Ty::Unknown) => {
                let trait_ref = TraitRef::new(iterable_ty, into_iter, Vec::new());
                let proj = ProjectionTy::new(trait_ref, "Item");
                let normalized = self.ctx.normalize_projection(&proj, 0);
                self.ctx.fulfill.register_all(normalized.obligations);
                self.ctx.resolve_vars_with_obligations(normalized.value)
            }
            _ => Ty::Unknown,
        };
        self.infer_pat(pat, &item_ty)?;
        self.infer_expr(body, None)?;
        Ok(Ty::unit())
    }

    // ── Jumps and effects ──────────────────────────────────────────────

    /// The first `yield` with a value fixes the yield type; later ones
    /// coerce to it. A bare `yield` leaves it open.
    pub(super) fn infer_yield(&mut self, value: Option<ExprId>) -> InferResult<Ty> {
        match (self.yield_ty.clone(), value) {
            (Some(yield_ty), Some(value)) => {
                self.infer_expr_coercable_to(value, &yield_ty)?;
            }
            (None, Some(value)) => {
                let ty = self.infer_expr(value, None)?;
                self.yield_ty = Some(ty);
            }
            (None, None) => self.yield_ty = Some(self.ctx.new_ty_var()),
            (Some(_), None) => {}
        }
        Ok(Ty::unit())
    }

    /// The success type `?` extracts from `base`. When the enclosing body
    /// has a fallible type, its `Try::Error` must accept the error.
    pub(super) fn try_output_ty(&mut self, base: Ty) -> Ty {
        let known = self.ctx.known();
        let base = self.ctx.resolve_vars_with_obligations(base);
        let (ok, err) = match &base {
            Ty::Adt(adt, args) if Some(*adt) == known.option => (args.first().cloned(), None),
            Ty::Adt(adt, args) if Some(*adt) == known.result => {
                (args.first().cloned(), args.get(1).cloned())
            }
            Ty::Unknown | Ty::Infer(InferTy::TyVar(_)) => (None, None),
            _ => match known.try_trait {
                Some(try_trait) => {
                    let trait_ref = TraitRef::new(base.clone(), try_trait, Vec::new());
                    let ok_proj = ProjectionTy::new(trait_ref.clone(), "Ok");
                    let ok = self.ctx.normalize_projection(&ok_proj, 0);
                    self.ctx.fulfill.register_all(ok.obligations);
                    let err_proj = ProjectionTy::new(trait_ref, "Error");
                    let err = self.ctx.normalize_projection(&err_proj, 0);
                    self.ctx.fulfill.register_all(err.obligations);
                    (Some(ok.value), Some(err.value))
                }
                None => (None, None),
            },
        };
        if let (Some(try_ty), Some(err), Some(try_trait)) =
            (self.try_ty.clone(), err, known.try_trait)
        {
            if !matches!(err, Ty::Unknown) {
                let trait_ref = TraitRef::new(try_ty, try_trait, Vec::new());
                let proj = ProjectionTy::new(trait_ref, "Error");
                self.ctx.register_obligation(Obligation::projection_eq(0, proj, err));
            }
        }
        ok.unwrap_or(Ty::Unknown)
    }

    /// The value `.await` produces from `base`.
    pub(super) fn await_output_ty(&mut self, base: Ty) -> Ty {
        let known = self.ctx.known();
        let Some(future) = known.future else {
            return Ty::Unknown;
        };
        let base = self.ctx.resolve_vars_with_obligations(base);
        match &base {
            Ty::Opaque(opaque) => opaque
                .bounds
                .iter()
                .find(|bound| bound.trait_id == future)
                .and_then(|bound| bound.assoc_ty("Output").cloned())
                .unwrap_or(Ty::Unknown),
            Ty::Unknown | Ty::Infer(InferTy::TyVar(_)) => Ty::Unknown,
            _ => {
                let trait_ref = TraitRef::new(base.clone(), future, Vec::new());
                let proj = ProjectionTy::new(trait_ref, "Output");
                let normalized = self.ctx.normalize_projection(&proj, 0);
                self.ctx.fulfill.register_all(normalized.obligations);
                normalized.value
            }
        }
    }
}
