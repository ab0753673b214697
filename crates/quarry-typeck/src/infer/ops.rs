//! Unary, binary, index and range expressions.
//!
//! Overloadable operators go through their trait: the operator's result is
//! the trait's `Output` projection. For primitive operands the built-in
//! rules also apply and pin both sides together.

use quarry_hir::body::{BinaryOp, CmpOp, ExprId, UnaryOp};
use quarry_hir::known::ArithOp;
use quarry_hir::ty::{IntTy, Mutability, ProjectionTy, Region, TraitRef, Ty};

use super::{InferResult, InferenceWalker};
use crate::obligation::Obligation;
use crate::result::Adjustment;

/// Operator families with distinct built-in typing rules.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ArithCategory {
    Shift,
    Math,
    Bitwise,
}

fn arith_category(op: ArithOp) -> ArithCategory {
    match op {
        ArithOp::Shl | ArithOp::Shr => ArithCategory::Shift,
        ArithOp::BitAnd | ArithOp::BitOr | ArithOp::BitXor => ArithCategory::Bitwise,
        ArithOp::Add | ArithOp::Sub | ArithOp::Mul | ArithOp::Div | ArithOp::Rem => {
            ArithCategory::Math
        }
    }
}

/// Whether the built-in operator applies to these operand types.
fn is_builtin_arith(category: ArithCategory, lhs: &Ty, rhs: &Ty) -> bool {
    match category {
        ArithCategory::Shift => lhs.is_integral() && rhs.is_integral(),
        ArithCategory::Math => {
            (lhs.is_integral() && rhs.is_integral()) || (lhs.is_float() && rhs.is_float())
        }
        ArithCategory::Bitwise => {
            (lhs.is_integral() && rhs.is_integral())
                || (lhs.is_float() && rhs.is_float())
                || (*lhs == Ty::Bool && *rhs == Ty::Bool)
        }
    }
}

fn borrow_of(ty: &Ty, mutability: Mutability) -> Adjustment {
    Adjustment::BorrowReference {
        target: Ty::reference(ty.clone(), mutability),
        region: Region::erased(),
        mutability,
    }
}

impl InferenceWalker<'_, '_> {
    // ── Unary ──────────────────────────────────────────────────────────

    /// Infer the type of a prefix operator expression.
    pub(super) fn infer_unary(
        &mut self,
        expr: ExprId,
        op: UnaryOp,
        inner: ExprId,
        expected: Option<&Ty>,
    ) -> InferResult<Ty> {
        match op {
            UnaryOp::Ref(mutability) => {
                let expected_inner = match expected {
                    Some(Ty::Ref(pointee, ..)) => Some((**pointee).clone()),
                    _ => None,
                };
                let ty = self.infer_expr(inner, expected_inner.as_ref())?;
                Ok(Ty::reference(ty, mutability))
            }
            UnaryOp::Deref => {
                let base = self.infer_expr(inner, None)?;
                let base = self.ctx.resolve_vars_with_obligations(base);
                match self.ctx.deref_ty(&base) {
                    Some(target) => Ok(target),
                    None => {
                        if !matches!(base, Ty::Unknown | Ty::Infer(_)) {
                            self.ctx.report_cannot_deref(expr, base);
                        }
                        Ok(Ty::Unknown)
                    }
                }
            }
            UnaryOp::Neg | UnaryOp::Not => self.infer_expr(inner, expected),
            UnaryOp::Box => {
                let known = self.ctx.known();
                let expected_inner = match expected {
                    Some(Ty::Adt(adt, args)) if Some(*adt) == known.boxed => args.first().cloned(),
                    _ => None,
                };
                let ty = self.infer_expr(inner, expected_inner.as_ref())?;
                Ok(self.known_adt_ty(known.boxed, vec![ty]))
            }
        }
    }

    // ── Binary ─────────────────────────────────────────────────────────

    /// Infer the type of an infix operator expression.
    pub(super) fn infer_binary(
        &mut self,
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    ) -> InferResult<Ty> {
        match op {
            BinaryOp::Logic(_) => {
                self.infer_expr_coercable_to(lhs, &Ty::Bool)?;
                self.infer_expr_coercable_to(rhs, &Ty::Bool)?;
                Ok(Ty::Bool)
            }
            BinaryOp::Cmp(cmp) => self.infer_comparison(cmp, lhs, rhs),
            BinaryOp::Arith(arith) => self.infer_arith(arith, lhs, rhs),
            BinaryOp::Assign(None) => {
                let lhs_ty = self.infer_expr(lhs, None)?;
                self.infer_expr_coercable_to(rhs, &lhs_ty)?;
                Ok(Ty::unit())
            }
            BinaryOp::Assign(Some(arith)) => self.infer_compound_assign(arith, lhs, rhs),
        }
    }

    /// `==` and friends go through `PartialEq`, orderings through
    /// `PartialOrd`. Both operands are used by reference.
    fn infer_comparison(&mut self, cmp: CmpOp, lhs: ExprId, rhs: ExprId) -> InferResult<Ty> {
        let known = self.ctx.known();
        let lhs_ty = self.infer_expr(lhs, None)?;
        let lhs_ty = self.ctx.resolve_vars_with_obligations(lhs_ty);
        let rhs_var = self.ctx.new_ty_var();
        let trait_id = if cmp.is_equality() { known.partial_eq } else { known.partial_ord };
        if let Some(trait_id) = trait_id {
            let goal = TraitRef::new(lhs_ty.clone(), trait_id, vec![rhs_var.clone()]);
            self.ctx.register_obligation(Obligation::trait_bound(0, goal));
        }
        let rhs_ty = self.infer_expr_coercable_to(rhs, &rhs_var)?;
        let rhs_ty = self.ctx.resolve_vars_with_obligations(rhs_ty);

        self.ctx.add_adjustments(lhs, [borrow_of(&lhs_ty, Mutability::Not)]);
        self.ctx.add_adjustments(rhs, [borrow_of(&rhs_ty, Mutability::Not)]);

        if lhs_ty.is_scalar() && rhs_ty.is_scalar() {
            self.ctx.combine_types(&lhs_ty, &rhs_ty);
        }
        Ok(Ty::Bool)
    }

    fn infer_arith(&mut self, op: ArithOp, lhs: ExprId, rhs: ExprId) -> InferResult<Ty> {
        let known = self.ctx.known();
        let lhs_ty = self.infer_expr(lhs, None)?;
        let lhs_ty = self.ctx.resolve_vars_with_obligations(lhs_ty);
        let rhs_var = self.ctx.new_ty_var();
        let output = match known.arith_trait(op) {
            Some(trait_id) => {
                let goal = TraitRef::new(lhs_ty.clone(), trait_id, vec![rhs_var.clone()]);
                self.ctx.register_obligation(Obligation::trait_bound(0, goal.clone()));
                let proj = ProjectionTy::new(goal, "Output");
                let normalized = self.ctx.normalize_projection(&proj, 0);
                self.ctx.fulfill.register_all(normalized.obligations);
                normalized.value
            }
            None => Ty::Unknown,
        };
        let rhs_ty = self.infer_expr_coercable_to(rhs, &rhs_var)?;
        let rhs_ty = self.ctx.resolve_vars_with_obligations(rhs_ty);

        let category = arith_category(op);
        if !is_builtin_arith(category, &lhs_ty, &rhs_ty) {
            return Ok(output);
        }
        if category != ArithCategory::Shift {
            self.ctx.combine_types(&lhs_ty, &rhs_ty);
        }
        if matches!(output, Ty::Unknown) {
            return Ok(lhs_ty);
        }
        self.ctx.combine_types(&lhs_ty, &output);
        Ok(output)
    }

    /// `a += b`: the assignee is borrowed mutably; the result is unit.
    fn infer_compound_assign(&mut self, op: ArithOp, lhs: ExprId, rhs: ExprId) -> InferResult<Ty> {
        let known = self.ctx.known();
        let lhs_ty = self.infer_expr(lhs, None)?;
        let lhs_ty = self.ctx.resolve_vars_with_obligations(lhs_ty);
        let rhs_var = self.ctx.new_ty_var();
        if let Some(trait_id) = known.arith_assign_trait(op) {
            let goal = TraitRef::new(lhs_ty.clone(), trait_id, vec![rhs_var.clone()]);
            self.ctx.register_obligation(Obligation::trait_bound(0, goal));
        }
        let rhs_ty = self.infer_expr_coercable_to(rhs, &rhs_var)?;
        let rhs_ty = self.ctx.resolve_vars_with_obligations(rhs_ty);
        self.ctx.add_adjustments(lhs, [borrow_of(&lhs_ty, Mutability::Mut)]);

        let category = arith_category(op);
        if category != ArithCategory::Shift && is_builtin_arith(category, &lhs_ty, &rhs_ty) {
            self.ctx.combine_types(&lhs_ty, &rhs_ty);
        }
        Ok(Ty::unit())
    }

    // ── Index and range ────────────────────────────────────────────────

    /// Infer the type of `base[index]`: built-in for arrays and slices,
    /// through `Index::Output` otherwise, trying each dereference of the
    /// base in turn.
    pub(super) fn infer_index(&mut self, base: ExprId, index: ExprId) -> InferResult<Ty> {
        let base_ty = self.infer_expr(base, None)?;
        let index_ty = self.infer_expr(index, None)?;
        let index_ty = self.ctx.resolve_vars_if_possible(index_ty);
        if let Ty::Ref(..) = index_ty {
            let adjustment = Adjustment::BorrowReference {
                target: index_ty.clone(),
                region: Region::erased(),
                mutability: Mutability::Not,
            };
            self.ctx.add_adjustments(index, [adjustment]);
        }

        let steps = self.ctx.deref_sequence(&base_ty);
        let mut deref_count = 0usize;
        for (i, step) in steps.iter().enumerate() {
            // The trailing slice of an array is an unsizing, not a dereference.
            let unsized_array =
                i > 0 && matches!((&steps[i - 1], step), (Ty::Array(..), Ty::Slice(_)));
            if i > 0 && !unsized_array {
                deref_count += 1;
            }
            if let Some(output) = self.index_output(step, &index_ty) {
                if deref_count > 0 {
                    let derefs = steps[1..=deref_count].iter().cloned().map(Adjustment::Deref);
                    self.ctx.add_adjustments(base, derefs);
                }
                return Ok(output);
            }
        }
        Ok(Ty::Unknown)
    }

    fn index_output(&mut self, container: &Ty, index: &Ty) -> Option<Ty> {
        let known = self.ctx.known();
        let index = self.ctx.shallow_resolve(index);
        match container {
            Ty::Array(elem, _) | Ty::Slice(elem) => {
                if index.is_integral() {
                    self.ctx.combine_types(&index, &Ty::Int(IntTy::Usize));
                    return Some((**elem).clone());
                }
                if let Ty::Adt(adt, _) = index {
                    if known.is_range(adt) {
                        return Some(Ty::slice((**elem).clone()));
                    }
                }
            }
            Ty::Str => {
                if let Ty::Adt(adt, _) = index {
                    if known.is_range(adt) {
                        return Some(Ty::Str);
                    }
                }
            }
            _ => {}
        }

        let trait_id = known.index?;
        let goal = TraitRef::new(container.clone(), trait_id, vec![index]);
        let proj = ProjectionTy::new(goal.clone(), "Output");
        let normalized = self.ctx.opt_normalize_projection(&proj, 0)?;
        match normalized.value {
            Ty::Unknown | Ty::Projection(_) => None,
            output => {
                self.ctx.fulfill.register_all(normalized.obligations);
                self.ctx.register_obligation(Obligation::trait_bound(0, goal));
                Some(output)
            }
        }
    }

    /// Infer the type of `a..b` and its variants: the matching range ADT
    /// over the join of both ends.
    pub(super) fn infer_range(
        &mut self,
        expr: ExprId,
        lhs: Option<ExprId>,
        rhs: Option<ExprId>,
    ) -> InferResult<Ty> {
        let known = self.ctx.known();
        let lhs_ty = lhs.map(|lhs| self.infer_expr(lhs, None)).transpose()?;
        let rhs_ty = rhs.map(|rhs| self.infer_expr(rhs, None)).transpose()?;
        let idx = match (lhs_ty, rhs_ty) {
            (Some(a), Some(b)) => Some(self.more_complete_ty(vec![a, b])),
            (a, b) => a.or(b),
        };
        let adt = self.body[expr].range_kind().and_then(|kind| known.range_adt(kind));
        Ok(self.known_adt_ty(adt, idx.into_iter().collect()))
    }
}
