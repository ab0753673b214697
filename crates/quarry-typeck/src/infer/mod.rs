//! The expression and pattern walker.
//!
//! One `InferenceWalker` visits a body top-down, threading an optional
//! expected type into every expression. Each expression's type is written
//! exactly once, after its children. Whatever cannot be determined becomes
//! `Unknown`; the walk itself never fails except through cancellation.
//!
//! The walker is split by expression family:
//! - `path`: paths, constructors, struct literals
//! - `call`: calls and argument inference
//! - `method`: method lookup, picking and instantiation
//! - `ops`: unary, binary, index, range and cast expressions
//! - `control`: blocks, conditionals, loops, jumps, `?`, `.await`
//! - `lit`: literals, tuples, arrays and macros
//! - `closure`: closure literals
//! - `pat`: patterns and bindings

mod call;
mod closure;
mod control;
mod lit;
mod method;
mod ops;
mod pat;
mod path;

use quarry_hir::body::{Body, BodyOwner, BlockKind, Expr, ExprId};
use quarry_hir::item::{AdtId, FunctionData, Generics, SelfParam, TypeParamId};
use quarry_hir::ty::{BoundTrait, FnSig, IntTy, OpaqueTy, Ty};
use quarry_hir::{KnownItems, Substitution};

use crate::context::InferCtx;
use crate::error::Cancelled;
use crate::result::InferenceResult;

pub(crate) type InferResult<T> = Result<T, Cancelled>;

/// Infers the body `ctx` was created for and runs the finishing passes.
pub(crate) fn infer_owner(mut ctx: InferCtx<'_>) -> Result<InferenceResult, Cancelled> {
    let owner = ctx.owner;
    let body = ctx.body;
    let items = ctx.items();
    tracing::debug!(?owner, exprs = body.expr_count(), "inferring body");

    let return_ty = match owner {
        BodyOwner::Function(func) => {
            let data = &items[func];
            let self_ty = items.owner_self_ty(data.owner);
            let param_tys = declared_param_tys(data, self_ty);
            let param_tys = ctx.normalize_and_register(param_tys);
            let return_ty = ctx.normalize_and_register(data.ret.clone());
            let mut walker = InferenceWalker::new(&mut ctx, body, return_ty.clone());
            for (i, pat) in body.params.iter().enumerate() {
                let ty = param_tys.get(i).cloned().unwrap_or(Ty::Unknown);
                walker.infer_pat(*pat, &ty)?;
            }
            walker.infer_body_root(body.root)?;
            return Ok(ctx.finish());
        }
        BodyOwner::Const(konst) => match &items[konst].ty {
            Some(ty) => ctx.normalize_and_register(ty.clone()),
            None => ctx.new_ty_var(),
        },
        BodyOwner::ArrayLen(_) => Ty::Int(IntTy::Usize),
        BodyOwner::Discriminant(adt, _) => Ty::Int(items[adt].repr.unwrap_or(IntTy::Isize)),
    };

    let mut walker = InferenceWalker::new(&mut ctx, body, return_ty.clone());
    walker.infer_expr_coercable_to(body.root, &return_ty)?;
    Ok(ctx.finish())
}

/// The declared parameter types of a function as seen from inside its
/// body, self parameter first.
fn declared_param_tys(data: &FunctionData, self_ty: Option<Ty>) -> Vec<Ty> {
    let self_param = data.self_param.as_ref().map(|param| {
        let self_ty = self_ty.unwrap_or(Ty::Param(TypeParamId::SELF));
        self_param_ty(param, self_ty)
    });
    self_param.into_iter().chain(data.params.iter().cloned()).collect()
}

/// The type of a self parameter once `Self` is known.
pub(crate) fn self_param_ty(param: &SelfParam, self_ty: Ty) -> Ty {
    match param {
        SelfParam::Value => self_ty,
        SelfParam::Ref(mutability) => Ty::reference(self_ty, *mutability),
        SelfParam::Explicit(ty) => {
            Substitution::from_pairs([(TypeParamId::SELF, self_ty)]).apply(ty.clone())
        }
    }
}

/// A function's type as a value: `fn(self?, params..) -> ret`, with the
/// return type wrapped in a future for `async fn`.
pub(crate) fn fn_value_ty(known: &KnownItems, data: &FunctionData) -> Ty {
    let mut params = Vec::with_capacity(data.params.len() + 1);
    if let Some(param) = &data.self_param {
        params.push(self_param_ty(param, Ty::Param(TypeParamId::SELF)));
    }
    params.extend(data.params.iter().cloned());
    Ty::function(params, fn_output_ty(known, data))
}

pub(crate) fn fn_output_ty(known: &KnownItems, data: &FunctionData) -> Ty {
    if data.is_async {
        future_ty(known, data.ret.clone())
    } else {
        data.ret.clone()
    }
}

/// `impl Future<Output = output>`, or unknown without a `Future` trait.
pub(crate) fn future_ty(known: &KnownItems, output: Ty) -> Ty {
    match known.future {
        Some(future) => Ty::Opaque(OpaqueTy {
            def: None,
            bounds: vec![BoundTrait::new(future, Vec::new()).with_assoc("Output", output)],
        }),
        None => Ty::Unknown,
    }
}

/// `Fn(params..) -> Output` read back from a bound on one of the fn traits.
pub(crate) fn fn_sig_from_bound(known: &KnownItems, bound: &BoundTrait) -> Option<FnSig> {
    if !known.is_fn_trait(bound.trait_id) {
        return None;
    }
    let Some(Ty::Tuple(params)) = bound.args.first() else {
        return None;
    };
    let ret = bound.assoc_ty("Output").cloned().unwrap_or_else(Ty::unit);
    Some(FnSig::new(params.clone(), ret))
}

// ── Walker ─────────────────────────────────────────────────────────────

pub(crate) struct InferenceWalker<'c, 'a> {
    ctx: &'c mut InferCtx<'a>,
    body: &'a Body,
    /// What `return` coerces to: the function's, or the innermost closure's.
    return_ty: Ty,
    /// The type `?` propagates into, when there is one.
    try_ty: Option<Ty>,
    /// Set by the first `yield` of a generator body.
    yield_ty: Option<Ty>,
}

impl<'c, 'a> InferenceWalker<'c, 'a> {
    fn new(ctx: &'c mut InferCtx<'a>, body: &'a Body, return_ty: Ty) -> Self {
        let try_ty = Some(return_ty.clone());
        InferenceWalker { ctx, body, return_ty, try_ty, yield_ty: None }
    }

    /// Infer the type of `expr` with an optional expectation and record it.
    fn infer_expr(&mut self, expr: ExprId, expected: Option<&Ty>) -> InferResult<Ty> {
        self.ctx.check_cancelled()?;
        let expected = match expected {
            Some(Ty::Unknown) | None => None,
            Some(ty) => Some(self.ctx.shallow_resolve(ty)),
        };
        let expected = expected.as_ref();
        let body = self.body;

        let ty = match &body[expr] {
            Expr::Missing => Ty::Unknown,
            Expr::Path(path) => self.infer_path(expr, path)?,
            Expr::Literal(lit) => self.infer_literal(lit, expected),
            Expr::Struct { fields, spread, .. } => {
                self.infer_struct_literal(expr, fields, *spread, expected)?
            }
            Expr::Tuple(elems) => self.infer_tuple(elems, expected)?,
            Expr::Array(array) => self.infer_array(array, expected)?,
            Expr::Range { lhs, rhs, .. } => self.infer_range(expr, *lhs, *rhs)?,
            Expr::Index { base, index } => self.infer_index(*base, *index)?,
            Expr::Cast { expr: inner, ty } => {
                self.infer_expr(*inner, None)?;
                self.ctx.normalize_and_register(ty.clone())
            }
            Expr::Call { callee, args } => self.infer_call(*callee, args, expected)?,
            Expr::MethodCall { receiver, method, generic_args, args } => {
                self.infer_method_call(expr, *receiver, method, generic_args, args, expected)?
            }
            Expr::Field { receiver, name } => self.infer_field(expr, *receiver, name)?,
            Expr::Block { kind, stmts, tail, .. } => {
                self.infer_block_expr(expr, *kind, stmts, *tail, expected)?
            }
            Expr::If { condition, then_branch, else_branch } => {
                self.infer_if(*condition, *then_branch, *else_branch, expected)?
            }
            Expr::Let { pat, expr: scrutinee } => {
                let ty = self.infer_expr(*scrutinee, None)?;
                let ty = self.ctx.resolve_vars_with_obligations(ty);
                self.infer_pat(*pat, &ty)?;
                Ty::Bool
            }
            Expr::Loop { body: loop_body, .. } => {
                self.infer_expr(*loop_body, None)?;
                self.labeled_expr_ty(expr, Ty::Never, false)
            }
            Expr::While { condition, body: loop_body, .. } => {
                self.infer_condition(*condition)?;
                self.infer_expr(*loop_body, None)?;
                Ty::unit()
            }
            Expr::For { pat, iterable, body: loop_body, .. } => {
                self.infer_for(*pat, *iterable, *loop_body)?
            }
            Expr::Match { scrutinee, arms } => self.infer_match(*scrutinee, arms, expected)?,
            Expr::Unary { op, expr: inner } => self.infer_unary(expr, *op, *inner, expected)?,
            Expr::Binary { op, lhs, rhs } => self.infer_binary(*op, *lhs, *rhs)?,
            Expr::Try(inner) => {
                let base = self.infer_expr(*inner, None)?;
                self.try_output_ty(base)
            }
            Expr::Await(inner) => {
                let base = self.infer_expr(*inner, None)?;
                self.await_output_ty(base)
            }
            Expr::Yield(value) => self.infer_yield(*value)?,
            Expr::Return(value) => {
                if let Some(value) = value {
                    let return_ty = self.return_ty.clone();
                    self.infer_expr_coercable_to(*value, &return_ty)?;
                }
                Ty::Never
            }
            Expr::Break { expr: value, .. } => {
                if let Some(value) = value {
                    self.infer_expr(*value, None)?;
                }
                Ty::Never
            }
            Expr::Continue { .. } => Ty::Never,
            Expr::Closure { params, ret, body: closure_body, is_async } => {
                self.infer_closure(params, ret.as_ref(), *closure_body, *is_async, expected)?
            }
            Expr::Macro(call) => self.infer_macro(call, expected)?,
        };

        self.ctx.write_expr_ty(expr, ty.clone());
        Ok(ty)
    }

    /// Infer `expr` against `expected` and coerce the result to it. On
    /// success the expression stands for `expected`.
    fn infer_expr_coercable_to(&mut self, expr: ExprId, expected: &Ty) -> InferResult<Ty> {
        let inferred = self.infer_expr(expr, Some(expected))?;
        if matches!(expected, Ty::Unknown) {
            return Ok(inferred);
        }
        if self.ctx.coerce(expr, &inferred, expected) {
            Ok(expected.clone())
        } else {
            Ok(inferred)
        }
    }

    /// A function or closure body. A plain block body takes the return type
    /// directly so mismatches land on its tail, not on the whole block.
    fn infer_body_root(&mut self, root: ExprId) -> InferResult<()> {
        let body = self.body;
        let return_ty = self.return_ty.clone();
        match &body[root] {
            Expr::Block {
                kind: BlockKind::Plain | BlockKind::Unsafe,
                label: None,
                stmts,
                tail,
            } => {
                self.ctx.check_cancelled()?;
                self.ctx.write_expr_ty(root, return_ty.clone());
                let ty = self.infer_block_stmts(stmts, *tail, Some(&return_ty), true)?;
                if tail.is_none() && ty != Ty::Never {
                    self.ctx.coerce(root, &ty, &return_ty);
                }
            }
            _ => {
                self.infer_expr_coercable_to(root, &return_ty)?;
            }
        }
        Ok(())
    }

    fn infer_condition(&mut self, condition: ExprId) -> InferResult<()> {
        self.infer_expr_coercable_to(condition, &Ty::Bool)?;
        Ok(())
    }

    // ── Generics ───────────────────────────────────────────────────────

    /// Fresh variables for `generics`, with `Self` bound to `self_ty` when
    /// given, and their where-clauses registered.
    fn instantiate_generics(&mut self, generics: &Generics, self_ty: Option<Ty>) -> Substitution {
        let mut subst = self.ctx.fresh_subst(generics);
        if let Some(self_ty) = self_ty {
            subst.insert(TypeParamId::SELF, self_ty);
        }
        self.register_bounds(generics, &subst);
        subst
    }

    fn register_bounds(&mut self, generics: &Generics, subst: &Substitution) {
        let obligations = self.ctx.instantiate_bounds(&generics.bounds, subst, 0);
        self.ctx.fulfill.register_all(obligations);
    }

    /// Pins the variables of `vars` to the explicit arguments in `explicit`.
    /// `Self`, parameters and unknowns carry no information and are skipped.
    fn unify_subst(&mut self, explicit: &Substitution, vars: &Substitution) {
        for (param, ty) in explicit.iter() {
            if param == TypeParamId::SELF || matches!(ty, Ty::Param(_) | Ty::Unknown) {
                continue;
            }
            if let Some(var) = vars.get(param).cloned() {
                self.ctx.combine_types(&var, ty);
            }
        }
    }

    // ── Joins ──────────────────────────────────────────────────────────

    /// The common type of several branches. Diverging branches are
    /// ignored, unknown ones give way to anything known.
    fn more_complete_ty(&mut self, tys: Vec<Ty>) -> Ty {
        let mut iter = tys.into_iter();
        let Some(first) = iter.next() else {
            return Ty::Unknown;
        };
        iter.fold(first, |acc, ty| {
            match self.ctx.shallow_resolve(&acc) {
                Ty::Never => ty,
                Ty::Unknown if ty == Ty::Never => Ty::Unknown,
                Ty::Unknown => ty,
                _ => {
                    self.ctx.combine_types(&acc, &ty);
                    acc
                }
            }
        })
    }

    /// Joins `base` with the values of the `break`s that target `expr`.
    /// With `match_only_by_label`, unlabeled breaks are not counted.
    fn labeled_expr_ty(&mut self, expr: ExprId, base: Ty, match_only_by_label: bool) -> Ty {
        let body = self.body;
        let label = body[expr].label();
        let mut tys = vec![base];
        if label.is_some() || !match_only_by_label {
            self.collect_break_tys(expr, label, match_only_by_label, &mut tys);
        }
        self.more_complete_ty(tys)
    }

    fn collect_break_tys(
        &self,
        expr: ExprId,
        label: Option<&str>,
        match_only_by_label: bool,
        tys: &mut Vec<Ty>,
    ) {
        let body = self.body;
        body[expr].walk_child_exprs(|child| match &body[child] {
            Expr::Break { label: break_label, expr: value } => {
                self.collect_break_tys(child, label, match_only_by_label, tys);
                let targets_expr = match break_label {
                    None => !match_only_by_label,
                    Some(name) => Some(name.as_str()) == label,
                };
                if targets_expr {
                    tys.push(value.map(|value| self.ctx.expr_ty(value)).unwrap_or_else(Ty::unit));
                }
            }
            // Breaks never leave a closure.
            Expr::Closure { .. } => {}
            Expr::Loop { .. }
            | Expr::While { .. }
            | Expr::For { .. }
            | Expr::Block { label: Some(_), .. } => {
                if label.is_some() {
                    self.collect_break_tys(child, label, true, tys);
                }
            }
            _ => self.collect_break_tys(child, label, match_only_by_label, tys),
        });
    }

    // ── Known types ────────────────────────────────────────────────────

    /// `adt<args..>` for a well-known ADT, unknown when it is absent. Extra
    /// or missing arguments are padded against the ADT's parameters.
    fn known_adt_ty(&mut self, adt: Option<AdtId>, args: Vec<Ty>) -> Ty {
        let Some(adt) = adt else {
            return Ty::Unknown;
        };
        let arity = self.ctx.items()[adt].generics.params.len();
        let mut args = args;
        args.resize(arity, Ty::Unknown);
        Ty::Adt(adt, args)
    }
}
