//! Per-body inference state and the primitives the walker builds on.
//!
//! `InferCtx` owns the three unification tables, the projection cache, the
//! pending obligations and every map that ends up in the `InferenceResult`.
//! It is created for one body, driven by the walker, and consumed by
//! `finish`.
//!
//! Unification (`combine_types`) is tolerant: it never reports, it only
//! answers whether two types could be made equal. Occurs-check failures
//! bind the variable to `Unknown` instead of failing.

use std::time::Instant;

use rustc_hash::FxHashMap;

use quarry_hir::body::{Body, BodyOwner, ExprId, ExprOrPatId, PatId};
use quarry_hir::fold::{TypeFoldable, TypeFolder, TypeVisitor};
use quarry_hir::item::{Generics, ImplId, TypeParamId, WherePredicate};
use quarry_hir::ty::{FloatTy, FloatVid, InferTy, IntTy, IntVid, ProjectionTy, TraitRef, Ty, TyVid};
use quarry_hir::{ItemTree, KnownItems, Substitution, ValueNs};

use crate::config::InferenceConfig;
use crate::error::{Cancelled, InferenceDiagnostic};
use crate::obligation::{FulfillmentContext, Obligation, Predicate, TyWithObligations};
use crate::projection::{ProjectionCache, ProjectionCacheEntry, ProjectionCacheSnapshot};
use crate::result::{Adjustment, FieldResolution, InferenceResult, MethodResolution, MethodSource};
use crate::select::{ImplSource, ParamEnv, SelectionResult};
use crate::unify::{FloatTable, IntTable, TableSnapshot, TyTable};
use crate::InferenceSession;

/// One snapshot per table, committed or rolled back together.
pub(crate) struct CombinedSnapshot {
    int: TableSnapshot<IntVid>,
    float: TableSnapshot<FloatVid>,
    ty: TableSnapshot<TyVid>,
    projection: ProjectionCacheSnapshot,
}

enum ProcessResult {
    /// Decided; these nested obligations replace it.
    Changed(Vec<Obligation>),
    /// Not decidable yet.
    Unchanged,
    Error,
}

pub struct InferCtx<'a> {
    pub(crate) session: &'a InferenceSession<'a>,
    pub(crate) owner: BodyOwner,
    pub(crate) body: &'a Body,
    pub(crate) env: ParamEnv,
    int_table: IntTable,
    float_table: FloatTable,
    var_table: TyTable,
    projection_cache: ProjectionCache,
    pub(crate) fulfill: FulfillmentContext,
    expr_types: FxHashMap<ExprId, Ty>,
    bindings: FxHashMap<PatId, Ty>,
    resolved_paths: FxHashMap<ExprId, Vec<ValueNs>>,
    resolved_methods: FxHashMap<ExprId, Vec<MethodResolution>>,
    resolved_fields: FxHashMap<ExprId, Vec<FieldResolution>>,
    adjustments: FxHashMap<ExprId, Vec<Adjustment>>,
    diagnostics: Vec<InferenceDiagnostic>,
    path_refinements: Vec<(ExprId, TraitRef)>,
    method_refinements: Vec<(ExprId, TraitRef)>,
}

impl<'a> InferCtx<'a> {
    pub(crate) fn new(session: &'a InferenceSession<'a>, owner: BodyOwner, body: &'a Body) -> Self {
        let env = ParamEnv::for_owner(session.db().item_tree(), owner);
        InferCtx {
            session,
            owner,
            body,
            env,
            int_table: IntTable::new(),
            float_table: FloatTable::new(),
            var_table: TyTable::new(),
            projection_cache: ProjectionCache::new(),
            fulfill: FulfillmentContext::new(),
            expr_types: FxHashMap::default(),
            bindings: FxHashMap::default(),
            resolved_paths: FxHashMap::default(),
            resolved_methods: FxHashMap::default(),
            resolved_fields: FxHashMap::default(),
            adjustments: FxHashMap::default(),
            diagnostics: Vec::new(),
            path_refinements: Vec::new(),
            method_refinements: Vec::new(),
        }
    }

    pub fn items(&self) -> &'a ItemTree {
        self.session.db().item_tree()
    }

    pub fn known(&self) -> &'a KnownItems {
        self.session.db().known_items()
    }

    pub fn config(&self) -> &'a InferenceConfig {
        self.session.config()
    }

    pub fn check_cancelled(&self) -> Result<(), Cancelled> {
        if self.session.cancellation().is_cancelled() {
            tracing::debug!(owner = ?self.owner, "inference cancelled");
            return Err(Cancelled);
        }
        Ok(())
    }

    // ── Variables ──────────────────────────────────────────────────────

    pub fn new_ty_var(&mut self) -> Ty {
        Ty::ty_var(self.var_table.new_key())
    }

    pub fn new_int_var(&mut self) -> Ty {
        Ty::int_var(self.int_table.new_key())
    }

    pub fn new_float_var(&mut self) -> Ty {
        Ty::float_var(self.float_table.new_key())
    }

    /// Replaces an inference variable by its value, repeatedly, or by its
    /// root if it has none. Other types are returned as they are.
    pub fn shallow_resolve(&mut self, ty: &Ty) -> Ty {
        match ty {
            Ty::Infer(InferTy::TyVar(vid)) => match self.var_table.find_value(*vid) {
                Some(value) => self.shallow_resolve(&value),
                None => Ty::ty_var(self.var_table.find_root(*vid)),
            },
            Ty::Infer(InferTy::IntVar(vid)) => match self.int_table.find_value(*vid) {
                Some(int) => Ty::Int(int),
                None => Ty::int_var(self.int_table.find_root(*vid)),
            },
            Ty::Infer(InferTy::FloatVar(vid)) => match self.float_table.find_value(*vid) {
                Some(float) => Ty::Float(float),
                None => Ty::float_var(self.float_table.find_root(*vid)),
            },
            _ => ty.clone(),
        }
    }

    /// Substitutes every resolved variable, leaving unresolved ones in place.
    pub fn resolve_vars_if_possible<T: TypeFoldable>(&mut self, value: T) -> T {
        value.fold_with(&mut Resolver { ctx: self, fallback: false })
    }

    /// Substitutes every resolved variable; unresolved ones become unknown.
    pub fn fully_resolve<T: TypeFoldable>(&mut self, value: T) -> T {
        value.fold_with(&mut Resolver { ctx: self, fallback: true })
    }

    /// Runs pending obligations first when `ty` is still a variable; they
    /// may be what determines it.
    pub fn resolve_vars_with_obligations(&mut self, ty: Ty) -> Ty {
        let ty = self.resolve_vars_if_possible(ty);
        if !ty.has_infer() {
            return ty;
        }
        self.select_where_possible();
        self.resolve_vars_if_possible(ty)
    }

    pub fn has_unresolved_vars<T: TypeFoldable + Clone>(&mut self, value: &T) -> bool {
        let value = self.resolve_vars_if_possible(value.clone());
        contains(&value, &mut |ty| matches!(ty, Ty::Infer(_)))
    }

    /// Whether anything has been unified with `var` since it was created.
    pub fn is_ty_var_affected(&mut self, var: TyVid) -> bool {
        self.var_table.find_root(var) != var || self.var_table.find_value(var).is_some()
    }

    // ── Combine ────────────────────────────────────────────────────────

    /// Makes `t1` and `t2` equal if possible. On failure some variables may
    /// already be bound; callers that care use `combine_types_if_ok`.
    pub fn combine_types(&mut self, t1: &Ty, t2: &Ty) -> bool {
        let t1 = self.shallow_resolve(t1);
        let t2 = self.shallow_resolve(t2);
        match (&t1, &t2) {
            (Ty::Infer(InferTy::TyVar(a)), _) => self.combine_ty_var(*a, &t2),
            (_, Ty::Infer(InferTy::TyVar(b))) => self.combine_ty_var(*b, &t1),
            (Ty::Infer(a), _) => self.combine_numeric_var(*a, &t2),
            (_, Ty::Infer(b)) => self.combine_numeric_var(*b, &t1),
            _ => self.combine_types_no_vars(&t1, &t2),
        }
    }

    fn combine_ty_var(&mut self, var: TyVid, ty: &Ty) -> bool {
        match ty {
            Ty::Infer(InferTy::TyVar(other)) => self.var_table.unify_var_var(var, *other),
            _ => {
                let root = self.var_table.find_root(var);
                if self.occurs_in(root, ty) {
                    tracing::debug!(var = ?root, ty = %ty, "cyclic type, binding to unknown");
                    self.var_table.unify_var_value(root, Ty::Unknown);
                } else {
                    self.var_table.unify_var_value(root, ty.clone());
                }
            }
        }
        true
    }

    fn combine_numeric_var(&mut self, var: InferTy, ty: &Ty) -> bool {
        match (var, ty) {
            (InferTy::IntVar(a), Ty::Infer(InferTy::IntVar(b))) => {
                self.int_table.unify_var_var(a, *b)
            }
            (InferTy::IntVar(a), Ty::Int(int)) => self.int_table.unify_var_value(a, *int),
            (InferTy::FloatVar(a), Ty::Infer(InferTy::FloatVar(b))) => {
                self.float_table.unify_var_var(a, *b)
            }
            (InferTy::FloatVar(a), Ty::Float(float)) => {
                self.float_table.unify_var_value(a, *float)
            }
            (_, Ty::Never) => {}
            _ => return false,
        }
        true
    }

    fn combine_types_no_vars(&mut self, t1: &Ty, t2: &Ty) -> bool {
        if t1 == t2 {
            return true;
        }
        match (t1, t2) {
            (Ty::Never, _) | (_, Ty::Never) => true,
            (Ty::Ref(a, m1, _), Ty::Ref(b, m2, _)) | (Ty::Ptr(a, m1), Ty::Ptr(b, m2)) => {
                m1 == m2 && self.combine_types(a, b)
            }
            (Ty::Array(a, len_a), Ty::Array(b, len_b)) => {
                let lens_agree = match (len_a, len_b) {
                    (Some(x), Some(y)) => x == y,
                    _ => true,
                };
                lens_agree && self.combine_types(a, b)
            }
            (Ty::Slice(a), Ty::Slice(b)) => self.combine_types(a, b),
            (Ty::Tuple(a), Ty::Tuple(b)) => a.len() == b.len() && self.combine_pairs(a, b),
            (Ty::Fn(a), Ty::Fn(b)) => {
                a.params.len() == b.params.len()
                    && self.combine_pairs(&a.params, &b.params)
                    && self.combine_types(&a.ret, &b.ret)
            }
            (Ty::Adt(x, a), Ty::Adt(y, b)) => {
                x == y && a.len() == b.len() && self.combine_pairs(a, b)
            }
            (Ty::Dyn(a), Ty::Dyn(b)) => a.trait_id == b.trait_id,
            (Ty::Opaque(a), Ty::Opaque(b)) => a.def.is_some() && a.def == b.def,
            _ => false,
        }
    }

    /// Combines every pair, even after one fails, so that the variables of
    /// the remaining components still get bound.
    pub fn combine_pairs(&mut self, a: &[Ty], b: &[Ty]) -> bool {
        a.iter().zip(b).fold(true, |ok, (x, y)| self.combine_types(x, y) && ok)
    }

    pub fn combine_trait_refs(&mut self, a: &TraitRef, b: &TraitRef) -> bool {
        a.trait_id == b.trait_id
            && a.args.len() == b.args.len()
            && self.combine_types(&a.self_ty, &b.self_ty)
            && self.combine_pairs(&a.args, &b.args)
    }

    /// Whether `ty` mentions the variable set rooted at `root`, looking
    /// through the values of the variables it contains.
    fn occurs_in(&mut self, root: TyVid, ty: &Ty) -> bool {
        struct Occurs<'c, 'a> {
            ctx: &'c mut InferCtx<'a>,
            root: TyVid,
        }
        impl TypeVisitor for Occurs<'_, '_> {
            fn visit_ty(&mut self, ty: &Ty) -> bool {
                match ty {
                    Ty::Infer(InferTy::TyVar(vid)) => {
                        if self.ctx.var_table.find_root(*vid) == self.root {
                            return true;
                        }
                        match self.ctx.var_table.find_value(*vid) {
                            Some(value) => self.visit_ty(&value),
                            None => false,
                        }
                    }
                    _ => ty.super_visit_with(self),
                }
            }
        }
        ty.visit_with(&mut Occurs { ctx: self, root })
    }

    // ── Snapshots ──────────────────────────────────────────────────────

    pub(crate) fn start_snapshot(&mut self) -> CombinedSnapshot {
        CombinedSnapshot {
            int: self.int_table.start_snapshot(),
            float: self.float_table.start_snapshot(),
            ty: self.var_table.start_snapshot(),
            projection: self.projection_cache.snapshot(),
        }
    }

    pub(crate) fn rollback_to(&mut self, snapshot: CombinedSnapshot) {
        self.projection_cache.rollback_to(snapshot.projection);
        self.var_table.rollback_to(snapshot.ty);
        self.float_table.rollback_to(snapshot.float);
        self.int_table.rollback_to(snapshot.int);
    }

    pub(crate) fn commit(&mut self, snapshot: CombinedSnapshot) {
        self.projection_cache.commit(snapshot.projection);
        self.var_table.commit(snapshot.ty);
        self.float_table.commit(snapshot.float);
        self.int_table.commit(snapshot.int);
    }

    /// Runs `f` and undoes every table change it made.
    pub fn in_snapshot<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let snapshot = self.start_snapshot();
        let result = f(self);
        self.rollback_to(snapshot);
        result
    }

    pub fn can_combine_types(&mut self, t1: &Ty, t2: &Ty) -> bool {
        self.in_snapshot(|ctx| ctx.combine_types(t1, t2))
    }

    /// Combines and keeps the result only when it succeeds.
    pub fn combine_types_if_ok(&mut self, t1: &Ty, t2: &Ty) -> bool {
        let snapshot = self.start_snapshot();
        let ok = self.combine_types(t1, t2);
        if ok {
            self.commit(snapshot);
        } else {
            self.rollback_to(snapshot);
        }
        ok
    }

    // ── Obligations ────────────────────────────────────────────────────

    pub fn register_obligation(&mut self, obligation: Obligation) {
        self.fulfill.register(obligation);
    }

    /// Decides every pending obligation that can be decided now, looping
    /// until a round makes no progress. Failed obligations are dropped.
    pub fn select_where_possible(&mut self) {
        let mut queue = std::mem::take(&mut self.fulfill);
        self.process_queue(&mut queue, false);
        // Obligations registered while processing belong to the same queue.
        queue.register_all(self.fulfill.take_pending());
        self.fulfill = queue;
    }

    /// Processes `queue` and reports whether none of its obligations failed.
    pub fn select_until_error(&mut self, queue: &mut FulfillmentContext) -> bool {
        self.process_queue(queue, true)
    }

    fn process_queue(&mut self, queue: &mut FulfillmentContext, stop_on_error: bool) -> bool {
        loop {
            let pending = queue.take_pending();
            if pending.is_empty() {
                return true;
            }
            let mut progress = false;
            let mut stalled = Vec::new();
            let mut nested = Vec::new();
            for obligation in pending {
                match self.process_obligation(&obligation) {
                    ProcessResult::Changed(more) => {
                        progress = true;
                        nested.extend(more);
                    }
                    ProcessResult::Unchanged => stalled.push(obligation),
                    ProcessResult::Error => {
                        tracing::trace!(?obligation, "obligation failed");
                        if stop_on_error {
                            return false;
                        }
                        progress = true;
                    }
                }
            }
            queue.register_all(stalled);
            queue.register_all(nested);
            if !progress {
                return true;
            }
        }
    }

    fn process_obligation(&mut self, obligation: &Obligation) -> ProcessResult {
        if obligation.depth > self.config().recursion_limit {
            tracing::debug!(depth = obligation.depth, "obligation exceeds recursion limit");
            return ProcessResult::Error;
        }
        match &obligation.predicate {
            Predicate::Trait(trait_ref) => {
                let trait_ref = self.resolve_vars_if_possible(trait_ref.clone());
                match self.select(&trait_ref) {
                    SelectionResult::Ok(source) => {
                        match self.confirm(&trait_ref, source, obligation.depth + 1) {
                            Some(nested) => ProcessResult::Changed(nested),
                            None => ProcessResult::Error,
                        }
                    }
                    SelectionResult::Err => ProcessResult::Error,
                    SelectionResult::Ambiguous => ProcessResult::Unchanged,
                }
            }
            Predicate::Projection(proj, ty) => {
                match self.opt_normalize_projection(proj, obligation.depth + 1) {
                    None => ProcessResult::Unchanged,
                    Some(normalized) => {
                        if self.combine_types(&normalized.value, ty) {
                            ProcessResult::Changed(normalized.obligations)
                        } else {
                            ProcessResult::Error
                        }
                    }
                }
            }
        }
    }

    pub fn select(&self, goal: &TraitRef) -> SelectionResult<ImplSource> {
        let db = self.session.db();
        db.trait_selection().select(db.item_tree(), db.known_items(), goal, &self.env)
    }

    /// Unifies the goal with what selection found and returns the
    /// where-clauses that now have to hold. `None` if the headers clash.
    fn confirm(
        &mut self,
        goal: &TraitRef,
        source: ImplSource,
        depth: u32,
    ) -> Option<Vec<Obligation>> {
        match source {
            ImplSource::Impl(imp) => {
                let (subst, impl_ref) = self.instantiate_impl_header(imp)?;
                if !self.combine_trait_refs(&impl_ref, goal) {
                    return None;
                }
                let bounds = &self.items()[imp].generics.bounds;
                Some(self.instantiate_bounds(bounds, &subst, depth))
            }
            ImplSource::Param(bound) | ImplSource::Object(bound) => {
                let ok = bound.args.len() == goal.args.len()
                    && self.combine_pairs(&bound.args, &goal.args);
                ok.then(Vec::new)
            }
            ImplSource::Builtin => {
                if let (Ty::Fn(sig), Some(args)) = (&goal.self_ty, goal.args.first()) {
                    if !self.combine_types(&Ty::Tuple(sig.params.clone()), args) {
                        return None;
                    }
                }
                Some(Vec::new())
            }
        }
    }

    /// The impl's trait ref with its generics replaced by fresh variables.
    fn instantiate_impl_header(&mut self, imp: ImplId) -> Option<(Substitution, TraitRef)> {
        let data = &self.items()[imp];
        let (trait_id, args) = data.trait_ref.clone()?;
        let subst = self.fresh_subst(&data.generics);
        let self_ty = subst.apply(data.self_ty.clone());
        let trait_ref = TraitRef::new(self_ty, trait_id, subst.apply(args));
        Some((subst, trait_ref))
    }

    /// Fresh inference variables for every parameter of `generics`.
    pub fn fresh_subst(&mut self, generics: &Generics) -> Substitution {
        let mut subst = Substitution::new();
        for param in &generics.params {
            let var = self.new_ty_var();
            subst.insert(*param, var);
        }
        subst
    }

    /// Obligations for `bounds` under `subst`: one trait obligation per
    /// predicate plus one projection obligation per associated-type binding.
    pub fn instantiate_bounds(
        &mut self,
        bounds: &[WherePredicate],
        subst: &Substitution,
        depth: u32,
    ) -> Vec<Obligation> {
        let mut obligations = Vec::new();
        for pred in bounds {
            let self_ty = subst.apply(pred.self_ty.clone());
            let bound = subst.apply(pred.bound.clone());
            let normalized = self.normalize_assoc_types_in(bound.with_self_ty(self_ty), depth);
            obligations.extend(normalized.obligations);
            let trait_ref = normalized.value;
            for (name, ty) in &bound.assoc {
                let ty = self.normalize_assoc_types_in(ty.clone(), depth);
                obligations.extend(ty.obligations);
                let proj = ProjectionTy::new(trait_ref.clone(), name.clone());
                obligations.push(Obligation::projection_eq(depth, proj, ty.value));
            }
            obligations.push(Obligation::trait_bound(depth, trait_ref));
        }
        obligations
    }

    /// Whether `self_ty` could be the self type of `imp` with all of the
    /// impl's where-clauses holding. Leaves no trace in the tables.
    pub fn can_evaluate_bounds(&mut self, imp: ImplId, self_ty: &Ty) -> bool {
        let data = &self.items()[imp];
        self.in_snapshot(|ctx| {
            let subst = ctx.fresh_subst(&data.generics);
            let impl_self = subst.apply(data.self_ty.clone());
            if !ctx.combine_types(self_ty, &impl_self) {
                return false;
            }
            let mut queue = FulfillmentContext::new();
            queue.register_all(ctx.instantiate_bounds(&data.generics.bounds, &subst, 0));
            ctx.select_until_error(&mut queue)
        })
    }

    // ── Projections ────────────────────────────────────────────────────

    /// Normalizes `proj`, or returns `None` while it is ambiguous.
    pub fn opt_normalize_projection(
        &mut self,
        proj: &ProjectionTy,
        depth: u32,
    ) -> Option<TyWithObligations<Ty>> {
        let proj = self.resolve_vars_if_possible(proj.clone());
        if matches!(proj.self_ty(), Ty::Infer(InferTy::TyVar(_))) {
            return None;
        }
        match self.projection_cache.try_start(&proj) {
            Ok(()) => {}
            Err(ProjectionCacheEntry::Ambiguous) => return None,
            Err(ProjectionCacheEntry::InProgress) => {
                tracing::debug!(?proj, "recursive projection");
                return Some(TyWithObligations::plain(Ty::Unknown));
            }
            Err(ProjectionCacheEntry::Error) => {
                return Some(TyWithObligations::plain(Ty::Unknown));
            }
            Err(ProjectionCacheEntry::NormalizedTy(cached)) => {
                if self.has_unresolved_vars(&cached.value) {
                    return Some(cached);
                }
                // Fully resolved: the obligations are no longer needed.
                let plain = TyWithObligations::plain(cached.value);
                self.projection_cache.insert_ty(proj, plain.clone());
                return Some(plain);
            }
        }

        match self.select_projection(&proj, depth) {
            SelectionResult::Ok(Some(normalized)) => {
                let cached = self.prune_cached_obligations(&normalized);
                self.projection_cache.insert_ty(proj, cached);
                Some(normalized)
            }
            SelectionResult::Ok(None) => {
                let unnormalized = TyWithObligations::plain(Ty::Projection(Box::new(proj.clone())));
                self.projection_cache.insert_ty(proj, unnormalized.clone());
                Some(unnormalized)
            }
            SelectionResult::Err => {
                self.projection_cache.error(proj);
                Some(TyWithObligations::plain(Ty::Unknown))
            }
            SelectionResult::Ambiguous => {
                self.projection_cache.ambiguous(proj);
                None
            }
        }
    }

    fn prune_cached_obligations(
        &mut self,
        normalized: &TyWithObligations<Ty>,
    ) -> TyWithObligations<Ty> {
        if !self.has_unresolved_vars(&normalized.value) {
            return TyWithObligations::plain(normalized.value.clone());
        }
        let mut kept = Vec::new();
        for obligation in &normalized.obligations {
            if matches!(obligation.predicate, Predicate::Projection(..))
                && self.has_unresolved_vars(&obligation.predicate)
            {
                kept.push(obligation.clone());
            }
        }
        TyWithObligations::new(normalized.value.clone(), kept)
    }

    /// `Ok(None)` when the trait is known to hold but the associated type
    /// can only be named, not computed (a where-clause without a binding).
    fn select_projection(
        &mut self,
        proj: &ProjectionTy,
        depth: u32,
    ) -> SelectionResult<Option<TyWithObligations<Ty>>> {
        let goal = &proj.trait_ref;
        let source = match self.select(goal) {
            SelectionResult::Ok(source) => source,
            SelectionResult::Err => return SelectionResult::Err,
            SelectionResult::Ambiguous => return SelectionResult::Ambiguous,
        };
        match source {
            ImplSource::Impl(imp) => {
                let data = &self.items()[imp];
                let Some(assoc) = data.assoc_ty(&proj.name) else {
                    return SelectionResult::Err;
                };
                let Some((mut subst, impl_ref)) = self.instantiate_impl_header(imp) else {
                    return SelectionResult::Err;
                };
                if !self.combine_trait_refs(&impl_ref, goal) {
                    return SelectionResult::Err;
                }
                let mut obligations = self.instantiate_bounds(&data.generics.bounds, &subst, depth);
                subst.insert(TypeParamId::SELF, goal.self_ty.clone());
                let assoc = subst.apply(assoc.clone());
                let normalized = self.normalize_assoc_types_in(assoc, depth + 1);
                obligations.extend(normalized.obligations);
                SelectionResult::Ok(Some(TyWithObligations::new(normalized.value, obligations)))
            }
            ImplSource::Param(bound) | ImplSource::Object(bound) => {
                if bound.args.len() == goal.args.len()
                    && !self.combine_pairs(&bound.args, &goal.args)
                {
                    return SelectionResult::Err;
                }
                let assoc = bound.assoc_ty(&proj.name).cloned();
                SelectionResult::Ok(assoc.map(TyWithObligations::plain))
            }
            ImplSource::Builtin => match &goal.self_ty {
                Ty::Fn(sig) if proj.name == "Output" => {
                    if let Some(args) = goal.args.first() {
                        self.combine_types(&Ty::Tuple(sig.params.clone()), args);
                    }
                    SelectionResult::Ok(Some(TyWithObligations::plain((*sig.ret).clone())))
                }
                _ => SelectionResult::Ok(None),
            },
        }
    }

    /// Normalizes `proj`; while ambiguous, stands in a fresh variable tied
    /// to the projection by a deferred obligation.
    pub fn normalize_projection(
        &mut self,
        proj: &ProjectionTy,
        depth: u32,
    ) -> TyWithObligations<Ty> {
        if let Some(normalized) = self.opt_normalize_projection(proj, depth) {
            return normalized;
        }
        let var = self.new_ty_var();
        let obligation = Obligation::projection_eq(depth + 1, proj.clone(), var.clone());
        TyWithObligations::new(var, vec![obligation])
    }

    /// Normalizes every projection inside `value`.
    pub fn normalize_assoc_types_in<T: TypeFoldable>(
        &mut self,
        value: T,
        depth: u32,
    ) -> TyWithObligations<T> {
        if !contains(&value, &mut |ty| matches!(ty, Ty::Projection(_))) {
            return TyWithObligations::plain(value);
        }
        let mut normalizer = Normalizer { ctx: self, depth, obligations: Vec::new() };
        let value = value.fold_with(&mut normalizer);
        TyWithObligations::new(value, normalizer.obligations)
    }

    /// Normalizes `value` and registers the resulting obligations.
    pub fn normalize_and_register<T: TypeFoldable>(&mut self, value: T) -> T {
        let normalized = self.normalize_assoc_types_in(value, 0);
        self.fulfill.register_all(normalized.obligations);
        normalized.value
    }

    // ── Dereference ────────────────────────────────────────────────────

    /// One dereference step: built-in for references, raw pointers and
    /// boxes, otherwise through `Deref::Target`.
    pub fn deref_ty(&mut self, ty: &Ty) -> Option<Ty> {
        match ty {
            Ty::Ref(pointee, ..) | Ty::Ptr(pointee, _) => Some((**pointee).clone()),
            Ty::Adt(adt, args) if Some(*adt) == self.known().boxed => args.first().cloned(),
            Ty::Infer(_) | Ty::Unknown | Ty::Never => None,
            _ => self.deref_through_trait(ty),
        }
    }

    fn deref_through_trait(&mut self, ty: &Ty) -> Option<Ty> {
        let deref = self.known().deref?;
        let proj = ProjectionTy::new(TraitRef::new(ty.clone(), deref, Vec::new()), "Target");
        let normalized = self.opt_normalize_projection(&proj, 0)?;
        match normalized.value {
            Ty::Unknown | Ty::Projection(_) => None,
            target => {
                self.fulfill.register_all(normalized.obligations);
                Some(target)
            }
        }
    }

    /// `ty` followed by its successive dereferences, ending with the slice
    /// form of a trailing array. Raw pointers are not followed.
    pub fn deref_sequence(&mut self, ty: &Ty) -> Vec<Ty> {
        let limit = self.config().autoderef_limit;
        let mut seq: Vec<Ty> = Vec::new();
        let mut cur = Some(self.resolve_vars_with_obligations(ty.clone()));
        while let Some(ty) = cur.take() {
            if seq.len() >= limit || seq.contains(&ty) {
                break;
            }
            if !matches!(ty, Ty::Ptr(..)) {
                if let Some(next) = self.deref_ty(&ty) {
                    cur = Some(self.resolve_vars_with_obligations(next));
                }
            }
            seq.push(ty);
        }
        if let Some(Ty::Array(elem, _)) = seq.last() {
            let slice = Ty::slice((**elem).clone());
            seq.push(slice);
        }
        seq
    }

    // ── Results ────────────────────────────────────────────────────────

    /// Records the type of `expr`. Each expression is written exactly once.
    pub fn write_expr_ty(&mut self, expr: ExprId, ty: Ty) {
        let previous = self.expr_types.insert(expr, ty);
        assert!(previous.is_none(), "type of {expr:?} written twice; the body was walked twice");
    }

    pub fn expr_ty(&self, expr: ExprId) -> Ty {
        self.expr_types.get(&expr).cloned().unwrap_or(Ty::Unknown)
    }

    pub fn write_binding(&mut self, pat: PatId, ty: Ty) {
        self.bindings.insert(pat, ty);
    }

    pub fn binding_ty(&self, pat: PatId) -> Ty {
        self.bindings.get(&pat).cloned().unwrap_or(Ty::Unknown)
    }

    pub fn write_path(&mut self, expr: ExprId, resolutions: Vec<ValueNs>) {
        self.resolved_paths.insert(expr, resolutions);
    }

    pub fn resolved_path_of(&self, expr: ExprId) -> &[ValueNs] {
        self.resolved_paths.get(&expr).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn write_resolved_method(&mut self, expr: ExprId, methods: Vec<MethodResolution>) {
        self.resolved_methods.insert(expr, methods);
    }

    pub fn write_resolved_field(&mut self, expr: ExprId, fields: Vec<FieldResolution>) {
        self.resolved_fields.insert(expr, fields);
    }

    pub fn add_adjustments(
        &mut self,
        expr: ExprId,
        adjustments: impl IntoIterator<Item = Adjustment>,
    ) {
        self.adjustments.entry(expr).or_default().extend(adjustments);
    }

    pub fn adjustments_of(&self, expr: ExprId) -> &[Adjustment] {
        self.adjustments.get(&expr).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn diagnostics(&self) -> &[InferenceDiagnostic] {
        &self.diagnostics
    }

    pub fn register_path_refinement(&mut self, expr: ExprId, trait_ref: TraitRef) {
        self.path_refinements.push((expr, trait_ref));
    }

    pub fn register_method_refinement(&mut self, expr: ExprId, trait_ref: TraitRef) {
        self.method_refinements.push((expr, trait_ref));
    }

    pub fn report_cannot_deref(&mut self, expr: ExprId, ty: Ty) {
        self.diagnostics.push(InferenceDiagnostic::CannotDeref { expr, ty });
    }

    /// Records a mismatch unless either side is too unresolved to judge or
    /// a diagnostic already sits inside `site`.
    pub fn report_type_mismatch(&mut self, site: ExprOrPatId, expected: &Ty, actual: &Ty) {
        if !self.config().report_mismatches {
            return;
        }
        let expected = self.resolve_vars_if_possible(expected.clone());
        let actual = self.resolve_vars_if_possible(actual.clone());
        if is_placeholder_like(&expected) || is_placeholder_like(&actual) {
            return;
        }
        if let ExprOrPatId::Expr(expr) = site {
            let body = self.body;
            let nested = self.diagnostics.iter().any(|diag| match diag.site() {
                ExprOrPatId::Expr(other) => body.is_ancestor_of(expr, other),
                ExprOrPatId::Pat(_) => false,
            });
            if nested {
                return;
            }
        }
        tracing::trace!(?site, expected = %expected, actual = %actual, "type mismatch");
        self.diagnostics.push(InferenceDiagnostic::TypeMismatch { site, expected, actual });
    }

    // ── Finishing ──────────────────────────────────────────────────────

    /// Runs the post-walk passes and produces the result: obligations,
    /// numeric defaulting, obligations again, then refinement.
    pub(crate) fn finish(mut self) -> InferenceResult {
        self.select_where_possible();
        self.default_numeric_vars();
        self.select_where_possible();
        self.refine_paths();
        self.refine_methods();

        let expr_types = std::mem::take(&mut self.expr_types);
        let expr_types =
            expr_types.into_iter().map(|(expr, ty)| (expr, self.fully_resolve(ty))).collect();
        let bindings = std::mem::take(&mut self.bindings);
        let bindings =
            bindings.into_iter().map(|(pat, ty)| (pat, self.fully_resolve(ty))).collect();
        let resolved_methods = std::mem::take(&mut self.resolved_methods);
        let resolved_methods = resolved_methods
            .into_iter()
            .map(|(expr, methods)| {
                let methods = methods
                    .into_iter()
                    .map(|m| MethodResolution { self_ty: self.fully_resolve(m.self_ty), ..m })
                    .collect();
                (expr, methods)
            })
            .collect();
        let adjustments = std::mem::take(&mut self.adjustments);
        let adjustments = adjustments
            .into_iter()
            .map(|(expr, adjs)| {
                (expr, adjs.into_iter().map(|adj| self.resolve_adjustment(adj)).collect())
            })
            .collect();
        let diagnostics = std::mem::take(&mut self.diagnostics);
        let diagnostics =
            diagnostics.into_iter().map(|diag| self.resolve_diagnostic(diag)).collect();

        tracing::debug!(owner = ?self.owner, "inference finished");
        InferenceResult {
            expr_types,
            bindings,
            resolved_paths: self.resolved_paths,
            resolved_methods,
            resolved_fields: self.resolved_fields,
            adjustments,
            diagnostics,
            timestamp: Instant::now(),
        }
    }

    /// Binds every still-unresolved integer and float variable to the
    /// default width. Runs once, between the two obligation rounds.
    fn default_numeric_vars(&mut self) {
        let tys: Vec<Ty> =
            self.expr_types.values().chain(self.bindings.values()).cloned().collect();
        for ty in tys {
            let ty = self.resolve_vars_if_possible(ty);
            let mut vars = Vec::new();
            contains(&ty, &mut |t| {
                if let Ty::Infer(var @ (InferTy::IntVar(_) | InferTy::FloatVar(_))) = t {
                    vars.push(*var);
                }
                false
            });
            for var in vars {
                match var {
                    InferTy::IntVar(vid) if self.int_table.find_value(vid).is_none() => {
                        tracing::trace!(?vid, "defaulting integer variable");
                        self.int_table.unify_var_value(vid, IntTy::DEFAULT);
                    }
                    InferTy::FloatVar(vid) if self.float_table.find_value(vid).is_none() => {
                        tracing::trace!(?vid, "defaulting float variable");
                        self.float_table.unify_var_value(vid, FloatTy::DEFAULT);
                    }
                    _ => {}
                }
            }
        }
    }

    fn refine_paths(&mut self) {
        let items = self.items();
        for (expr, trait_ref) in std::mem::take(&mut self.path_refinements) {
            let first = self.resolved_paths.get(&expr).and_then(|v| v.first()).copied();
            let Some(ValueNs::Function(func)) = first else {
                continue;
            };
            let trait_ref = self.resolve_vars_if_possible(trait_ref);
            if let SelectionResult::Ok(ImplSource::Impl(imp)) = self.select(&trait_ref) {
                if let Some(concrete) = items.impl_method(imp, &items[func].name) {
                    tracing::debug!(?expr, ?concrete, "refined path");
                    self.resolved_paths.insert(expr, vec![ValueNs::Function(concrete)]);
                }
            }
        }
    }

    fn refine_methods(&mut self) {
        let items = self.items();
        for (expr, trait_ref) in std::mem::take(&mut self.method_refinements) {
            let first = self.resolved_methods.get(&expr).and_then(|v| v.first()).cloned();
            let Some(first) = first else {
                continue;
            };
            let trait_ref = self.resolve_vars_if_possible(trait_ref);
            if let SelectionResult::Ok(ImplSource::Impl(imp)) = self.select(&trait_ref) {
                if let Some(concrete) = items.impl_method(imp, &items[first.func].name) {
                    tracing::debug!(?expr, ?concrete, "refined method");
                    let refined = MethodResolution {
                        func: concrete,
                        source: MethodSource::Impl(imp),
                        ..first
                    };
                    self.resolved_methods.insert(expr, vec![refined]);
                }
            }
        }
    }

    fn resolve_adjustment(&mut self, adjustment: Adjustment) -> Adjustment {
        match adjustment {
            Adjustment::Deref(target) => Adjustment::Deref(self.fully_resolve(target)),
            Adjustment::BorrowReference { target, region, mutability } => {
                let target = self.fully_resolve(target);
                Adjustment::BorrowReference { target, region, mutability }
            }
            Adjustment::BorrowPointer { target, mutability } => {
                Adjustment::BorrowPointer { target: self.fully_resolve(target), mutability }
            }
        }
    }

    fn resolve_diagnostic(&mut self, diag: InferenceDiagnostic) -> InferenceDiagnostic {
        match diag {
            InferenceDiagnostic::TypeMismatch { site, expected, actual } => {
                InferenceDiagnostic::TypeMismatch {
                    site,
                    expected: self.fully_resolve(expected),
                    actual: self.fully_resolve(actual),
                }
            }
            InferenceDiagnostic::CannotDeref { expr, ty } => {
                InferenceDiagnostic::CannotDeref { expr, ty: self.fully_resolve(ty) }
            }
        }
    }
}

// ── Folders ────────────────────────────────────────────────────────────

struct Resolver<'c, 'a> {
    ctx: &'c mut InferCtx<'a>,
    fallback: bool,
}

impl TypeFolder for Resolver<'_, '_> {
    fn fold_ty(&mut self, ty: Ty) -> Ty {
        if !ty.has_infer() {
            return ty;
        }
        match ty {
            Ty::Infer(_) => match self.ctx.shallow_resolve(&ty) {
                Ty::Infer(_) if self.fallback => Ty::Unknown,
                unresolved @ Ty::Infer(_) => unresolved,
                resolved => self.fold_ty(resolved),
            },
            _ => ty.super_fold_with(self),
        }
    }
}

struct Normalizer<'c, 'a> {
    ctx: &'c mut InferCtx<'a>,
    depth: u32,
    obligations: Vec<Obligation>,
}

impl TypeFolder for Normalizer<'_, '_> {
    fn fold_ty(&mut self, ty: Ty) -> Ty {
        match ty.super_fold_with(self) {
            Ty::Projection(proj) => {
                let normalized = self.ctx.normalize_projection(&proj, self.depth);
                self.obligations.extend(normalized.obligations);
                normalized.value
            }
            other => other,
        }
    }
}

/// Whether `pred` holds for any type nested in `value`.
pub(crate) fn contains<T: TypeFoldable>(value: &T, pred: &mut dyn FnMut(&Ty) -> bool) -> bool {
    struct Contains<'p>(&'p mut dyn FnMut(&Ty) -> bool);
    impl TypeVisitor for Contains<'_> {
        fn visit_ty(&mut self, ty: &Ty) -> bool {
            (self.0)(ty) || ty.super_visit_with(self)
        }
    }
    value.visit_with(&mut Contains(pred))
}

/// Too unresolved or too dynamic to judge a mismatch against.
fn is_placeholder_like(ty: &Ty) -> bool {
    ty.any(&mut |t| {
        matches!(
            t,
            Ty::Unknown
                | Ty::Infer(InferTy::TyVar(_))
                | Ty::Param(_)
                | Ty::Projection(_)
                | Ty::Dyn(_)
                | Ty::Opaque(_)
        )
    })
}
