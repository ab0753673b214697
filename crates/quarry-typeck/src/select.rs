//! Trait selection: given `T: Trait<Args>`, find what satisfies it.
//!
//! Inference only consumes selection verdicts through the `TraitSelection`
//! trait. `ImplLookup` is the implementation used by `MemoryDatabase`: it
//! matches impl headers structurally, treating impl generics as pattern
//! variables and unresolved inference variables as "maybe".

use rustc_hash::FxHashMap;

use quarry_hir::body::BodyOwner;
use quarry_hir::item::{FnOwner, ImplId, ItemTree, TypeParamId, WherePredicate};
use quarry_hir::ty::{BoundTrait, InferTy, TraitRef, Ty};
use quarry_hir::KnownItems;

/// Verdict of a selection or normalization attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionResult<T> {
    Ok(T),
    /// Nothing can satisfy the goal.
    Err,
    /// Undecidable until more inference variables are resolved.
    Ambiguous,
}

impl<T> SelectionResult<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            SelectionResult::Ok(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SelectionResult<U> {
        match self {
            SelectionResult::Ok(value) => SelectionResult::Ok(f(value)),
            SelectionResult::Err => SelectionResult::Err,
            SelectionResult::Ambiguous => SelectionResult::Ambiguous,
        }
    }
}

/// Where a selected trait implementation comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImplSource {
    /// A user-written impl block.
    Impl(ImplId),
    /// A where-clause of the body being inferred.
    Param(BoundTrait),
    /// A bound of a trait object or opaque type.
    Object(BoundTrait),
    /// Provided by the language, such as the function traits for `fn` types.
    Builtin,
}

/// The where-clauses in scope for a body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParamEnv {
    pub bounds: Vec<WherePredicate>,
}

impl ParamEnv {
    pub fn empty() -> ParamEnv {
        ParamEnv::default()
    }

    /// Collects the bounds of a function, its impl or trait, and `Self:
    /// Trait` for trait methods. Other owners have no generics.
    pub fn for_owner(items: &ItemTree, owner: BodyOwner) -> ParamEnv {
        let BodyOwner::Function(func) = owner else {
            return ParamEnv::empty();
        };
        let data = &items[func];
        let mut bounds = data.generics.bounds.clone();
        match data.owner {
            FnOwner::Free => {}
            FnOwner::Impl(imp) => bounds.extend(items[imp].generics.bounds.iter().cloned()),
            FnOwner::Trait(tr) => {
                let trait_data = &items[tr];
                bounds.extend(trait_data.generics.bounds.iter().cloned());
                bounds.push(WherePredicate {
                    self_ty: Ty::Param(TypeParamId::SELF),
                    bound: BoundTrait::new(tr, trait_data.generics.param_tys()),
                });
            }
        }
        ParamEnv { bounds }
    }

    /// Bounds whose self type is exactly `self_ty`.
    pub fn bounds_for<'e>(&'e self, self_ty: &'e Ty) -> impl Iterator<Item = &'e BoundTrait> + 'e {
        self.bounds.iter().filter(move |pred| &pred.self_ty == self_ty).map(|pred| &pred.bound)
    }
}

/// Decides trait goals. Implementations must be safe to share between
/// threads inferring different bodies.
pub trait TraitSelection: Sync {
    fn select(
        &self,
        items: &ItemTree,
        known: &KnownItems,
        goal: &TraitRef,
        env: &ParamEnv,
    ) -> SelectionResult<ImplSource>;
}

// ── ImplLookup ─────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, Default)]
pub struct ImplLookup;

impl TraitSelection for ImplLookup {
    fn select(
        &self,
        items: &ItemTree,
        known: &KnownItems,
        goal: &TraitRef,
        env: &ParamEnv,
    ) -> SelectionResult<ImplSource> {
        let self_ty = &goal.self_ty;
        if matches!(self_ty, Ty::Infer(InferTy::TyVar(_)) | Ty::Unknown) {
            return SelectionResult::Ambiguous;
        }

        let mut env_maybe = false;
        for pred in env.bounds.iter().filter(|pred| pred.bound.trait_id == goal.trait_id) {
            let mut matcher = HeaderMatcher::new(&[]);
            let verdict = matcher.match_all(
                std::iter::once(&pred.self_ty).chain(&pred.bound.args),
                std::iter::once(self_ty).chain(&goal.args),
            );
            match verdict {
                Match::Yes => return SelectionResult::Ok(ImplSource::Param(pred.bound.clone())),
                Match::Maybe => env_maybe = true,
                Match::No => {}
            }
        }

        match self_ty {
            Ty::Dyn(bound) if bound.trait_id == goal.trait_id => {
                return SelectionResult::Ok(ImplSource::Object(bound.clone()));
            }
            Ty::Opaque(opaque) => {
                if let Some(bound) = opaque.bounds.iter().find(|b| b.trait_id == goal.trait_id) {
                    return SelectionResult::Ok(ImplSource::Object(bound.clone()));
                }
            }
            Ty::Fn(_) if known.is_fn_trait(goal.trait_id) => {
                return SelectionResult::Ok(ImplSource::Builtin);
            }
            _ => {}
        }

        let candidates: Vec<ImplId> = items
            .impls_of_trait(goal.trait_id)
            .iter()
            .copied()
            .filter(|imp| impl_may_apply(items, *imp, goal))
            .collect();
        tracing::trace!(goal = ?goal, candidates = candidates.len(), "select");
        match candidates.as_slice() {
            [] if env_maybe => SelectionResult::Ambiguous,
            [] => SelectionResult::Err,
            [only] => SelectionResult::Ok(ImplSource::Impl(*only)),
            _ => SelectionResult::Ambiguous,
        }
    }
}

fn impl_may_apply(items: &ItemTree, imp: ImplId, goal: &TraitRef) -> bool {
    let data = &items[imp];
    let Some((_, impl_args)) = &data.trait_ref else {
        return false;
    };
    if impl_args.len() != goal.args.len() {
        return false;
    }
    let mut matcher = HeaderMatcher::new(&data.generics.params);
    let verdict = matcher.match_all(
        std::iter::once(&data.self_ty).chain(impl_args),
        std::iter::once(&goal.self_ty).chain(&goal.args),
    );
    verdict != Match::No
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Match {
    No,
    Maybe,
    Yes,
}

/// Matches an impl header (the pattern) against a goal. Pattern variables
/// bind on first sight; later occurrences must match the bound type.
struct HeaderMatcher<'p> {
    params: &'p [TypeParamId],
    bound: FxHashMap<TypeParamId, Ty>,
}

impl<'p> HeaderMatcher<'p> {
    fn new(params: &'p [TypeParamId]) -> Self {
        HeaderMatcher { params, bound: FxHashMap::default() }
    }

    fn match_all<'t>(
        &mut self,
        patterns: impl IntoIterator<Item = &'t Ty>,
        goals: impl IntoIterator<Item = &'t Ty>,
    ) -> Match {
        let mut verdict = Match::Yes;
        for (pattern, goal) in patterns.into_iter().zip(goals) {
            verdict = verdict.min(self.match_ty(pattern, goal));
            if verdict == Match::No {
                break;
            }
        }
        verdict
    }

    fn match_ty(&mut self, pattern: &Ty, goal: &Ty) -> Match {
        match (pattern, goal) {
            (Ty::Param(param), _) if self.params.contains(param) => {
                match self.bound.get(param).cloned() {
                    Some(previous) => HeaderMatcher::new(&[]).match_ty(&previous, goal),
                    None => {
                        self.bound.insert(*param, goal.clone());
                        Match::Yes
                    }
                }
            }
            (Ty::Infer(InferTy::IntVar(_)), Ty::Int(_))
            | (Ty::Int(_), Ty::Infer(InferTy::IntVar(_)))
            | (Ty::Infer(InferTy::FloatVar(_)), Ty::Float(_))
            | (Ty::Float(_), Ty::Infer(InferTy::FloatVar(_))) => Match::Maybe,
            (Ty::Infer(InferTy::IntVar(_)), Ty::Infer(InferTy::IntVar(_)))
            | (Ty::Infer(InferTy::FloatVar(_)), Ty::Infer(InferTy::FloatVar(_))) => Match::Maybe,
            (Ty::Infer(InferTy::IntVar(_) | InferTy::FloatVar(_)), Ty::Infer(InferTy::TyVar(_)))
            | (
                Ty::Infer(InferTy::TyVar(_)),
                Ty::Infer(InferTy::IntVar(_) | InferTy::FloatVar(_)),
            ) => Match::Maybe,
            (Ty::Infer(InferTy::IntVar(_) | InferTy::FloatVar(_)), _)
            | (_, Ty::Infer(InferTy::IntVar(_) | InferTy::FloatVar(_))) => Match::No,
            (Ty::Infer(InferTy::TyVar(_)), _) | (_, Ty::Infer(InferTy::TyVar(_))) => Match::Maybe,
            (Ty::Unknown, _) | (_, Ty::Unknown) => Match::Maybe,
            (Ty::Projection(_), _) | (_, Ty::Projection(_)) => Match::Maybe,
            (Ty::Ref(a, m1, _), Ty::Ref(b, m2, _)) | (Ty::Ptr(a, m1), Ty::Ptr(b, m2)) => {
                if m1 != m2 {
                    return Match::No;
                }
                self.match_ty(a, b)
            }
            (Ty::Array(a, len_a), Ty::Array(b, len_b)) => match (len_a, len_b) {
                (Some(x), Some(y)) if x != y => Match::No,
                _ => self.match_ty(a, b),
            },
            (Ty::Slice(a), Ty::Slice(b)) => self.match_ty(a, b),
            (Ty::Tuple(a), Ty::Tuple(b)) if a.len() == b.len() => self.match_all(a, b),
            (Ty::Fn(a), Ty::Fn(b)) if a.params.len() == b.params.len() => {
                self.match_all(a.params.iter().chain([&*a.ret]), b.params.iter().chain([&*b.ret]))
            }
            (Ty::Adt(x, a), Ty::Adt(y, b)) if x == y && a.len() == b.len() => self.match_all(a, b),
            (Ty::Dyn(a), Ty::Dyn(b))
                if a.trait_id == b.trait_id && a.args.len() == b.args.len() =>
            {
                self.match_all(&a.args, &b.args)
            }
            (a, b) if a == b => Match::Yes,
            _ => Match::No,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_hir::item::{Generics, ImplData, TraitData, TraitId};
    use quarry_hir::ty::{IntTy, IntVid, TyVid};

    fn tree_with_impls(self_tys: &[Ty]) -> (ItemTree, TraitId) {
        let mut items = ItemTree::new();
        let tr = items.alloc_trait(TraitData {
            name: "Show".into(),
            generics: Generics::default(),
            assoc_types: Vec::new(),
            methods: Vec::new(),
        });
        for self_ty in self_tys {
            items.alloc_impl(ImplData {
                generics: Generics::default(),
                trait_ref: Some((tr, Vec::new())),
                self_ty: self_ty.clone(),
                methods: Vec::new(),
                assoc_types: Vec::new(),
            });
        }
        (items, tr)
    }

    fn select(items: &ItemTree, goal: TraitRef) -> SelectionResult<ImplSource> {
        ImplLookup.select(items, &KnownItems::default(), &goal, &ParamEnv::empty())
    }

    #[test]
    fn unique_impl_is_selected() {
        let (items, tr) = tree_with_impls(&[Ty::Bool, Ty::Char]);
        assert_eq!(
            select(&items, TraitRef::new(Ty::Char, tr, vec![])),
            SelectionResult::Ok(ImplSource::Impl(ImplId(1)))
        );
        assert_eq!(select(&items, TraitRef::new(Ty::Str, tr, vec![])), SelectionResult::Err);
    }

    #[test]
    fn type_variable_self_is_ambiguous() {
        let (items, tr) = tree_with_impls(&[Ty::Bool]);
        let goal = TraitRef::new(Ty::ty_var(TyVid(0)), tr, vec![]);
        assert_eq!(select(&items, goal), SelectionResult::Ambiguous);
    }

    #[test]
    fn integer_variable_matches_integer_impls_only() {
        let (items, tr) = tree_with_impls(&[Ty::Bool, Ty::Int(IntTy::U8)]);
        let goal = TraitRef::new(Ty::int_var(IntVid(0)), tr, vec![]);
        assert_eq!(select(&items, goal), SelectionResult::Ok(ImplSource::Impl(ImplId(1))));

        let (items, tr) = tree_with_impls(&[Ty::Int(IntTy::U8), Ty::Int(IntTy::I64)]);
        let goal = TraitRef::new(Ty::int_var(IntVid(0)), tr, vec![]);
        assert_eq!(select(&items, goal), SelectionResult::Ambiguous);
    }

    #[test]
    fn impl_params_bind_consistently() {
        let mut items = ItemTree::new();
        let t = items.alloc_type_param("T");
        let tr = items.alloc_trait(TraitData {
            name: "Same".into(),
            generics: Generics::default(),
            assoc_types: Vec::new(),
            methods: Vec::new(),
        });
        items.alloc_impl(ImplData {
            generics: Generics { params: vec![t], bounds: Vec::new() },
            trait_ref: Some((tr, vec![Ty::Param(t)])),
            self_ty: Ty::Tuple(vec![Ty::Param(t)]),
            methods: Vec::new(),
            assoc_types: Vec::new(),
        });
        let hit = TraitRef::new(Ty::Tuple(vec![Ty::Bool]), tr, vec![Ty::Bool]);
        let miss = TraitRef::new(Ty::Tuple(vec![Ty::Bool]), tr, vec![Ty::Char]);
        assert!(matches!(select(&items, hit), SelectionResult::Ok(ImplSource::Impl(_))));
        assert_eq!(select(&items, miss), SelectionResult::Err);
    }

    #[test]
    fn where_clause_satisfies_param_goal() {
        let mut items = ItemTree::new();
        let t = items.alloc_type_param("T");
        let tr = items.alloc_trait(TraitData {
            name: "Show".into(),
            generics: Generics::default(),
            assoc_types: Vec::new(),
            methods: Vec::new(),
        });
        let env = ParamEnv {
            bounds: vec![WherePredicate {
                self_ty: Ty::Param(t),
                bound: BoundTrait::new(tr, vec![]),
            }],
        };
        let goal = TraitRef::new(Ty::Param(t), tr, vec![]);
        let verdict = ImplLookup.select(&items, &KnownItems::default(), &goal, &env);
        assert_eq!(verdict, SelectionResult::Ok(ImplSource::Param(BoundTrait::new(tr, vec![]))));
    }
}
