//! Name resolution results for one body.
//!
//! Resolution itself happens in the front end; this table is what it hands
//! to inference. A path may resolve to several candidates (an ambiguous
//! associated function reached through different impls), which inference
//! narrows down.

use rustc_hash::FxHashMap;

use crate::body::{ExprId, ExprOrPatId, PatId};
use crate::item::{AdtId, ConstId, FunctionId, TraitId, VariantRef};
use crate::ty::Substitution;

/// What a value path names.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ValueNs {
    /// A binding introduced by a pattern in the same body.
    Local(PatId),
    Function(FunctionId),
    Const(ConstId),
    /// A tuple or unit struct used as a value.
    Struct(AdtId),
    /// A tuple or unit enum variant used as a value.
    Variant(AdtId, u32),
}

/// One candidate for a path, with the generic arguments written at the use
/// site (`Vec::<u8>::new`, `<S as Trait>::f`, turbofish).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathResolution {
    pub value: ValueNs,
    pub subst: Substitution,
}

impl PathResolution {
    pub fn new(value: ValueNs) -> PathResolution {
        PathResolution { value, subst: Substitution::new() }
    }

    pub fn with_subst(value: ValueNs, subst: Substitution) -> PathResolution {
        PathResolution { value, subst }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedNames {
    paths: FxHashMap<ExprId, Vec<PathResolution>>,
    variants: FxHashMap<ExprOrPatId, (VariantRef, Substitution)>,
    traits_in_scope: Option<Vec<TraitId>>,
}

impl ResolvedNames {
    pub fn record_path(&mut self, expr: ExprId, resolutions: Vec<PathResolution>) {
        self.paths.insert(expr, resolutions);
    }

    pub fn record_variant(&mut self, site: ExprOrPatId, variant: VariantRef, subst: Substitution) {
        self.variants.insert(site, (variant, subst));
    }

    /// Restricts the traits whose methods are callable with method syntax.
    /// Without this, every trait counts as imported.
    pub fn set_traits_in_scope(&mut self, traits: Vec<TraitId>) {
        self.traits_in_scope = Some(traits);
    }

    pub fn path(&self, expr: ExprId) -> &[PathResolution] {
        self.paths.get(&expr).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn variant(&self, site: ExprOrPatId) -> Option<&(VariantRef, Substitution)> {
        self.variants.get(&site)
    }

    pub fn traits_in_scope(&self) -> Option<&[TraitId]> {
        self.traits_in_scope.as_deref()
    }
}
