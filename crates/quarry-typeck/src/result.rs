//! The immutable outcome of inferring one body.

use std::time::Instant;

use rustc_hash::FxHashMap;
use serde::Serialize;

use quarry_hir::body::{Body, ExprId, PatId};
use quarry_hir::item::{FunctionId, ImplId, TraitId, VariantRef};
use quarry_hir::ty::{Mutability, Region, Ty};
use quarry_hir::{ItemTree, ValueNs};

use crate::diagnostics::{render_diagnostic, DiagnosticOptions};
use crate::error::InferenceDiagnostic;

/// An implicit conversion applied to an expression before its value is used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Adjustment {
    /// One dereference step, producing `target`.
    Deref(Ty),
    BorrowReference { target: Ty, region: Region, mutability: Mutability },
    BorrowPointer { target: Ty, mutability: Mutability },
}

/// How a method was found.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum MethodSource {
    /// Declared in (or inherited by) this impl.
    Impl(ImplId),
    /// Through a where-clause of the enclosing item.
    TraitBound(TraitId),
    /// Through a bound of a trait object or opaque type.
    Object(TraitId),
    /// Several impls of this trait matched; the trait's own declaration
    /// stands in for them.
    Collapsed(TraitId),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MethodResolution {
    pub func: FunctionId,
    /// The receiver type at the dereference depth the method was found.
    pub self_ty: Ty,
    pub deref_count: usize,
    pub source: MethodSource,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum FieldResolution {
    /// Field `index` of a struct or enum variant.
    Field { variant: VariantRef, index: usize },
    /// Element `index` of a tuple.
    TupleIndex(usize),
}

#[derive(Clone, Debug)]
pub struct InferenceResult {
    pub(crate) expr_types: FxHashMap<ExprId, Ty>,
    pub(crate) bindings: FxHashMap<PatId, Ty>,
    pub(crate) resolved_paths: FxHashMap<ExprId, Vec<ValueNs>>,
    pub(crate) resolved_methods: FxHashMap<ExprId, Vec<MethodResolution>>,
    pub(crate) resolved_fields: FxHashMap<ExprId, Vec<FieldResolution>>,
    pub(crate) adjustments: FxHashMap<ExprId, Vec<Adjustment>>,
    pub(crate) diagnostics: Vec<InferenceDiagnostic>,
    pub(crate) timestamp: Instant,
}

impl InferenceResult {
    /// The type of `expr`; unknown for expressions that were never walked.
    pub fn expr_type(&self, expr: ExprId) -> Ty {
        self.expr_types.get(&expr).cloned().unwrap_or(Ty::Unknown)
    }

    pub fn is_expr_type_inferred(&self, expr: ExprId) -> bool {
        self.expr_types.contains_key(&expr)
    }

    pub fn binding_type(&self, pat: PatId) -> Ty {
        self.bindings.get(&pat).cloned().unwrap_or(Ty::Unknown)
    }

    pub fn resolved_path(&self, expr: ExprId) -> &[ValueNs] {
        self.resolved_paths.get(&expr).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn resolved_method(&self, expr: ExprId) -> &[MethodResolution] {
        self.resolved_methods.get(&expr).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn resolved_field(&self, expr: ExprId) -> &[FieldResolution] {
        self.resolved_fields.get(&expr).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn adjustments(&self, expr: ExprId) -> &[Adjustment] {
        self.adjustments.get(&expr).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn diagnostics(&self) -> &[InferenceDiagnostic] {
        &self.diagnostics
    }

    /// When the result was produced. Later results have later timestamps.
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Render every diagnostic against the body's source text.
    pub fn render_diagnostics(
        &self,
        items: &ItemTree,
        body: &Body,
        source: &str,
        options: &DiagnosticOptions,
    ) -> Vec<String> {
        self.diagnostics
            .iter()
            .map(|diag| render_diagnostic(diag, items, body, source, options))
            .collect()
    }

    /// One `expr: type` line per inferred expression, in expression order.
    pub fn dump_expr_types(&self, items: &ItemTree) -> String {
        let mut exprs: Vec<_> = self.expr_types.iter().collect();
        exprs.sort_by_key(|(expr, _)| **expr);
        let mut out = String::new();
        for (expr, ty) in exprs {
            out.push_str(&format!("{}: {}\n", expr.0, ty.display(items)));
        }
        out
    }
}
