//! Inference diagnostics and fatal errors.
//!
//! Type mismatches and failed dereferences are recoverable: they are
//! recorded as `InferenceDiagnostic`s and inference carries on. Only
//! cancellation and reentrant inference of the same body abort a run.

use std::fmt;

use quarry_hir::body::{BodyOwner, ExprId, ExprOrPatId};
use quarry_hir::ty::Ty;
use quarry_hir::ItemTree;

/// A recoverable problem found while inferring a body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InferenceDiagnostic {
    /// A value of type `actual` flows into a slot expecting `expected`.
    TypeMismatch { site: ExprOrPatId, expected: Ty, actual: Ty },
    /// `*expr` where `ty` has no built-in or `Deref` dereference.
    CannotDeref { expr: ExprId, ty: Ty },
}

impl InferenceDiagnostic {
    /// The node the diagnostic is attached to.
    pub fn site(&self) -> ExprOrPatId {
        match self {
            InferenceDiagnostic::TypeMismatch { site, .. } => *site,
            InferenceDiagnostic::CannotDeref { expr, .. } => ExprOrPatId::Expr(*expr),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            InferenceDiagnostic::TypeMismatch { .. } => "T0001",
            InferenceDiagnostic::CannotDeref { .. } => "T0002",
        }
    }

    /// The message with declaration names looked up in `items`.
    pub fn message(&self, items: &ItemTree) -> String {
        match self {
            InferenceDiagnostic::TypeMismatch { expected, actual, .. } => {
                format!(
                    "mismatched types: expected `{}`, found `{}`",
                    expected.display(items),
                    actual.display(items)
                )
            }
            InferenceDiagnostic::CannotDeref { ty, .. } => {
                format!("type `{}` cannot be dereferenced", ty.display(items))
            }
        }
    }
}

impl fmt::Display for InferenceDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceDiagnostic::TypeMismatch { expected, actual, .. } => {
                write!(f, "mismatched types: expected `{}`, found `{}`", expected, actual)
            }
            InferenceDiagnostic::CannotDeref { ty, .. } => {
                write!(f, "type `{}` cannot be dereferenced", ty)
            }
        }
    }
}

/// Inference was abandoned because the caller raised its cancellation flag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("type inference was cancelled")]
pub struct Cancelled;

/// Why `InferenceSession::infer` produced no result.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InferError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    /// The body is already being inferred further up the stack.
    #[error("inference of {0:?} depends on itself")]
    Cycle(BodyOwner),
    #[error("no body is known for {0:?}")]
    MissingBody(BodyOwner),
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_hir::ty::IntTy;

    #[test]
    fn display_uses_plain_type_rendering() {
        let diag = InferenceDiagnostic::TypeMismatch {
            site: ExprOrPatId::Expr(ExprId(3)),
            expected: Ty::Bool,
            actual: Ty::Int(IntTy::I32),
        };
        assert_eq!(diag.to_string(), "mismatched types: expected `bool`, found `i32`");
        assert_eq!(diag.code(), "T0001");
        assert_eq!(diag.site(), ExprOrPatId::Expr(ExprId(3)));
    }

    #[test]
    fn cancelled_converts_into_infer_error() {
        let err: InferError = Cancelled.into();
        assert_eq!(err.to_string(), "type inference was cancelled");
    }
}
