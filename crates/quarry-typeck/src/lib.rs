//! Quarry type inference: tolerant, per-body, bidirectional.
//!
//! Infers a type for every expression and pattern of one function,
//! constant, array length or enum discriminant, resolving paths, methods,
//! fields and operators along the way. Inference always completes with a
//! total typing; what cannot be determined is reported as unknown.
//!
//! # Architecture
//!
//! - [`unify`]: snapshot-able union-find over inference variables
//! - [`projection`]: memoized normalization state for associated types
//! - [`obligation`]: deferred trait and projection requirements
//! - [`select`]: the trait selection seam and the impl-matching lookup
//! - [`context`]: per-body state, unification, fulfillment, normalization
//! - [`coerce`]: implicit coercions at typed slots
//! - [`infer`]: the expression and pattern walker
//! - [`result`]: the immutable inference result
//! - [`diagnostics`]: ariadne and JSON rendering of diagnostics
//! - [`session`]: entry point, cancellation and reentrancy guard

pub mod coerce;
pub mod config;
pub mod context;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod infer;
pub mod obligation;
pub mod projection;
pub mod result;
pub mod select;
pub mod session;
pub mod unify;

pub use config::InferenceConfig;
pub use db::{HirDatabase, MemoryDatabase};
pub use error::{Cancelled, InferError, InferenceDiagnostic};
pub use result::{Adjustment, FieldResolution, InferenceResult, MethodResolution, MethodSource};
pub use session::{infer_body, CancellationFlag, InferenceSession};
