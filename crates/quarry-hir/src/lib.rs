//! Input model for the quarry type inference engine.
//!
//! Provides the data inference consumes but never mutates:
//! - `ty`: the type representation and substitutions
//! - `fold`: folding and visiting over types
//! - `item`: declarations (ADTs, functions, traits, impls, constants)
//! - `known`: well-known standard library items
//! - `body`: expression and pattern arenas for one body
//! - `resolve`: name resolution results for a body

pub mod body;
pub mod fold;
pub mod item;
pub mod known;
pub mod resolve;
pub mod ty;

pub use body::{Body, BodyBuilder, BodyOwner, Expr, ExprId, ExprOrPatId, Pat, PatId};
pub use item::ItemTree;
pub use known::KnownItems;
pub use resolve::{PathResolution, ResolvedNames, ValueNs};
pub use ty::{Substitution, Ty};
