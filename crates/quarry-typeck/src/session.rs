//! Entry point: inferring bodies, with cancellation and a reentrancy guard.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use quarry_hir::BodyOwner;

use crate::config::InferenceConfig;
use crate::context::InferCtx;
use crate::db::HirDatabase;
use crate::error::{Cancelled, InferError};
use crate::infer;
use crate::result::InferenceResult;

/// A flag another thread can raise to abandon running inference.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Infers bodies on one thread. Constants without a declared type are
/// inferred on demand through the same session, which is how cycles
/// between bodies are detected.
pub struct InferenceSession<'db> {
    db: &'db dyn HirDatabase,
    config: InferenceConfig,
    cancellation: CancellationFlag,
    in_progress: RefCell<Vec<BodyOwner>>,
}

impl<'db> InferenceSession<'db> {
    pub fn new(db: &'db dyn HirDatabase) -> Self {
        InferenceSession {
            db,
            config: InferenceConfig::default(),
            cancellation: CancellationFlag::new(),
            in_progress: RefCell::new(Vec::new()),
        }
    }

    pub fn with_config(mut self, config: InferenceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn db(&self) -> &'db dyn HirDatabase {
        self.db
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    /// Infers `owner`'s body. A request for a body that is already being
    /// inferred further up the stack returns `InferError::Cycle`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn infer(&self, owner: BodyOwner) -> Result<InferenceResult, InferError> {
        if self.in_progress.borrow().contains(&owner) {
            tracing::debug!(?owner, "reentrant inference request");
            return Err(InferError::Cycle(owner));
        }
        self.cancellation.check()?;
        let body = self.db.body(owner).ok_or(InferError::MissingBody(owner))?;

        let _guard = InProgress::enter(&self.in_progress, owner);
        let ctx = InferCtx::new(self, owner, &body);
        Ok(infer::infer_owner(ctx)?)
    }
}

/// Keeps `owner` on the in-progress stack for as long as it lives, so the
/// entry is removed on every exit path.
struct InProgress<'s> {
    stack: &'s RefCell<Vec<BodyOwner>>,
}

impl<'s> InProgress<'s> {
    fn enter(stack: &'s RefCell<Vec<BodyOwner>>, owner: BodyOwner) -> Self {
        stack.borrow_mut().push(owner);
        InProgress { stack }
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

/// Infers one body with a fresh session and default configuration.
pub fn infer_body(db: &dyn HirDatabase, owner: BodyOwner) -> Result<InferenceResult, InferError> {
    InferenceSession::new(db).infer(owner)
}
