//! Pending/idle lifecycle tracking for a validator.
//!
//! Every `validate_async` call begins a new operation with a fresh id and
//! cancellation token. Only the most recent operation drives the
//! [`PendingState`]. An older operation that settles late is stale and
//! changes nothing.

use armature_validation::ValidationResult;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Lifecycle phase of a validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Pending,
    /// The result is recorded but the validator has not yet gone idle.
    /// Still counts as pending.
    Settling,
}

/// Snapshot of a validator's mutable lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingState {
    pub phase: Phase,
    pub current_operation_id: u64,
    pub cancel_requested: bool,
}

impl PendingState {
    pub fn is_pending(&self) -> bool {
        self.phase != Phase::Idle
    }
}

struct Inner<T> {
    state: PendingState,
    token: Option<CancellationToken>,
    last_result: Option<ValidationResult<T>>,
}

/// Lifecycle controller shared by one validator and its in-flight operations.
pub struct Lifecycle<T> {
    name: Option<String>,
    inner: Mutex<Inner<T>>,
    /// Id of the operation whose settlement last returned us to `Idle`.
    idle_through: watch::Sender<u64>,
}

impl<T> fmt::Debug for Lifecycle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("name", &self.name)
            .field("state", &self.inner.lock().state)
            .finish()
    }
}

impl<T: Clone> Lifecycle<T> {
    pub fn new(name: Option<String>) -> Self {
        let (idle_through, _) = watch::channel(0);
        Self {
            name,
            inner: Mutex::new(Inner {
                state: PendingState {
                    phase: Phase::Idle,
                    current_operation_id: 0,
                    cancel_requested: false,
                },
                token: None,
                last_result: None,
            }),
            idle_through,
        }
    }

    /// `Idle -> Pending` with a fresh operation id and token.
    ///
    /// A cancellation requested for an earlier operation does not carry over.
    pub fn begin(self: &Arc<Self>) -> OperationGuard<T> {
        let token = CancellationToken::new();
        let id = {
            let mut inner = self.inner.lock();
            inner.state.current_operation_id += 1;
            inner.state.phase = Phase::Pending;
            inner.state.cancel_requested = false;
            inner.token = Some(token.clone());
            inner.state.current_operation_id
        };
        debug!(validator = ?self.name, operation_id = id, "Validation started");

        OperationGuard {
            lifecycle: self.clone(),
            id,
            token,
            settled: false,
        }
    }

    /// Request cancellation of the current operation. No-op when idle.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock();
        if inner.state.phase == Phase::Idle {
            return;
        }
        inner.state.cancel_requested = true;
        if let Some(token) = &inner.token {
            token.cancel();
        }
        info!(
            validator = ?self.name,
            operation_id = inner.state.current_operation_id,
            "Validation cancelled"
        );
    }

    pub fn is_pending(&self) -> bool {
        self.inner.lock().state.is_pending()
    }

    pub fn state(&self) -> PendingState {
        self.inner.lock().state.clone()
    }

    /// Result of the most recent operation that settled while current.
    pub fn last_result(&self) -> Option<ValidationResult<T>> {
        self.inner.lock().last_result.clone()
    }

    /// Resolves once the operation current at call time has settled (or was
    /// superseded by one that settled). Resolves immediately when idle.
    pub async fn wait_for_completion(&self) {
        let target = {
            let inner = self.inner.lock();
            if inner.state.phase == Phase::Idle {
                return;
            }
            inner.state.current_operation_id
        };

        let mut idle_through = self.idle_through.subscribe();
        // The sender lives as long as `self`; an error cannot occur while we borrow it.
        let _ = idle_through.wait_for(|id| *id >= target).await;
    }

    /// `Pending -> Settling -> Idle`, if `id` is still current.
    fn settle(&self, id: u64, result: Option<&ValidationResult<T>>) {
        let mut inner = self.inner.lock();
        if inner.state.current_operation_id != id {
            debug!(
                validator = ?self.name,
                operation_id = id,
                current = inner.state.current_operation_id,
                "Stale validation settled"
            );
            return;
        }

        inner.state.phase = Phase::Settling;
        if let Some(result) = result {
            inner.last_result = Some(result.clone());
        }
        inner.token = None;
        drop(inner);

        debug!(
            validator = ?self.name,
            operation_id = id,
            success = ?result.map(ValidationResult::is_success),
            "Validation settled"
        );

        // A newer operation may have begun meanwhile; it owns the phase now.
        {
            let mut inner = self.inner.lock();
            if inner.state.current_operation_id == id && inner.state.phase == Phase::Settling {
                inner.state.phase = Phase::Idle;
            }
        }
        self.idle_through.send_replace(id);
    }
}

/// RAII guard for one operation.
///
/// Settles the operation on drop if the caller abandoned it, so the
/// validator never stays pending.
pub struct OperationGuard<T: Clone> {
    lifecycle: Arc<Lifecycle<T>>,
    id: u64,
    token: CancellationToken,
    settled: bool,
}

impl<T: Clone> OperationGuard<T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Record the result and leave `Pending`.
    pub fn settle(mut self, result: &ValidationResult<T>) {
        self.settled = true;
        self.lifecycle.settle(self.id, Some(result));
    }
}

impl<T: Clone> Drop for OperationGuard<T> {
    fn drop(&mut self) {
        if !self.settled {
            self.lifecycle.settle(self.id, None);
        }
    }
}
