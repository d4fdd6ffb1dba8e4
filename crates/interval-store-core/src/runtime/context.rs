// crates/interval-store-core/src/runtime/context.rs
// ============================================================================
// Module: Call Context
// Description: Deadlines and cancellation for store-facing calls.
// Purpose: Bound every suspension point by time and by caller intent.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! Every store-facing operation takes a [`CallContext`]. The context carries
//! an optional absolute deadline and a [`CancelSignal`]; single store calls
//! additionally run under a per-call timeout. Cancellation is cooperative: the
//! runtime stops waiting on a call, but a call already on the wire may still
//! be applied by the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::future::pending;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio::time::timeout_at;

use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Cancellation
// ============================================================================

/// Sender half of a cancellation pair.
#[derive(Debug)]
pub struct CancelHandle {
    /// Shared cancellation flag.
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signals cancellation to every clone of the paired [`CancelSignal`].
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

/// Receiver half of a cancellation pair.
///
/// # Invariants
/// - Dropping the paired [`CancelHandle`] without cancelling never cancels.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    /// Flag receiver; `None` never cancels.
    receiver: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// Returns a signal that never fires.
    #[must_use]
    pub const fn never() -> Self {
        Self {
            receiver: None,
        }
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.receiver.as_ref().is_some_and(|receiver| *receiver.borrow())
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        let Some(receiver) = &self.receiver else {
            return pending().await;
        };
        let mut receiver = receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            pending::<()>().await;
        }
    }
}

/// Creates a linked cancellation handle and signal.
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (sender, receiver) = watch::channel(false);
    (
        CancelHandle {
            sender,
        },
        CancelSignal {
            receiver: Some(receiver),
        },
    )
}

// ============================================================================
// SECTION: Call Context
// ============================================================================

/// Deadline and cancellation scope for one caller operation.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Absolute deadline; `None` never expires.
    pub deadline: Option<Instant>,
    /// Cancellation signal.
    pub cancel: CancelSignal,
}

impl CallContext {
    /// Returns a context with no deadline that is never cancelled.
    #[must_use]
    pub const fn background() -> Self {
        Self {
            deadline: None,
            cancel: CancelSignal::never(),
        }
    }

    /// Returns a context expiring `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
            cancel: CancelSignal::never(),
        }
    }

    /// Attaches a cancellation signal.
    #[must_use]
    pub fn cancelled_by(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the earlier of the context deadline and `now + call_timeout`.
    #[must_use]
    pub fn call_deadline(&self, call_timeout: Option<Duration>) -> Option<Instant> {
        let call = call_timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        earliest(self.deadline, call)
    }
}

/// Returns the earlier of two optional deadlines.
#[must_use]
pub fn earliest(left: Option<Instant>, right: Option<Instant>) -> Option<Instant> {
    match (left, right) {
        (Some(left), Some(right)) => Some(left.min(right)),
        (left, None) => left,
        (None, right) => right,
    }
}

// ============================================================================
// SECTION: Guarded Calls
// ============================================================================

/// Failure of a guarded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallFailure {
    /// The store call failed or timed out.
    Store(StoreError),
    /// The caller cancelled before the call completed.
    Cancelled,
}

/// Runs one store call under the context deadline, a per-call timeout, and
/// the cancellation signal.
///
/// # Errors
///
/// Returns [`CallFailure::Cancelled`] when cancellation fires first,
/// [`StoreError::Timeout`] when a deadline elapses, and the store's own error
/// otherwise.
pub async fn guarded<T, F>(
    ctx: &CallContext,
    call_timeout: Option<Duration>,
    call: F,
) -> Result<T, CallFailure>
where
    F: Future<Output = Result<T, StoreError>>,
{
    if ctx.cancel.is_cancelled() {
        return Err(CallFailure::Cancelled);
    }
    let deadline = ctx.call_deadline(call_timeout);
    tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => Err(CallFailure::Cancelled),
        result = bounded(deadline, call) => result.map_err(CallFailure::Store),
    }
}

/// Awaits a call, failing with a timeout once `deadline` passes.
async fn bounded<T, F>(deadline: Option<Instant>, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    let Some(deadline) = deadline else {
        return call.await;
    };
    timeout_at(deadline, call)
        .await
        .unwrap_or_else(|_| Err(StoreError::Timeout("call deadline elapsed".to_string())))
}
