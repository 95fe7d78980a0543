//! Process-wide admission control for upstream generation calls.
//!
//! [`AdmissionController`] is a non-blocking counting gate: a caller either
//! gets an [`AdmissionPermit`] immediately or is told how busy the gate is.
//! Nobody waits in line. The permit releases its slot when dropped, so the
//! count goes down exactly once per admitted call whether the call succeeds,
//! fails, or its connection is torn down.
//!
//! The counter lives in process memory. Several server instances each get
//! their own limit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Default number of simultaneous upstream calls.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Returned when the gate is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Server at capacity ({active}/{limit}). Please wait and try again.")]
pub struct CapacityExceeded {
    /// In-flight calls at the moment of rejection.
    pub active: usize,
    /// Configured limit.
    pub limit: usize,
}

/// Counting gate shared by every request handler.
///
/// Cheap to clone; all clones share one counter.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    active: AtomicUsize,
    limit: usize,
}

impl AdmissionController {
    /// A limit of zero is raised to one.
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                active: AtomicUsize::new(0),
                limit: limit.max(1),
            }),
        }
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    /// Calls currently holding a permit.
    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Take a slot if one is free.
    pub fn try_acquire(&self) -> Result<AdmissionPermit, CapacityExceeded> {
        let limit = self.inner.limit;
        self.inner
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < limit).then_some(current + 1)
            })
            .map(|_| AdmissionPermit {
                inner: Arc::clone(&self.inner),
            })
            .map_err(|active| CapacityExceeded { active, limit })
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

/// One admitted call. Dropping it frees the slot.
#[derive(Debug)]
#[must_use = "dropping the permit releases the slot immediately"]
pub struct AdmissionPermit {
    inner: Arc<Inner>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.inner.active.fetch_sub(1, Ordering::AcqRel);
    }
}
