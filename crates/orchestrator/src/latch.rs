//! Submission latch: one in-flight submission per control.
//!
//! A control is an action on a target. While a submission holds its key, a
//! second attempt on the same control is turned away without touching the
//! network. Different records, or different actions on one record, do not
//! contend.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::catalog::ActionKind;
use crate::error::ActionError;
use crate::payload::ActionTarget;

type Key = (ActionTarget, ActionKind);

/// Shared set of held submission keys.
#[derive(Clone, Default)]
pub struct SubmissionLatch {
    held: Arc<Mutex<HashSet<Key>>>,
}

impl SubmissionLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the key for `action` on `target`, or refuse if it is held.
    pub fn acquire(
        &self,
        target: ActionTarget,
        action: ActionKind,
    ) -> Result<SubmissionGuard, ActionError> {
        let key = (target, action);
        if !self.lock().insert(key) {
            tracing::debug!(%action, %target, "submission already in flight");
            return Err(ActionError::AlreadySubmitting {
                action,
                target: target.to_string(),
            });
        }
        Ok(SubmissionGuard {
            latch: self.clone(),
            key,
        })
    }

    pub fn is_held(&self, target: ActionTarget, action: ActionKind) -> bool {
        self.lock().contains(&(target, action))
    }

    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Key>> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases its key when dropped, whatever the submission's outcome.
pub struct SubmissionGuard {
    latch: SubmissionLatch,
    key: Key,
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        self.latch.lock().remove(&self.key);
    }
}
