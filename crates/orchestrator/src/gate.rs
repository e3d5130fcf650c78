//! Subscription gate consulted before any mutating action is offered or run.
//!
//! The subscription status is computed upstream and injected once, at the
//! orchestration boundary, as a [`SubscriptionSource`]. The gate reads it
//! afresh on every check; nothing is cached, because the status can change
//! between two renders.

use std::sync::Arc;

use lgdesk_interchange::SubscriptionStatus;
use tokio::sync::watch;

use crate::catalog::ActionKind;
use crate::error::ActionError;

/// True iff mutations are permitted under `status`.
///
/// Only the grace period blocks here. An expired subscription is turned
/// away by the application shell before any view is rendered.
pub fn can_mutate(status: SubscriptionStatus) -> bool {
    status != SubscriptionStatus::Grace
}

/// Supplies the current subscription status.
pub trait SubscriptionSource: Send + Sync {
    fn current(&self) -> SubscriptionStatus;
}

/// A fixed status, for one-shot invocations such as a CLI run.
impl SubscriptionSource for SubscriptionStatus {
    fn current(&self) -> SubscriptionStatus {
        *self
    }
}

/// Shared, updatable subscription status.
///
/// Writers call [`SubscriptionCell::set`]; every gate holding the cell sees
/// the new value on its next check.
pub struct SubscriptionCell {
    tx: watch::Sender<SubscriptionStatus>,
}

impl SubscriptionCell {
    pub fn new(initial: SubscriptionStatus) -> Self {
        let (tx, _rx) = watch::channel(initial);
        SubscriptionCell { tx }
    }

    pub fn set(&self, status: SubscriptionStatus) {
        let previous = self.tx.send_replace(status);
        if previous != status {
            tracing::info!(%previous, current = %status, "subscription status changed");
        }
    }
}

impl Default for SubscriptionCell {
    fn default() -> Self {
        Self::new(SubscriptionStatus::Active)
    }
}

impl SubscriptionSource for SubscriptionCell {
    fn current(&self) -> SubscriptionStatus {
        *self.tx.borrow()
    }
}

/// The gate itself.
#[derive(Clone)]
pub struct Gate {
    source: Arc<dyn SubscriptionSource>,
}

impl Gate {
    pub fn new(source: Arc<dyn SubscriptionSource>) -> Self {
        Gate { source }
    }

    /// Whether mutating actions should be offered at all right now.
    pub fn allows_mutation(&self) -> bool {
        can_mutate(self.source.current())
    }

    /// Refuse `action` if the subscription does not permit mutations.
    pub fn check(&self, action: ActionKind) -> Result<(), ActionError> {
        let subscription = self.source.current();
        if can_mutate(subscription) {
            return Ok(());
        }
        tracing::warn!(%action, %subscription, kind = "gate_refusal", "action refused by subscription gate");
        Err(ActionError::GateRefusal {
            action,
            subscription,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_grace_blocks_mutation() {
        assert!(can_mutate(SubscriptionStatus::Active));
        assert!(!can_mutate(SubscriptionStatus::Grace));
        assert!(can_mutate(SubscriptionStatus::Expired));
    }

    #[test]
    fn gate_reads_the_cell_on_every_check() {
        let cell = Arc::new(SubscriptionCell::new(SubscriptionStatus::Active));
        let gate = Gate::new(cell.clone());
        assert!(gate.check(ActionKind::Extend).is_ok());

        cell.set(SubscriptionStatus::Grace);
        assert_eq!(
            gate.check(ActionKind::Extend),
            Err(ActionError::GateRefusal {
                action: ActionKind::Extend,
                subscription: SubscriptionStatus::Grace,
            })
        );
        assert!(!gate.allows_mutation());

        cell.set(SubscriptionStatus::Active);
        assert!(gate.check(ActionKind::Extend).is_ok());
    }

    #[test]
    fn fixed_status_is_a_source() {
        let gate = Gate::new(Arc::new(SubscriptionStatus::Grace));
        for action in ActionKind::ALL {
            assert!(gate.check(action).is_err());
        }
    }
}
