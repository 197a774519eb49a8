use std::fmt;
use std::rc::Weak;

use crate::error::{Result, StoreError};

/// Identifies one subscriber entry within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(crate) u64);

/// Something subscriber entries can be removed from.
pub(crate) trait SubscriberRegistry {
    /// Remove the entry, returning false if it was not registered.
    fn remove_subscriber(&self, id: SubscriberId) -> bool;
}

/// One-shot capability to remove a single subscriber entry.
///
/// Releasing the same handle twice is a defect and fails with
/// [`StoreError::InvalidOperation`], as does releasing it after its store has
/// been dropped. Dropping the handle does not
/// unsubscribe; use [`guard`](Subscription::guard) for that.
#[must_use = "dropping a Subscription leaves the subscriber registered"]
pub struct Subscription {
    id: SubscriberId,
    registry: Weak<dyn SubscriberRegistry>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, registry: Weak<dyn SubscriberRegistry>) -> Self {
        Self { id, registry }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove this subscriber from its store.
    pub fn unsubscribe(&self) -> Result<()> {
        let registry = self.registry.upgrade().ok_or_else(|| {
            StoreError::InvalidOperation("store has been dropped".to_string())
        })?;
        if registry.remove_subscriber(self.id) {
            Ok(())
        } else {
            Err(StoreError::InvalidOperation(
                "cannot unsubscribe multiple times".to_string(),
            ))
        }
    }

    /// Convert into a guard that unsubscribes when dropped.
    pub fn guard(self) -> SubscriptionGuard {
        SubscriptionGuard(Some(self))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// RAII guard for a subscription.
#[derive(Debug)]
pub struct SubscriptionGuard(Option<Subscription>);

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(subscription) = self.0.take() {
            // Already removed or store gone; nothing left to release.
            let _ = subscription.unsubscribe();
        }
    }
}
