//! Cooperative scheduling for deferred store notifications.
//!
//! This module provides the task queue that broadcasts run on, the
//! [`Broadcast`] handle returned by [`Store::apply`](crate::Store::apply),
//! and the per-store pending slot that coalesces same-turn requests.

mod broadcast;
mod scheduler;

pub use broadcast::Broadcast;
pub(crate) use broadcast::PendingSlot;
pub use scheduler::ReactiveRuntime;
