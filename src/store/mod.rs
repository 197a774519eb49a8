//! State container with deferred, coalesced change notification.
//!
//! A [`Store`] holds one state value that is replaced wholesale by
//! [`Store::apply`]. Replacement is visible to [`Store::get`] immediately;
//! subscribers are notified later, once per scheduling turn, with only the
//! latest state.

mod config;
mod store;
mod subscription;

pub use config::{FailurePolicy, StoreConfig};
pub use store::{create_store, Callback, Store};
pub use subscription::{SubscriberId, Subscription, SubscriptionGuard};
