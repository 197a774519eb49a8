//! # Tinstate
//!
//! A minimal reactive state container for UI components.
//!
//! Tinstate provides three pieces that fit together:
//!
//! ## Store
//!
//! - `Store<T>` - Single state cell, replaced wholesale by `apply`
//! - Subscribers see the current state immediately on `subscribe`
//! - Applies in one scheduling turn coalesce into a single broadcast
//!
//! ## Selectors
//!
//! - `Selector` - Memoized derivation over extracted arguments
//! - Recomputes only when an extracted argument changes
//!
//! ## Connector
//!
//! - `Connected<H, T>` - Binds a host component's connect/disconnect
//!   lifecycle to a store subscription
//!
//! Broadcasts run on a cooperative `ReactiveRuntime`; the host event loop
//! calls `flush` once per turn.

pub mod connect;
pub mod error;
pub mod runtime;
pub mod selector;
pub mod store;

// Re-export main types for convenience
pub use connect::{connect, Connectable, Connected};
pub use error::{Result, StoreError};
pub use runtime::{Broadcast, ReactiveRuntime};
pub use selector::{create_selector, Extractors, Identity, Selector};
pub use store::{
    create_store, Callback, FailurePolicy, Store, StoreConfig, SubscriberId, Subscription,
    SubscriptionGuard,
};
