//! Binding host components to a store's subscription lifecycle.

mod connector;

pub use connector::{connect, Connectable, Connected};
