//! Memoized derived values.
//!
//! A [`Selector`] extracts a fixed list of arguments from a state value and
//! only re-runs its compute function when one of them changed since the
//! previous call.

mod identity;
mod selector;

pub use identity::Identity;
pub use selector::{create_selector, Extractors, Selector};
