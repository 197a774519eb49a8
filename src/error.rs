//! Error types for store operations.

use thiserror::Error;

/// Errors surfaced by stores, subscriptions, broadcasts and connectors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("cannot apply while already applying")]
    Reentrant,

    #[error("Subscriber #{index} panicked: {message}")]
    SubscriberPanicked { index: usize, message: String },

    #[error("cannot wait for a broadcast from inside a running task")]
    NestedWait,

    #[error("Runtime dropped before the broadcast completed")]
    RuntimeDropped,
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Build a `SubscriberPanicked` error from a `catch_unwind` payload.
    pub(crate) fn from_panic(index: usize, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        StoreError::SubscriberPanicked { index, message }
    }
}
