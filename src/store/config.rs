/// What a broadcast does when a subscriber panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Keep notifying the remaining subscribers, then report the first panic.
    #[default]
    ContinueThenReport,
    /// Stop the broadcast at the first panic and report it.
    Halt,
}

/// Per-store settings.
///
/// ```
/// use tinstate::{FailurePolicy, Store, StoreConfig};
///
/// let config = StoreConfig::default()
///     .with_name("session")
///     .with_failure_policy(FailurePolicy::Halt);
/// let store = Store::with_config(0u32, config);
/// assert_eq!(store.config().name(), Some("session"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreConfig {
    failure_policy: FailurePolicy,
    name: Option<String>,
}

impl StoreConfig {
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Label attached to this store's log events.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}
