use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{trace, warn};

use crate::error::{Result, StoreError};
use crate::store::{Store, SubscriberId, Subscription};

/// A host component that can be bound to a store.
///
/// `on_connect` and `on_disconnect` are the host's own lifecycle hooks and
/// default to doing nothing. `state_changed` receives every state delivered
/// to the host's subscription.
pub trait Connectable<T> {
    fn on_connect(&mut self) {}

    fn on_disconnect(&mut self) {}

    fn state_changed(&mut self, state: &T);
}

/// A host wrapped with store-bound connect/disconnect behaviour.
///
/// Connecting runs the host's `on_connect`, then subscribes it to the store,
/// which delivers the current state before `connect` returns. Disconnecting
/// releases the subscription, then runs the host's `on_disconnect`. Every
/// connect acquires a fresh subscription.
///
/// The store's subscriber only holds a weak reference to the host, so a store
/// never keeps its hosts alive. A state delivered while the host is already
/// mutably borrowed (for example, a host method that flushes the runtime) is
/// skipped with a warning; the host catches up on the next broadcast or can
/// read [`Store::get`] directly. If the host's first `state_changed` panics,
/// `connect` unwinds without leaving a subscription behind. Dropping a connected wrapper releases its subscription
/// without running `on_disconnect`.
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use tinstate::{connect, Connectable, ReactiveRuntime, Store};
///
/// struct Label { text: String }
///
/// impl Connectable<u32> for Label {
///     fn state_changed(&mut self, count: &u32) {
///         self.text = format!("count: {count}");
///     }
/// }
///
/// let runtime = ReactiveRuntime::new();
/// let store = Store::with_runtime(0u32, runtime.clone());
/// let label = Rc::new(RefCell::new(Label { text: String::new() }));
///
/// let mut connected = connect(&store, label.clone());
/// connected.connect().unwrap();
/// assert_eq!(label.borrow().text, "count: 0");
///
/// store.apply(|n| n + 1);
/// runtime.flush().unwrap();
/// assert_eq!(label.borrow().text, "count: 1");
///
/// connected.disconnect().unwrap();
/// assert!(connected.disconnect().is_err());
/// ```
pub struct Connected<H, T> {
    host: Rc<RefCell<H>>,
    store: Store<T>,
    subscription: Option<Subscription>,
}

impl<H, T> Connected<H, T>
where
    H: Connectable<T> + 'static,
    T: 'static,
{
    pub fn new(store: &Store<T>, host: Rc<RefCell<H>>) -> Self {
        Self {
            host,
            store: store.clone(),
            subscription: None,
        }
    }

    /// Run the host's connect hook, then subscribe it to the store.
    pub fn connect(&mut self) -> Result<()> {
        if self.subscription.is_some() {
            return Err(StoreError::InvalidOperation(
                "host is already connected".to_string(),
            ));
        }

        self.host.borrow_mut().on_connect();

        let host = Rc::downgrade(&self.host);
        let subscription = self.store.subscribe(move |state: &T| {
            let Some(host) = host.upgrade() else { return };
            match host.try_borrow_mut() {
                Ok(mut host) => host.state_changed(state),
                Err(_) => warn!("host busy, state delivery skipped"),
            };
        });
        trace!(id = ?subscription.id(), "host connected");
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Release the host's subscription, then run its disconnect hook.
    pub fn disconnect(&mut self) -> Result<()> {
        let subscription = self.subscription.take().ok_or_else(|| {
            StoreError::InvalidOperation("host is not connected".to_string())
        })?;
        subscription.unsubscribe()?;
        trace!(id = ?subscription.id(), "host disconnected");

        self.host.borrow_mut().on_disconnect();
        Ok(())
    }
}

impl<H, T> Connected<H, T> {
    pub fn is_connected(&self) -> bool {
        self.subscription.is_some()
    }

    /// Id of the current subscription, if connected.
    pub fn subscription_id(&self) -> Option<SubscriberId> {
        self.subscription.as_ref().map(Subscription::id)
    }

    pub fn host(&self) -> &Rc<RefCell<H>> {
        &self.host
    }

    pub fn store(&self) -> &Store<T> {
        &self.store
    }
}

impl<H, T> Drop for Connected<H, T> {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            let _ = subscription.unsubscribe();
        }
    }
}

impl<H, T> fmt::Debug for Connected<H, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connected")
            .field("subscription", &self.subscription_id())
            .finish()
    }
}

/// Wrap `host` so that its lifecycle is bound to `store`.
pub fn connect<H, T>(store: &Store<T>, host: Rc<RefCell<H>>) -> Connected<H, T>
where
    H: Connectable<T> + 'static,
    T: 'static,
{
    Connected::new(store, host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ReactiveRuntime;

    #[derive(Default)]
    struct Host {
        events: Vec<String>,
        last: Option<i32>,
    }

    impl Connectable<i32> for Host {
        fn on_connect(&mut self) {
            self.events.push("connect".to_string());
        }

        fn on_disconnect(&mut self) {
            self.events.push("disconnect".to_string());
        }

        fn state_changed(&mut self, state: &i32) {
            self.events.push(format!("state {state}"));
            self.last = Some(*state);
        }
    }

    /// Only implements the required hook.
    struct Bare(Vec<i32>);

    impl Connectable<i32> for Bare {
        fn state_changed(&mut self, state: &i32) {
            self.0.push(*state);
        }
    }

    fn setup() -> (Rc<ReactiveRuntime>, Store<i32>, Rc<RefCell<Host>>) {
        let runtime = ReactiveRuntime::new();
        let store = Store::with_runtime(10, runtime.clone());
        (runtime, store, Rc::new(RefCell::new(Host::default())))
    }

    #[test]
    fn connect_runs_base_hook_then_delivers_state() {
        let (_runtime, store, host) = setup();
        let mut connected = connect(&store, host.clone());

        connected.connect().unwrap();

        assert_eq!(host.borrow().events, vec!["connect", "state 10"]);
        assert_eq!(host.borrow().last, Some(10));
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn disconnect_releases_then_runs_base_hook() {
        let (runtime, store, host) = setup();
        let mut connected = connect(&store, host.clone());
        connected.connect().unwrap();

        connected.disconnect().unwrap();
        store.apply(|n| n + 1);
        runtime.flush().unwrap();

        assert_eq!(
            host.borrow().events,
            vec!["connect", "state 10", "disconnect"]
        );
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn second_disconnect_fails() {
        let (_runtime, store, host) = setup();
        let mut connected = connect(&store, host);
        connected.connect().unwrap();

        assert!(connected.disconnect().is_ok());
        assert!(matches!(
            connected.disconnect(),
            Err(StoreError::InvalidOperation(_))
        ));
    }

    #[test]
    fn double_connect_fails() {
        let (_runtime, store, host) = setup();
        let mut connected = connect(&store, host);
        connected.connect().unwrap();

        assert!(connected.connect().is_err());
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn reconnect_acquires_fresh_subscription() {
        let (_runtime, store, host) = setup();
        let mut connected = connect(&store, host);

        connected.connect().unwrap();
        let first = connected.subscription_id();
        connected.disconnect().unwrap();
        connected.connect().unwrap();

        assert!(connected.is_connected());
        assert_ne!(connected.subscription_id(), first);
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn default_hooks_are_noops() {
        let runtime = ReactiveRuntime::new();
        let store = Store::with_runtime(1, runtime.clone());
        let bare = Rc::new(RefCell::new(Bare(Vec::new())));
        let mut connected = connect(&store, bare.clone());

        connected.connect().unwrap();
        store.apply(|n| n * 5);
        runtime.flush().unwrap();
        connected.disconnect().unwrap();

        assert_eq!(bare.borrow().0, vec![1, 5]);
    }

    /// Fails on its first state delivery.
    struct Fragile;

    impl Connectable<i32> for Fragile {
        fn state_changed(&mut self, state: &i32) {
            assert!(*state != 10, "cannot render {state}");
        }
    }

    #[test]
    fn panicking_first_delivery_does_not_leak() {
        let (_runtime, store, _host) = setup();
        let mut connected = connect(&store, Rc::new(RefCell::new(Fragile)));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            connected.connect()
        }));

        assert!(result.is_err());
        assert!(!connected.is_connected());
        assert_eq!(store.subscriber_count(), 0);

        store.apply(|n| n + 1);
        connected.connect().unwrap();
        connected.disconnect().unwrap();
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn busy_host_skips_delivery() {
        let (runtime, store, host) = setup();
        let mut connected = connect(&store, host.clone());
        connected.connect().unwrap();

        store.apply(|n| n + 1);
        {
            let _busy = host.borrow_mut();
            assert_eq!(runtime.flush(), Ok(1));
        }
        assert_eq!(host.borrow().last, Some(10));

        store.apply(|n| n + 1);
        runtime.flush().unwrap();
        assert_eq!(host.borrow().last, Some(12));
    }

    #[test]
    fn drop_releases_subscription() {
        let (_runtime, store, host) = setup();
        {
            let mut connected = connect(&store, host.clone());
            connected.connect().unwrap();
            assert_eq!(store.subscriber_count(), 1);
        }
        assert_eq!(store.subscriber_count(), 0);
        assert!(!host.borrow().events.contains(&"disconnect".to_string()));
    }
}
