use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace, warn};

use super::config::{FailurePolicy, StoreConfig};
use super::subscription::{SubscriberId, SubscriberRegistry, Subscription};
use crate::error::{Result, StoreError};
use crate::runtime::{Broadcast, PendingSlot, ReactiveRuntime};

/// A subscriber callback, shareable so one callable can be registered twice.
pub type Callback<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Entry<T> {
    id: SubscriberId,
    callback: Callback<T>,
}

struct StoreInner<T> {
    state: RefCell<Rc<T>>,
    subscribers: RefCell<Vec<Entry<T>>>,
    next_id: Cell<u64>,
    applying: Cell<bool>,
    pending: PendingSlot,
    runtime: Rc<ReactiveRuntime>,
    config: StoreConfig,
}

impl<T> StoreInner<T> {
    fn label(&self) -> &str {
        self.config.name().unwrap_or("store")
    }

    fn callback_for(&self, id: SubscriberId) -> Option<Callback<T>> {
        self.subscribers
            .borrow()
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| Rc::clone(&entry.callback))
    }

    /// Deliver the current state to every subscriber registered right now.
    fn broadcast(&self) -> Result<()> {
        // Cleared first so applies made by subscribers schedule a new broadcast.
        self.pending.take();

        let snapshot = Rc::clone(&self.state.borrow());
        let state: &T = &snapshot;
        let ids: Vec<SubscriberId> = self.subscribers.borrow().iter().map(|e| e.id).collect();

        let mut notified = 0usize;
        let mut first_failure = None;
        for (index, id) in ids.into_iter().enumerate() {
            // Entries removed by an earlier callback are skipped.
            let Some(callback) = self.callback_for(id) else {
                continue;
            };

            let outcome = catch_unwind(AssertUnwindSafe(|| match callback.try_borrow_mut() {
                Ok(mut f) => {
                    (&mut *f)(state);
                    true
                }
                Err(_) => false,
            }));

            match outcome {
                Ok(true) => notified += 1,
                Ok(false) => {
                    warn!(store = self.label(), index, "subscriber already running, skipped");
                }
                Err(payload) => {
                    let err = StoreError::from_panic(index, &*payload);
                    warn!(store = self.label(), %err, "subscriber panicked during broadcast");
                    first_failure.get_or_insert(err);
                    if self.config.failure_policy() == FailurePolicy::Halt {
                        break;
                    }
                }
            }
        }

        debug!(store = self.label(), notified, "broadcast complete");
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<T> SubscriberRegistry for StoreInner<T> {
    fn remove_subscriber(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        match subscribers.iter().position(|entry| entry.id == id) {
            Some(index) => {
                subscribers.remove(index);
                trace!(store = self.label(), ?id, remaining = subscribers.len(), "unsubscribed");
                true
            }
            None => false,
        }
    }
}

/// Clears the reentrancy flag even if the transformation panics.
struct Applying<'a>(&'a Cell<bool>);

impl<'a> Applying<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for Applying<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A single-threaded state container with batched change notification.
///
/// The state is replaced wholesale by [`apply`](Store::apply); the new value
/// is readable right away, while subscribers are told about it at the next
/// scheduling turn of the store's [`ReactiveRuntime`]. Several applies in one
/// turn produce one broadcast carrying the final state.
///
/// Cloning a `Store` creates a new handle to the same container.
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use tinstate::{ReactiveRuntime, Store};
///
/// let runtime = ReactiveRuntime::new();
/// let store = Store::with_runtime(0, runtime.clone());
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let seen_clone = seen.clone();
/// let _sub = store.subscribe(move |n: &i32| seen_clone.borrow_mut().push(*n));
///
/// store.apply(|n| n + 1);
/// store.apply(|n| n + 1);
/// assert_eq!(*store.get(), 2);
/// assert_eq!(*seen.borrow(), vec![0]);
///
/// runtime.flush().unwrap();
/// assert_eq!(*seen.borrow(), vec![0, 2]);
/// ```
pub struct Store<T> {
    inner: Rc<StoreInner<T>>,
}

impl<T: 'static> Store<T> {
    /// Create a new store bound to the current runtime.
    pub fn new(initial: T) -> Self {
        Self::with_runtime_and_config(initial, ReactiveRuntime::current(), StoreConfig::default())
    }

    /// Create a new store bound to a specific runtime.
    pub fn with_runtime(initial: T, runtime: Rc<ReactiveRuntime>) -> Self {
        Self::with_runtime_and_config(initial, runtime, StoreConfig::default())
    }

    /// Create a new store bound to the current runtime with custom settings.
    pub fn with_config(initial: T, config: StoreConfig) -> Self {
        Self::with_runtime_and_config(initial, ReactiveRuntime::current(), config)
    }

    pub fn with_runtime_and_config(
        initial: T,
        runtime: Rc<ReactiveRuntime>,
        config: StoreConfig,
    ) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                state: RefCell::new(Rc::new(initial)),
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                applying: Cell::new(false),
                pending: PendingSlot::new(),
                runtime,
                config,
            }),
        }
    }

    /// Get a read-only snapshot of the current state.
    pub fn get(&self) -> Rc<T> {
        Rc::clone(&self.inner.state.borrow())
    }

    /// Read state through a function.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let state = self.get();
        f(&*state)
    }

    /// Subscribe to state changes.
    ///
    /// The callback runs once immediately with the current state, then on
    /// every broadcast until the returned handle is released. If that first
    /// call panics, the entry is removed before the panic continues.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&T) + 'static,
    {
        let callback: Callback<T> = Rc::new(RefCell::new(callback));
        self.subscribe_fn(callback)
    }

    /// Subscribe a shared callback.
    ///
    /// Registering the same callback twice creates two entries, each needing
    /// its own release.
    pub fn subscribe_fn(&self, callback: Callback<T>) -> Subscription {
        let id = SubscriberId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);

        let count = {
            let mut subscribers = self.inner.subscribers.borrow_mut();
            subscribers.push(Entry {
                id,
                callback: Rc::clone(&callback),
            });
            subscribers.len()
        };
        trace!(store = self.inner.label(), ?id, count, "subscribed");

        let state = self.get();
        let delivered = catch_unwind(AssertUnwindSafe(|| (&mut *callback.borrow_mut())(&*state)));
        if let Err(payload) = delivered {
            // No handle will be returned, so the entry must not outlive the panic.
            self.inner.remove_subscriber(id);
            resume_unwind(payload);
        }

        let registry: Weak<dyn SubscriberRegistry> = Rc::downgrade(&self.inner) as Weak<StoreInner<T>>;
        Subscription::new(id, registry)
    }

    /// Replace the state with `transform(current)` and schedule a broadcast.
    ///
    /// Returns the pending broadcast, shared with any other apply made in the
    /// same scheduling turn.
    ///
    /// # Panics
    ///
    /// Panics if called while a transformation on this store is running.
    pub fn apply<F>(&self, transform: F) -> Broadcast
    where
        F: FnOnce(&T) -> T,
    {
        match self.try_apply(transform) {
            Ok(broadcast) => broadcast,
            Err(err) => {
                error!(store = self.inner.label(), "apply called from inside a transformation");
                panic!("{err}");
            }
        }
    }

    /// Like [`apply`](Store::apply), but reports reentrancy as
    /// [`StoreError::Reentrant`] instead of panicking.
    pub fn try_apply<F>(&self, transform: F) -> Result<Broadcast>
    where
        F: FnOnce(&T) -> T,
    {
        if self.inner.applying.get() {
            return Err(StoreError::Reentrant);
        }

        {
            let _applying = Applying::enter(&self.inner.applying);
            let current = self.get();
            let next = transform(&current);
            *self.inner.state.borrow_mut() = Rc::new(next);
        }

        Ok(self.request_broadcast())
    }

    /// Replace the state with a new value.
    pub fn set(&self, new_state: T) -> Broadcast {
        self.apply(move |_| new_state)
    }

    /// Replace the state with an edited copy of the current one.
    pub fn update<F>(&self, f: F) -> Broadcast
    where
        T: Clone,
        F: FnOnce(&mut T),
    {
        self.apply(move |state| {
            let mut next = state.clone();
            f(&mut next);
            next
        })
    }

    fn request_broadcast(&self) -> Broadcast {
        let weak = Rc::downgrade(&self.inner);
        let (broadcast, coalesced) = self.inner.pending.request(&self.inner.runtime, move || {
            match weak.upgrade() {
                Some(inner) => inner.broadcast(),
                None => Ok(()),
            }
        });
        debug!(store = self.inner.label(), coalesced, "broadcast requested");
        broadcast
    }
}

impl<T> Store<T> {
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// True between an apply and the broadcast it scheduled.
    pub fn has_pending_broadcast(&self) -> bool {
        self.inner.pending.is_pending()
    }

    /// True while a transformation passed to `apply` is running.
    pub fn is_applying(&self) -> bool {
        self.inner.applying.get()
    }

    pub fn runtime(&self) -> Rc<ReactiveRuntime> {
        Rc::clone(&self.inner.runtime)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.inner.state.borrow())
            .field("subscribers", &self.subscriber_count())
            .field("pending", &self.has_pending_broadcast())
            .finish()
    }
}

/// Create a new store bound to the current runtime.
pub fn create_store<T: 'static>(initial: T) -> Store<T> {
    Store::new(initial)
}
