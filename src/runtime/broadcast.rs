use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use super::ReactiveRuntime;
use crate::error::{Result, StoreError};

enum BroadcastState {
    Pending(Vec<Waker>),
    Complete(Result<()>),
}

struct BroadcastInner {
    state: RefCell<BroadcastState>,
    runtime: Weak<ReactiveRuntime>,
}

/// Handle to one deferred broadcast of a store's state.
///
/// Every [`Store::apply`](crate::Store::apply) made before the broadcast runs
/// returns a handle to the same pending unit; handles compare equal when they
/// refer to the same unit.
///
/// The handle resolves once every subscriber has been invoked. Await it as a
/// [`Future`], poll [`is_complete`](Broadcast::is_complete), or drive the
/// runtime with [`wait`](Broadcast::wait).
///
/// # Examples
///
/// ```
/// use tinstate::{ReactiveRuntime, Store};
///
/// ReactiveRuntime::scope(|| {
///     let store = Store::new(0);
///     let first = store.apply(|n| n + 1);
///     let second = store.apply(|n| n + 1);
///     assert_eq!(first, second);
///
///     second.wait().unwrap();
///     assert!(first.is_complete());
/// });
/// ```
#[derive(Clone)]
pub struct Broadcast {
    inner: Rc<BroadcastInner>,
}

impl Broadcast {
    pub(crate) fn new(runtime: &Rc<ReactiveRuntime>) -> Self {
        Self {
            inner: Rc::new(BroadcastInner {
                state: RefCell::new(BroadcastState::Pending(Vec::new())),
                runtime: Rc::downgrade(runtime),
            }),
        }
    }

    /// True once every subscriber has been invoked.
    pub fn is_complete(&self) -> bool {
        matches!(*self.inner.state.borrow(), BroadcastState::Complete(_))
    }

    /// The broadcast's result, or `None` while it is still pending.
    pub fn outcome(&self) -> Option<Result<()>> {
        match &*self.inner.state.borrow() {
            BroadcastState::Complete(outcome) => Some(outcome.clone()),
            BroadcastState::Pending(_) => None,
        }
    }

    /// Block on the runtime until this broadcast has completed.
    ///
    /// Flushes the bound runtime if the broadcast is still pending. Fails with
    /// [`StoreError::NestedWait`] when called from inside a running task, since
    /// the broadcast cannot run until that task returns.
    ///
    /// Only this broadcast's outcome is returned. Failures of other tasks run
    /// by the same flush are not reported here; code that queues its own tasks
    /// with [`ReactiveRuntime::schedule`] should call
    /// [`ReactiveRuntime::flush`] itself to observe them.
    pub fn wait(&self) -> Result<()> {
        if let Some(outcome) = self.outcome() {
            return outcome;
        }
        let runtime = self.inner.runtime.upgrade().ok_or(StoreError::RuntimeDropped)?;
        if runtime.is_flushing() {
            return Err(StoreError::NestedWait);
        }
        // Only this broadcast's outcome is reported; see the doc comment.
        if let Err(err) = runtime.flush() {
            tracing::debug!(%err, "failure from another task ignored by wait");
        }
        self.outcome().unwrap_or(Err(StoreError::RuntimeDropped))
    }

    pub(crate) fn complete(&self, outcome: Result<()>) {
        let previous = self
            .inner
            .state
            .replace(BroadcastState::Complete(outcome));
        if let BroadcastState::Pending(wakers) = previous {
            for waker in wakers {
                waker.wake();
            }
        }
    }
}

impl PartialEq for Broadcast {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Broadcast {}

impl fmt::Debug for Broadcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcast")
            .field("complete", &self.is_complete())
            .finish()
    }
}

impl Future for Broadcast {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut *self.inner.state.borrow_mut() {
            BroadcastState::Complete(outcome) => Poll::Ready(outcome.clone()),
            BroadcastState::Pending(wakers) => {
                if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

/// At most one pending broadcast per store.
pub(crate) struct PendingSlot {
    current: RefCell<Option<Broadcast>>,
}

impl PendingSlot {
    pub(crate) fn new() -> Self {
        Self {
            current: RefCell::new(None),
        }
    }

    /// Return the pending broadcast, or schedule `run` as a new one.
    ///
    /// The flag in the returned tuple is true when an existing broadcast was
    /// reused.
    pub(crate) fn request<F>(&self, runtime: &Rc<ReactiveRuntime>, run: F) -> (Broadcast, bool)
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        if let Some(existing) = self.current.borrow().as_ref() {
            return (existing.clone(), true);
        }

        let broadcast = Broadcast::new(runtime);
        *self.current.borrow_mut() = Some(broadcast.clone());

        let done = broadcast.clone();
        runtime.schedule(move || {
            let outcome = run();
            done.complete(outcome.clone());
            outcome
        });
        (broadcast, false)
    }

    /// Clear the slot so that later requests schedule a fresh broadcast.
    pub(crate) fn take(&self) -> Option<Broadcast> {
        self.current.borrow_mut().take()
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.current.borrow().is_some()
    }
}
