use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{Result, StoreError};

type Task = Box<dyn FnOnce() -> Result<()>>;

/// Single-threaded cooperative task queue.
///
/// Work handed to [`schedule`](ReactiveRuntime::schedule) never runs inline.
/// It runs at the next scheduling turn, which is whenever the host event loop
/// calls [`flush`](ReactiveRuntime::flush).
///
/// Supports both a per-thread default runtime and scoped runtimes for
/// isolation.
///
/// # Examples
///
/// Using the default runtime:
///
/// ```
/// use tinstate::{ReactiveRuntime, Store};
///
/// let store = Store::new(1);
/// store.apply(|n| n + 1);
/// ReactiveRuntime::current().flush().unwrap();
/// assert_eq!(*store.get(), 2);
/// ```
///
/// Using scoped runtimes for isolation:
///
/// ```
/// use tinstate::{ReactiveRuntime, Store};
///
/// ReactiveRuntime::scope(|| {
///     let store = Store::new(0);
///     store.apply(|n| n + 1);
///     assert_eq!(ReactiveRuntime::current().pending_tasks(), 1);
/// });
/// // Runtime and all its queued work is dropped here
/// ```
pub struct ReactiveRuntime {
    queue: RefCell<VecDeque<Task>>,
    flushing: Cell<bool>,
}

// Thread-local stack for scoped runtimes
thread_local! {
    static RUNTIME_STACK: RefCell<Vec<Rc<ReactiveRuntime>>> = const { RefCell::new(Vec::new()) };
    static DEFAULT_RUNTIME: Rc<ReactiveRuntime> = ReactiveRuntime::new();
}

impl ReactiveRuntime {
    /// Create a new isolated runtime with an empty queue.
    pub fn new() -> Rc<Self> {
        Rc::new(ReactiveRuntime {
            queue: RefCell::new(VecDeque::new()),
            flushing: Cell::new(false),
        })
    }

    /// Run a function with a fresh isolated runtime.
    ///
    /// Stores created inside `f` bind to the new runtime. Anything still
    /// queued when `f` returns is dropped with the runtime.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let runtime = Self::new();
        Self::with_runtime(runtime, f)
    }

    /// The runtime used on this thread when no scoped runtime is active.
    pub fn global() -> Rc<Self> {
        DEFAULT_RUNTIME.with(Rc::clone)
    }

    /// Get the current runtime (scoped or thread default).
    pub fn current() -> Rc<Self> {
        RUNTIME_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .cloned()
                .unwrap_or_else(Self::global)
        })
    }

    /// Run a function with a specific runtime as the current context.
    ///
    /// This pushes the runtime onto the thread-local stack for the duration
    /// of the function execution.
    pub fn with_runtime<F, R>(runtime: Rc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().push(runtime);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Queue a task for the next scheduling turn.
    pub fn schedule<F>(&self, task: F)
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        self.queue.borrow_mut().push_back(Box::new(task));
    }

    /// Run queued tasks in FIFO order until the queue is empty.
    ///
    /// Tasks queued while flushing run in the same flush, after the ones
    /// already queued. Returns the number of tasks that ran, or the first
    /// failure reported by any of them once the queue has been drained.
    ///
    /// Calling `flush` from inside a running task is a no-op returning
    /// `Ok(0)`; the outer flush picks up whatever the task queued.
    pub fn flush(&self) -> Result<usize> {
        if self.flushing.replace(true) {
            tracing::debug!("nested flush ignored");
            return Ok(0);
        }
        let _flushing = FlushingGuard(&self.flushing);

        let mut ran = 0;
        let mut first_error: Option<StoreError> = None;
        loop {
            // Release the queue borrow before running so tasks can schedule.
            let next = self.queue.borrow_mut().pop_front();
            let Some(task) = next else { break };
            ran += 1;
            if let Err(err) = task() {
                first_error.get_or_insert(err);
            }
        }

        tracing::trace!(ran, "flush complete");
        match first_error {
            Some(err) => Err(err),
            None => Ok(ran),
        }
    }

    /// Number of tasks waiting for the next flush.
    pub fn pending_tasks(&self) -> usize {
        self.queue.borrow().len()
    }

    /// True when nothing is queued.
    pub fn is_idle(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// True while [`flush`](Self::flush) is running tasks.
    pub fn is_flushing(&self) -> bool {
        self.flushing.get()
    }
}

struct FlushingGuard<'a>(&'a Cell<bool>);

impl Drop for FlushingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
