use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;

/// An ordered, fixed-length list of argument extractors.
///
/// Implemented for tuples of one to three `Fn(&S) -> A` closures, where the
/// extracted arguments form a tuple, and for `Vec<Box<dyn Fn(&S) -> A>>`,
/// where they form a `Vec` whose length is checked on every call.
pub trait Extractors<S: ?Sized, Args> {
    /// Run every extractor against `state`, in declared order.
    fn extract(&self, state: &S) -> Args;

    /// Number of arguments in an extracted list.
    fn arity(args: &Args) -> usize;
}

impl<S, A, F1> Extractors<S, (A,)> for (F1,)
where
    S: ?Sized,
    F1: Fn(&S) -> A,
{
    fn extract(&self, state: &S) -> (A,) {
        ((self.0)(state),)
    }

    fn arity(_: &(A,)) -> usize {
        1
    }
}

impl<S, A, B, F1, F2> Extractors<S, (A, B)> for (F1, F2)
where
    S: ?Sized,
    F1: Fn(&S) -> A,
    F2: Fn(&S) -> B,
{
    fn extract(&self, state: &S) -> (A, B) {
        ((self.0)(state), (self.1)(state))
    }

    fn arity(_: &(A, B)) -> usize {
        2
    }
}

impl<S, A, B, C, F1, F2, F3> Extractors<S, (A, B, C)> for (F1, F2, F3)
where
    S: ?Sized,
    F1: Fn(&S) -> A,
    F2: Fn(&S) -> B,
    F3: Fn(&S) -> C,
{
    fn extract(&self, state: &S) -> (A, B, C) {
        ((self.0)(state), (self.1)(state), (self.2)(state))
    }

    fn arity(_: &(A, B, C)) -> usize {
        3
    }
}

impl<S: ?Sized, A> Extractors<S, Vec<A>> for Vec<Box<dyn Fn(&S) -> A>> {
    fn extract(&self, state: &S) -> Vec<A> {
        self.iter().map(|extract| extract(state)).collect()
    }

    fn arity(args: &Vec<A>) -> usize {
        args.len()
    }
}

/// A memoized derivation over a state value.
///
/// Each call extracts the arguments from the given state. If they all compare
/// equal to the previous call's arguments, the cached result is returned and
/// the compute function is skipped. Only the most recent call is cached.
///
/// # Panics
///
/// [`select`](Selector::select) panics if the number of extracted arguments
/// differs from the cached call's.
///
/// # Examples
///
/// ```
/// use tinstate::Selector;
///
/// struct Point { x: i32, y: i32, label: &'static str }
///
/// let sum = Selector::new(
///     (|p: &Point| p.x, |p: &Point| p.y),
///     |&(x, y): &(i32, i32)| x + y,
/// );
///
/// assert_eq!(sum.select(&Point { x: 1, y: 2, label: "a" }), 3);
/// // Same arguments: served from the cache.
/// assert_eq!(sum.select(&Point { x: 1, y: 2, label: "b" }), 3);
/// ```
pub struct Selector<S: ?Sized, Args, E, C, R> {
    extractors: E,
    compute: C,
    memo: RefCell<Option<(Args, R)>>,
    _state: PhantomData<fn(&S)>,
}

impl<S, Args, E, C, R> Selector<S, Args, E, C, R>
where
    S: ?Sized,
    Args: PartialEq,
    E: Extractors<S, Args>,
    C: Fn(&Args) -> R,
    R: Clone,
{
    /// Create a new selector with the given extractors and compute function.
    pub fn new(extractors: E, compute: C) -> Self {
        Self {
            extractors,
            compute,
            memo: RefCell::new(None),
            _state: PhantomData,
        }
    }

    /// Derive the result for `state`, recomputing only if an argument changed.
    pub fn select(&self, state: &S) -> R {
        let args = self.extractors.extract(state);

        if let Some((cached_args, cached_result)) = self.memo.borrow().as_ref() {
            assert_eq!(
                <E as Extractors<S, Args>>::arity(cached_args),
                <E as Extractors<S, Args>>::arity(&args),
                "selector argument count changed between calls"
            );
            if *cached_args == args {
                return cached_result.clone();
            }
        }

        // No borrow held while computing; a panic leaves the old memo in place.
        let result = (self.compute)(&args);
        *self.memo.borrow_mut() = Some((args, result.clone()));
        result
    }

    /// Turn the selector into a plain `(state) -> result` function.
    pub fn into_fn(self) -> impl Fn(&S) -> R {
        move |state| self.select(state)
    }
}

impl<S: ?Sized, Args, E, C, R> Selector<S, Args, E, C, R> {
    /// True if a previous call's result is cached.
    pub fn is_cached(&self) -> bool {
        self.memo.borrow().is_some()
    }

    /// Drop the cached arguments and result.
    pub fn clear(&self) {
        self.memo.borrow_mut().take();
    }
}

impl<S: ?Sized, Args, E, C, R: fmt::Debug> fmt::Debug for Selector<S, Args, E, C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let memo = self.memo.borrow();
        f.debug_struct("Selector")
            .field("cached", &memo.as_ref().map(|(_, result)| result))
            .finish()
    }
}

/// Create a new memoized selector.
///
/// # Example
///
/// ```
/// use tinstate::create_selector;
///
/// let doubled = create_selector((|n: &i32| *n,), |&(n,): &(i32,)| n * 2);
/// assert_eq!(doubled.select(&5), 10);
/// ```
pub fn create_selector<S, Args, E, C, R>(extractors: E, compute: C) -> Selector<S, Args, E, C, R>
where
    S: ?Sized,
    Args: PartialEq,
    E: Extractors<S, Args>,
    C: Fn(&Args) -> R,
    R: Clone,
{
    Selector::new(extractors, compute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Identity;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone)]
    struct State {
        a: i32,
        b: i32,
        other: &'static str,
    }

    fn counted_sum(
        calls: Rc<Cell<usize>>,
    ) -> Selector<
        State,
        (i32, i32),
        (fn(&State) -> i32, fn(&State) -> i32),
        impl Fn(&(i32, i32)) -> i32,
        i32,
    > {
        let a: fn(&State) -> i32 = |s| s.a;
        let b: fn(&State) -> i32 = |s| s.b;
        Selector::new((a, b), move |&(a, b): &(i32, i32)| {
            calls.set(calls.get() + 1);
            a + b
        })
    }

    #[test]
    fn cache_hit_skips_compute() {
        let calls = Rc::new(Cell::new(0));
        let sum = counted_sum(calls.clone());

        let s1 = State { a: 1, b: 2, other: "x" };
        let s2 = State { other: "y", ..s1.clone() };
        assert_ne!(s1.other, s2.other);

        assert_eq!(sum.select(&s1), 3);
        assert_eq!(sum.select(&s2), 3);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn changed_argument_recomputes() {
        let calls = Rc::new(Cell::new(0));
        let sum = counted_sum(calls.clone());

        sum.select(&State { a: 1, b: 2, other: "" });
        assert_eq!(sum.select(&State { a: 5, b: 2, other: "" }), 7);
        assert_eq!(sum.select(&State { a: 5, b: 0, other: "" }), 5);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn cache_depth_is_one() {
        let calls = Rc::new(Cell::new(0));
        let sum = counted_sum(calls.clone());
        let first = State { a: 1, b: 1, other: "" };
        let second = State { a: 2, b: 2, other: "" };

        sum.select(&first);
        sum.select(&second);
        sum.select(&first);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn clear_forces_recompute() {
        let calls = Rc::new(Cell::new(0));
        let sum = counted_sum(calls.clone());
        let state = State { a: 1, b: 1, other: "" };

        sum.select(&state);
        assert!(sum.is_cached());
        sum.clear();
        assert!(!sum.is_cached());
        sum.select(&state);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn runtime_list_of_extractors() {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        let extractors: Vec<Box<dyn Fn(&State) -> i32>> =
            vec![Box::new(|s| s.a), Box::new(|s| s.b), Box::new(|s| s.a * s.b)];
        let total = Selector::new(extractors, move |args: &Vec<i32>| {
            calls_clone.set(calls_clone.get() + 1);
            args.iter().sum::<i32>()
        });

        assert_eq!(total.select(&State { a: 2, b: 3, other: "" }), 11);
        assert_eq!(total.select(&State { a: 2, b: 3, other: "z" }), 11);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn identity_arguments_compare_by_pointer() {
        struct Shared {
            items: Rc<Vec<i32>>,
        }

        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        let len = Selector::new(
            (|s: &Shared| Identity::new(s.items.clone()),),
            move |(items,): &(Identity<Vec<i32>>,)| {
                calls_clone.set(calls_clone.get() + 1);
                items.len()
            },
        );

        let items = Rc::new(vec![1, 2, 3]);
        assert_eq!(len.select(&Shared { items: items.clone() }), 3);
        assert_eq!(len.select(&Shared { items }), 3);
        assert_eq!(calls.get(), 1);

        // Equal content, different allocation.
        assert_eq!(len.select(&Shared { items: Rc::new(vec![1, 2, 3]) }), 3);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn nan_never_hits_cache() {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        let sel = Selector::new((|x: &f64| *x,), move |&(x,): &(f64,)| {
            calls_clone.set(calls_clone.get() + 1);
            x.is_nan()
        });

        sel.select(&f64::NAN);
        sel.select(&f64::NAN);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn compute_panic_propagates_and_keeps_memo() {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        let checked = Selector::new((|n: &i32| *n,), move |&(n,): &(i32,)| {
            calls_clone.set(calls_clone.get() + 1);
            assert!(n >= 0, "negative input {n}");
            n * 2
        });

        assert_eq!(checked.select(&4), 8);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| checked.select(&-1)));
        let payload = result.unwrap_err();
        assert_eq!(
            payload.downcast_ref::<String>().map(String::as_str),
            Some("negative input -1")
        );

        assert!(checked.is_cached());
        assert_eq!(checked.select(&4), 8);
        assert_eq!(calls.get(), 2);
    }

    /// Extracts one argument per character of the input.
    struct PerChar;

    impl Extractors<str, Vec<char>> for PerChar {
        fn extract(&self, state: &str) -> Vec<char> {
            state.chars().collect()
        }

        fn arity(args: &Vec<char>) -> usize {
            args.len()
        }
    }

    #[test]
    #[should_panic(expected = "selector argument count changed between calls")]
    fn arity_change_is_fatal() {
        let sel = Selector::new(PerChar, |args: &Vec<char>| args.len());
        sel.select("ab");
        sel.select("abc");
    }

    #[test]
    fn into_fn_keeps_memo() {
        let calls = Rc::new(Cell::new(0));
        let select = counted_sum(calls.clone()).into_fn();
        let state = State { a: 4, b: 4, other: "" };

        assert_eq!(select(&state), 8);
        assert_eq!(select(&state), 8);
        assert_eq!(calls.get(), 1);
    }
}
