use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

/// Compares shared values by pointer rather than by content.
///
/// Selector arguments are compared with `PartialEq`. Wrapping an `Rc` in
/// `Identity` makes that comparison an identity check, which is what state
/// that is replaced rather than mutated needs.
///
/// ```
/// use std::rc::Rc;
/// use tinstate::Identity;
///
/// let a = Rc::new(vec![1, 2]);
/// let b = Rc::new(vec![1, 2]);
/// assert_eq!(Identity::new(a.clone()), Identity::new(a));
/// assert_ne!(Identity::new(b.clone()), Identity::new(Rc::new(vec![1, 2])));
/// ```
pub struct Identity<T: ?Sized>(Rc<T>);

impl<T: ?Sized> Identity<T> {
    pub fn new(value: Rc<T>) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> Rc<T> {
        self.0
    }
}

impl<T: ?Sized> Clone for Identity<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: ?Sized> PartialEq for Identity<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Eq for Identity<T> {}

impl<T: ?Sized> Deref for Identity<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Identity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Identity").field(&&*self.0).finish()
    }
}
