//! Equality composition for selection keys and item content.
//!
//! A list is configured with two independent equality notions:
//!
//! - the **selection key**, a projection `Fn(&T) -> K` deciding whether two
//!   items are the same conceptual item across refresh cycles;
//! - **content equality**, a [`ContentEq`] predicate deciding whether a
//!   matched item needs updating.
//!
//! Content equality is built from composable primitives: key-only (the
//! default), natural `PartialEq`, a projected field, a free-form predicate,
//! or any of those conjoined with further projections via [`ContentEq::and`].

use std::rc::Rc;

/// Selection-key projection shared by a list and its clones.
pub type KeyFn<T, K> = Rc<dyn Fn(&T) -> K>;

/// Content-equality predicate for matched items.
///
/// Cheap to clone; the underlying predicate is shared.
pub struct ContentEq<T: ?Sized>(Rc<dyn Fn(&T, &T) -> bool>);

impl<T: ?Sized> Clone for ContentEq<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: 'static> ContentEq<T> {
    /// Items matched by selection key are considered unchanged.
    ///
    /// This is the default notion: a refresh will never touch the content of
    /// a surviving item unless a richer comparison is configured.
    pub fn key_only() -> Self {
        Self(Rc::new(|_, _| true))
    }

    /// Natural equality via `PartialEq`.
    pub fn natural() -> Self
    where
        T: PartialEq,
    {
        Self(Rc::new(|a, b| a == b))
    }

    /// Equality of a projected value.
    pub fn by<P, F>(projection: F) -> Self
    where
        F: Fn(&T) -> P + 'static,
        P: PartialEq,
    {
        Self(Rc::new(move |a, b| projection(a) == projection(b)))
    }

    /// Free-form predicate.
    pub fn with<F>(predicate: F) -> Self
    where
        F: Fn(&T, &T) -> bool + 'static,
    {
        Self(Rc::new(predicate))
    }

    /// Conjunction: the current notion must hold *and* the projected values
    /// must match. Chainable.
    pub fn and<P, F>(self, projection: F) -> Self
    where
        F: Fn(&T) -> P + 'static,
        P: PartialEq,
    {
        let inner = self.0;
        Self(Rc::new(move |a, b| {
            inner(a, b) && projection(a) == projection(b)
        }))
    }

    pub(crate) fn eval(&self, a: &T, b: &T) -> bool {
        (self.0)(a, b)
    }
}
