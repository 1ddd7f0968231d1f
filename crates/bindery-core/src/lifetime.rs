#![forbid(unsafe_code)]

//! Cancellation handles for applied bindings.
//!
//! Every apply operation that leaves something running (a signal
//! subscription, an observer registration, an action target) hands back a
//! [`Lifetime`]. A binder collects them into one [`AggregateLifetime`] owned
//! by the bound instance's storage.
//!
//! # Invariants
//!
//! 1. A `Lifetime` cancels its underlying resource at most once, either
//!    explicitly or on drop.
//! 2. `AggregateLifetime::cancel` cancels every member exactly once, in
//!    registration order; further calls are no-ops.
//! 3. A lifetime pushed into an already cancelled aggregate is cancelled
//!    immediately.
//! 4. Cancellation re-entering the aggregate (a member whose teardown cancels
//!    the aggregate again) returns without touching the member list.

use std::cell::{Cell, RefCell};
use std::fmt;

/// Anything that can be torn down.
pub trait Cancellable {
    /// Release the underlying resource. Must tolerate repeated calls.
    fn cancel(&mut self);
}

struct OnCancel<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> Cancellable for OnCancel<F> {
    fn cancel(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

/// An owned, cancel-once handle for one active subscription or attachment.
///
/// Dropping the handle cancels it.
#[must_use = "dropping a Lifetime cancels it immediately"]
pub struct Lifetime {
    inner: Option<Box<dyn Cancellable>>,
}

impl Lifetime {
    /// Wrap a cancellable resource.
    pub fn new(resource: impl Cancellable + 'static) -> Self {
        Self {
            inner: Some(Box::new(resource)),
        }
    }

    /// A lifetime that runs `f` when cancelled.
    pub fn from_fn(f: impl FnOnce() + 'static) -> Self {
        Self::new(OnCancel(Some(f)))
    }

    /// Merge two optional lifetimes into one.
    pub fn combine(first: Option<Lifetime>, second: Option<Lifetime>) -> Option<Lifetime> {
        match (first, second) {
            (None, None) => None,
            (Some(one), None) | (None, Some(one)) => Some(one),
            (Some(first), Some(second)) => {
                let aggregate = AggregateLifetime::new();
                aggregate.push(first);
                aggregate.push(second);
                Some(Lifetime::new(aggregate))
            }
        }
    }

    /// Whether this handle has already been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_none()
    }

    /// Cancel the underlying resource. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.cancel();
        }
    }
}

impl Cancellable for Lifetime {
    fn cancel(&mut self) {
        Lifetime::cancel(self);
    }
}

impl Drop for Lifetime {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifetime")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// An ordered collection of lifetimes cancelled together.
///
/// All methods take `&self` so the aggregate can live inside a shared
/// storage object and still be cancelled from a callback.
#[derive(Default)]
pub struct AggregateLifetime {
    members: RefCell<Vec<Lifetime>>,
    cancelled: Cell<bool>,
}

impl AggregateLifetime {
    /// Create an empty aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lifetime. Cancels it at once if the aggregate is already cancelled.
    pub fn push(&self, mut lifetime: Lifetime) {
        if self.cancelled.get() {
            lifetime.cancel();
            return;
        }
        self.members.borrow_mut().push(lifetime);
    }

    /// Add several lifetimes, preserving order.
    pub fn extend(&self, lifetimes: impl IntoIterator<Item = Lifetime>) {
        for lifetime in lifetimes {
            self.push(lifetime);
        }
    }

    /// Number of live members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.borrow().len()
    }

    /// Whether there are no live members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.borrow().is_empty()
    }

    /// Whether [`cancel`](Self::cancel) has run.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    /// Cancel every member exactly once.
    pub fn cancel(&self) {
        if self.cancelled.replace(true) {
            return;
        }
        // Release the borrow before running member teardown; members may
        // push into or cancel this aggregate again.
        let members = std::mem::take(&mut *self.members.borrow_mut());
        for mut member in members {
            member.cancel();
        }
    }
}

impl Cancellable for AggregateLifetime {
    fn cancel(&mut self) {
        AggregateLifetime::cancel(self);
    }
}

impl Drop for AggregateLifetime {
    fn drop(&mut self) {
        AggregateLifetime::cancel(self);
    }
}

impl fmt::Debug for AggregateLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateLifetime")
            .field("members", &self.len())
            .field("cancelled", &self.cancelled.get())
            .finish()
    }
}
