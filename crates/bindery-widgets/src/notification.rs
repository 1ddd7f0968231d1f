#![forbid(unsafe_code)]

//! A per-thread notification centre.
//!
//! Native objects post named notifications; observers register for a name,
//! optionally filtered by sender. Registration returns an [`Observer`]
//! handle that unregisters on cancel or drop, so it can be wrapped in a
//! [`Lifetime`](bindery_core::Lifetime) directly.
//!
//! # Invariants
//!
//! - Observers run in registration order.
//! - An observer cancelled during a post is not called for the rest of it.
//! - Observers registered during a post are first called by the next post.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use bindery_core::Cancellable;

use crate::native::ObjectId;

/// A posted notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub name: &'static str,
    pub sender: ObjectId,
}

type Callback = Rc<dyn Fn(&Notification)>;

struct Registration {
    id: u64,
    sender: Option<ObjectId>,
    active: Rc<Cell<bool>>,
    callback: Callback,
}

/// Dispatches notifications to registered observers.
#[derive(Default)]
pub struct NotificationCenter {
    observers: RefCell<AHashMap<&'static str, Vec<Registration>>>,
    next_id: Cell<u64>,
}

thread_local! {
    static DEFAULT_CENTER: Rc<NotificationCenter> = Rc::new(NotificationCenter::default());
}

impl NotificationCenter {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// This thread's shared centre.
    #[must_use]
    pub fn default_center() -> Rc<Self> {
        DEFAULT_CENTER.with(Rc::clone)
    }

    /// Observe `name`, from `sender` only when given.
    pub fn observe(
        self: &Rc<Self>,
        name: &'static str,
        sender: Option<ObjectId>,
        callback: impl Fn(&Notification) + 'static,
    ) -> Observer {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let active = Rc::new(Cell::new(true));
        self.observers
            .borrow_mut()
            .entry(name)
            .or_default()
            .push(Registration {
                id,
                sender,
                active: Rc::clone(&active),
                callback: Rc::new(callback),
            });
        Observer {
            center: Rc::downgrade(self),
            name,
            id,
            active,
        }
    }

    /// Deliver a notification to every matching observer.
    pub fn post(&self, name: &'static str, sender: ObjectId) {
        let notification = Notification { name, sender };
        let snapshot: Vec<(Rc<Cell<bool>>, Callback)> = match self.observers.borrow().get(name) {
            Some(registrations) => registrations
                .iter()
                .filter(|r| r.sender.is_none_or(|s| s == sender))
                .map(|r| (Rc::clone(&r.active), Rc::clone(&r.callback)))
                .collect(),
            None => return,
        };
        for (active, callback) in snapshot {
            if active.get() {
                callback(&notification);
            }
        }
    }

    /// Live observers of `name`.
    #[must_use]
    pub fn observer_count(&self, name: &str) -> usize {
        self.observers.borrow().get(name).map_or(0, Vec::len)
    }

    fn remove(&self, name: &'static str, id: u64) {
        let removed = {
            let mut observers = self.observers.borrow_mut();
            let Some(registrations) = observers.get_mut(name) else {
                return;
            };
            let removed = registrations
                .iter()
                .position(|r| r.id == id)
                .map(|index| registrations.remove(index));
            if registrations.is_empty() {
                observers.remove(name);
            }
            removed
        };
        // The callback may own objects whose drop posts again.
        drop(removed);
    }
}

impl fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.observers.borrow().keys().copied().collect();
        names.sort_unstable();
        f.debug_struct("NotificationCenter")
            .field("names", &names)
            .finish()
    }
}

/// Registration handle returned by [`NotificationCenter::observe`].
#[must_use = "dropping an Observer unregisters it"]
pub struct Observer {
    center: Weak<NotificationCenter>,
    name: &'static str,
    id: u64,
    active: Rc<Cell<bool>>,
}

impl Observer {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

impl Cancellable for Observer {
    fn cancel(&mut self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(center) = self.center.upgrade() {
            center.remove(self.name, self.id);
        }
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("name", &self.name)
            .field("active", &self.active.get())
            .finish()
    }
}
