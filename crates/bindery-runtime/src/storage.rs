#![forbid(unsafe_code)]

//! Per-instance binding storage.
//!
//! A binder allocates one storage object per constructed instance. It owns
//! the [`AggregateLifetime`] of every applied binding, doubles as the
//! instance's delegate when any binding needed one, and is attached to the
//! instance as an associated object so it lives exactly as long as the
//! instance does.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use bindery_core::AggregateLifetime;

use crate::delegate::{Delegate, DelegateProtocol, DynamicDelegate, NoDelegate, Selector};

/// Key under which a binder attaches its storage to the instance.
pub const STORAGE_KEY: &str = "bindery.storage";

/// Storage contract seen by the binder.
pub trait BinderStorage: 'static {
    /// Whether a binding needed this storage as the instance's delegate.
    fn in_use(&self) -> bool;

    /// Lifetimes of every applied binding.
    fn lifetime(&self) -> &AggregateLifetime;
}

/// Storage for a native object, optionally carrying a dynamic delegate.
pub struct ObjectStorage<P: DelegateProtocol = NoDelegate> {
    delegate: Option<DynamicDelegate<P>>,
    lifetime: AggregateLifetime,
}

impl<P: DelegateProtocol> ObjectStorage<P> {
    /// Storage with the delegate assembled during the prepare phase.
    #[must_use]
    pub fn new(delegate: Option<DynamicDelegate<P>>) -> Self {
        Self {
            delegate,
            lifetime: AggregateLifetime::new(),
        }
    }

    /// The delegate, if any binding registered a selector.
    #[must_use]
    pub fn dynamic_delegate(&self) -> Option<&DynamicDelegate<P>> {
        self.delegate.as_ref()
    }
}

impl<P: DelegateProtocol> Default for ObjectStorage<P> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<P: DelegateProtocol> BinderStorage for ObjectStorage<P> {
    fn in_use(&self) -> bool {
        self.delegate
            .as_ref()
            .is_some_and(|delegate| !delegate.is_empty())
    }

    fn lifetime(&self) -> &AggregateLifetime {
        &self.lifetime
    }
}

impl<P: DelegateProtocol> Delegate for ObjectStorage<P> {
    fn responds_to(&self, selector: Selector) -> bool {
        self.delegate
            .as_ref()
            .is_some_and(|delegate| delegate.responds_to(selector))
    }

    fn handler(&self, selector: Selector) -> Option<Rc<dyn Any>> {
        self.delegate.as_ref()?.handler(selector)
    }
}

impl<P: DelegateProtocol> fmt::Debug for ObjectStorage<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("delegate", &self.delegate)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// A native object: anything that can carry associated objects.
pub trait NativeObject: 'static {
    /// Side table of objects whose lifetime is tied to this one.
    fn associated_objects(&self) -> &AssociatedObjects;
}

/// Keyed side table attached to a native object.
#[derive(Default)]
pub struct AssociatedObjects {
    entries: RefCell<AHashMap<&'static str, Rc<dyn Any>>>,
}

impl AssociatedObjects {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `value` under `key`, returning the previous entry.
    pub fn set(&self, key: &'static str, value: Rc<dyn Any>) -> Option<Rc<dyn Any>> {
        self.entries.borrow_mut().insert(key, value)
    }

    /// The entry under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Rc<dyn Any>> {
        self.entries.borrow().get(key).cloned()
    }

    /// The entry under `key`, downcast to `T`.
    #[must_use]
    pub fn get_as<T: Any>(&self, key: &str) -> Option<Rc<T>> {
        self.get(key)?.downcast::<T>().ok()
    }

    /// Whether an entry exists under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// Detach the entry under `key`.
    pub fn remove(&self, key: &str) -> Option<Rc<dyn Any>> {
        // Drop happens in the caller, outside the borrow.
        self.entries.borrow_mut().remove(key)
    }

    /// Number of attached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether nothing is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl fmt::Debug for AssociatedObjects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.entries.borrow().keys().copied().collect();
        keys.sort_unstable();
        f.debug_struct("AssociatedObjects")
            .field("keys", &keys)
            .finish()
    }
}
