#![forbid(unsafe_code)]

//! The simulated native object model.
//!
//! Every toolkit object carries an [`ObjectBase`]: a process-unique id, the
//! associated-object table binders attach their storage to, and a
//! [`Journal`] of property mutations so tests can observe exactly what a
//! binding did and in what order.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bindery_runtime::AssociatedObjects;

/// Global counter for object ids.
static OBJECT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a native object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocate a fresh id.
    #[must_use]
    pub fn next() -> Self {
        Self(OBJECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One recorded property change.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Mutation {
    pub property: &'static str,
    pub value: String,
}

/// Append-only record of property mutations.
#[derive(Default)]
pub struct Journal {
    entries: RefCell<Vec<Mutation>>,
}

impl Journal {
    pub fn record(&self, property: &'static str, value: impl fmt::Display) {
        self.entries.borrow_mut().push(Mutation {
            property,
            value: value.to_string(),
        });
    }

    /// A copy of every entry, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<Mutation> {
        self.entries.borrow().clone()
    }

    /// Recorded property names, oldest first.
    #[must_use]
    pub fn properties(&self) -> Vec<&'static str> {
        self.entries.borrow().iter().map(|m| m.property).collect()
    }

    /// Values recorded for `property`, oldest first.
    #[must_use]
    pub fn values_of(&self, property: &str) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter(|m| m.property == property)
            .map(|m| m.value.clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl fmt::Debug for Journal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.borrow().iter()).finish()
    }
}

/// State shared by every native object.
pub struct ObjectBase {
    id: ObjectId,
    associated: AssociatedObjects,
    journal: Journal,
}

impl ObjectBase {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ObjectId::next(),
            associated: AssociatedObjects::new(),
            journal: Journal::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[must_use]
    pub fn associated(&self) -> &AssociatedObjects {
        &self.associated
    }

    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }
}

impl Default for ObjectBase {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBase")
            .field("id", &self.id)
            .field("mutations", &self.journal.len())
            .finish()
    }
}
