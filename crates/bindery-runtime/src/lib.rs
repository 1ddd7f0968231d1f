#![forbid(unsafe_code)]

//! Binder, preparer protocol and dynamic delegates.
//!
//! This crate turns a list of binding values into a constructed, bound
//! native object:
//!
//! - [`Binder`] drives construction and owns the result.
//! - [`PrepareBinding`], [`ApplyBinding`] and [`Preparer`] split each
//!   level's work into a prepare phase (no instance yet) and an apply phase.
//! - [`DynamicDelegate`] multiplexes delegate callbacks from whichever
//!   bindings asked for them.
//! - [`BaseBinding`] is the root level every family inherits.
//! - [`inherit_bindings!`] and [`bindings!`] wire levels together.

pub mod base;
pub mod binder;
pub mod config;
pub mod delegate;
mod inherit;
pub mod preparer;
pub mod storage;

pub use base::{BaseBinding, BasePreparer};
pub use binder::{Binder, BinderPhase};
pub use config::{BinderConfig, TRACE_BINDINGS_ENV};
pub use delegate::{
    Delegate, DelegateProtocol, DelegateSlot, DynamicDelegate, NoDelegate, Selector, invoke,
};
pub use preparer::{ApplyBinding, Binding, BindingName, PrepareBinding, Preparer};
pub use storage::{AssociatedObjects, BinderStorage, NativeObject, ObjectStorage, STORAGE_KEY};

