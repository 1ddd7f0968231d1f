#![forbid(unsafe_code)]

//! The two-phase preparer protocol.
//!
//! Each level of a binding family (base, view, control, button...) has a
//! preparer. A binder drives the leaf preparer through:
//!
//! 1. [`PrepareBinding::prepare_binding`] for every binding, before any
//!    instance exists. Construction-time constants and delegate selectors
//!    are gathered here.
//! 2. [`Preparer::construct_storage`] and instance construction.
//! 3. [`ApplyBinding::check_instance`], [`ApplyBinding::prepare_instance`], then
//!    [`ApplyBinding::apply_binding`] for every binding in list order, then
//!    [`ApplyBinding::finalize_instance`].
//!
//! Ancestor preparers are embedded in their descendant and receive the
//! `Inherited` case in every phase, so each level only sees its own cases.

use std::fmt;
use std::rc::Rc;

use bindery_core::Lifetime;

use crate::storage::{BinderStorage, NativeObject};

/// Diagnostic identity of a binding case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingName {
    /// The level that declares the case.
    pub owner: &'static str,
    /// The case itself.
    pub case: &'static str,
}

impl BindingName {
    #[must_use]
    pub const fn new(owner: &'static str, case: &'static str) -> Self {
        Self { owner, case }
    }
}

impl fmt::Display for BindingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.case)
    }
}

/// A closed set of binding cases for one level.
pub trait Binding: 'static {
    /// The declaring level and case, resolved through `Inherited` wrappers.
    fn name(&self) -> BindingName;
}

/// Phase 1: inspect a binding before the instance exists.
pub trait PrepareBinding: Default {
    type Binding: Binding;

    fn prepare_binding(&mut self, binding: &Self::Binding);
}

/// Phase 2: apply bindings to an instance of `I` with storage `S`.
///
/// Generic over the instance so ancestor levels can serve every descendant
/// instance type.
pub trait ApplyBinding<I, S>: PrepareBinding {
    /// Runs before the instance is touched. Raise here when the instance
    /// cannot take these bindings, e.g. its delegate slot is taken.
    fn check_instance(&self, _instance: &Rc<I>, _storage: &Rc<S>) {}

    /// Runs once, after construction and before any binding is applied.
    fn prepare_instance(&mut self, _instance: &Rc<I>, _storage: &Rc<S>) {}

    /// Apply one binding. Returns the lifetime of whatever it left running.
    fn apply_binding(
        &mut self,
        binding: Self::Binding,
        instance: &Rc<I>,
        storage: &Rc<S>,
    ) -> Option<Lifetime>;

    /// Runs once, after every binding was applied.
    fn finalize_instance(&mut self, _instance: &Rc<I>, _storage: &Rc<S>) -> Option<Lifetime> {
        None
    }
}

/// A leaf preparer: the level a binder is instantiated with.
pub trait Preparer: PrepareBinding {
    /// Name of the bound type, used in diagnostics and span fields.
    const NAME: &'static str;

    type Instance: NativeObject;
    type Storage: BinderStorage;
    /// Construction-time parameters gathered in phase 1.
    type Parameters;

    /// Allocate storage. Called after phase 1, before the instance exists.
    fn construct_storage(&mut self) -> Rc<Self::Storage>;

    /// Hand over the construction parameters gathered in phase 1.
    fn take_parameters(&mut self) -> Self::Parameters;

    /// Default instance construction.
    fn construct_instance(parameters: Self::Parameters) -> Rc<Self::Instance>;
}
