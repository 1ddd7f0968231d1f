#![forbid(unsafe_code)]

//! The root binding level shared by every family.
//!
//! Its cases are escape hatches: arbitrary code run against the freshly
//! constructed instance, and objects whose lifetime should follow it.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use bindery_core::Lifetime;

use crate::preparer::{ApplyBinding, Binding, BindingName, PrepareBinding};
use crate::storage::BinderStorage;

type PrepareHook = Rc<dyn Fn(&dyn Any)>;
type FinalizeHook = Rc<dyn Fn(&dyn Any) -> Option<Lifetime>>;

/// Binding cases available to every bound type.
#[derive(Clone)]
pub enum BaseBinding {
    /// Run against the instance before any other binding is applied.
    AdHocPrepare(PrepareHook),
    /// Run against the instance after every other binding was applied.
    AdHocFinalize(FinalizeHook),
    /// Keep an object alive until the bindings are cancelled.
    Retain(Rc<dyn Any>),
}

impl BaseBinding {
    /// Typed [`AdHocPrepare`](Self::AdHocPrepare); ignored for other instance types.
    pub fn ad_hoc_prepare<T: Any>(f: impl Fn(&T) + 'static) -> Self {
        Self::AdHocPrepare(Rc::new(move |instance: &dyn Any| {
            if let Some(instance) = instance.downcast_ref::<T>() {
                f(instance);
            }
        }))
    }

    /// Typed [`AdHocFinalize`](Self::AdHocFinalize); ignored for other instance types.
    pub fn ad_hoc_finalize<T: Any>(f: impl Fn(&T) -> Option<Lifetime> + 'static) -> Self {
        Self::AdHocFinalize(Rc::new(move |instance: &dyn Any| {
            instance.downcast_ref::<T>().and_then(|instance| f(instance))
        }))
    }

    pub fn retain(object: impl Any) -> Self {
        Self::Retain(Rc::new(object))
    }
}

impl Binding for BaseBinding {
    fn name(&self) -> BindingName {
        let case = match self {
            Self::AdHocPrepare(_) => "adHocPrepare",
            Self::AdHocFinalize(_) => "adHocFinalize",
            Self::Retain(_) => "retain",
        };
        BindingName::new("Base", case)
    }
}

impl fmt::Debug for BaseBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BaseBinding::{}", self.name().case)
    }
}

/// Preparer for [`BaseBinding`]; embedded by every root level.
#[derive(Default)]
pub struct BasePreparer {
    prepare_hooks: Vec<PrepareHook>,
    finalize_hooks: Vec<FinalizeHook>,
}

impl PrepareBinding for BasePreparer {
    type Binding = BaseBinding;

    fn prepare_binding(&mut self, binding: &BaseBinding) {
        match binding {
            BaseBinding::AdHocPrepare(hook) => self.prepare_hooks.push(Rc::clone(hook)),
            BaseBinding::AdHocFinalize(hook) => self.finalize_hooks.push(Rc::clone(hook)),
            BaseBinding::Retain(_) => {}
        }
    }
}

impl<I: 'static, S: BinderStorage> ApplyBinding<I, S> for BasePreparer {
    fn prepare_instance(&mut self, instance: &Rc<I>, _storage: &Rc<S>) {
        for hook in std::mem::take(&mut self.prepare_hooks) {
            hook(&**instance);
        }
    }

    fn apply_binding(
        &mut self,
        binding: BaseBinding,
        _instance: &Rc<I>,
        _storage: &Rc<S>,
    ) -> Option<Lifetime> {
        match binding {
            BaseBinding::AdHocPrepare(_) | BaseBinding::AdHocFinalize(_) => None,
            BaseBinding::Retain(object) => Some(Lifetime::from_fn(move || drop(object))),
        }
    }

    fn finalize_instance(&mut self, instance: &Rc<I>, _storage: &Rc<S>) -> Option<Lifetime> {
        std::mem::take(&mut self.finalize_hooks)
            .into_iter()
            .fold(None, |acc, hook| Lifetime::combine(acc, hook(&**instance)))
    }
}
