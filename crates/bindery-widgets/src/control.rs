#![forbid(unsafe_code)]

//! Controls: views that can be enabled and fire an action.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bindery_core::{Constant, Dynamic, Lifetime, Signal, SignalInput, SignalOut, channel};
use bindery_runtime::{
    ApplyBinding, AssociatedObjects, Binder, BinderStorage, Binding, BindingName, NativeObject,
    ObjectStorage, PrepareBinding, Preparer, inherit_bindings,
};

use crate::native::ObjectId;
use crate::view::{NativeView, ViewBinding, ViewInstance, ViewParameters, ViewPreparer};

/// Size class fixed at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ControlSize {
    #[default]
    Regular,
    Small,
    Mini,
}

/// Construction-time control parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlParameters {
    pub view: ViewParameters,
    pub control_size: ControlSize,
}

/// Receiver of a control's action.
pub trait ActionTarget {
    fn perform_action(&self, sender: ObjectId);
}

/// A view the user interacts with.
pub struct NativeControl {
    view: NativeView,
    control_size: ControlSize,
    enabled: Cell<bool>,
    target: RefCell<Option<Rc<dyn ActionTarget>>>,
}

impl NativeControl {
    #[must_use]
    pub fn new(parameters: ControlParameters) -> Self {
        Self {
            view: NativeView::new(parameters.view),
            control_size: parameters.control_size,
            enabled: Cell::new(true),
            target: RefCell::new(None),
        }
    }

    #[must_use]
    pub fn control_size(&self) -> ControlSize {
        self.control_size
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
        self.view.journal().record("enabled", enabled);
    }

    pub fn set_target(&self, target: Option<Rc<dyn ActionTarget>>) {
        *self.target.borrow_mut() = target;
    }

    #[must_use]
    pub fn has_target(&self) -> bool {
        self.target.borrow().is_some()
    }

    /// Simulate a click. Returns whether an action was sent.
    pub fn perform_click(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let target = self.target.borrow().clone();
        match target {
            Some(target) => {
                target.perform_action(self.view.id());
                true
            }
            None => false,
        }
    }
}

impl Default for NativeControl {
    fn default() -> Self {
        Self::new(ControlParameters::default())
    }
}

impl NativeObject for NativeControl {
    fn associated_objects(&self) -> &AssociatedObjects {
        self.view.associated_objects()
    }
}

impl ViewInstance for NativeControl {
    fn view(&self) -> &NativeView {
        &self.view
    }
}

impl fmt::Debug for NativeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeControl")
            .field("view", &self.view)
            .field("enabled", &self.enabled.get())
            .field("control_size", &self.control_size)
            .finish_non_exhaustive()
    }
}

/// Any native object that is a control.
pub trait ControlInstance: ViewInstance {
    fn control(&self) -> &NativeControl;
}

impl ControlInstance for NativeControl {
    fn control(&self) -> &NativeControl {
        self
    }
}

/// Bindings of the control level.
pub enum ControlBinding {
    Inherited(ViewBinding),
    /// Construction only.
    ControlSize(Constant<ControlSize>),
    IsEnabled(Dynamic<bool>),
    /// Emits once per click while enabled.
    Action(SignalOut<()>),
}

impl ControlBinding {
    pub fn control_size(size: ControlSize) -> Self {
        Self::ControlSize(Constant::new(size))
    }

    pub fn is_enabled(value: impl Into<Dynamic<bool>>) -> Self {
        Self::IsEnabled(value.into())
    }

    pub fn action(sink: impl Into<SignalOut<()>>) -> Self {
        Self::Action(sink.into())
    }
}

impl Binding for ControlBinding {
    fn name(&self) -> BindingName {
        let case = match self {
            Self::Inherited(inherited) => return inherited.name(),
            Self::ControlSize(_) => "controlSize",
            Self::IsEnabled(_) => "isEnabled",
            Self::Action(_) => "action",
        };
        BindingName::new("Control", case)
    }
}

inherit_bindings!(ControlBinding => ViewBinding => bindery_runtime::BaseBinding);

struct ActionForwarder(SignalInput<()>);

impl ActionTarget for ActionForwarder {
    fn perform_action(&self, _sender: ObjectId) {
        self.0.send(());
    }
}

/// Preparer of the control level.
///
/// All `Action` bindings share one target installed on the control; each
/// binding subscribes its sink to the target's stream.
#[derive(Default)]
pub struct ControlPreparer {
    inherited: ViewPreparer,
    control_size: ControlSize,
    has_action: bool,
    actions: Option<Signal<()>>,
}

impl PrepareBinding for ControlPreparer {
    type Binding = ControlBinding;

    fn prepare_binding(&mut self, binding: &ControlBinding) {
        match binding {
            ControlBinding::Inherited(inherited) => self.inherited.prepare_binding(inherited),
            ControlBinding::ControlSize(size) => self.control_size = *size.value(),
            ControlBinding::Action(_) => self.has_action = true,
            ControlBinding::IsEnabled(_) => {}
        }
    }
}

impl<I: ControlInstance, S: BinderStorage> ApplyBinding<I, S> for ControlPreparer {
    fn prepare_instance(&mut self, instance: &Rc<I>, storage: &Rc<S>) {
        self.inherited.prepare_instance(instance, storage);
        if self.has_action {
            let (input, actions) = channel();
            instance
                .control()
                .set_target(Some(Rc::new(ActionForwarder(input))));
            self.actions = Some(actions);
        }
    }

    fn apply_binding(
        &mut self,
        binding: ControlBinding,
        instance: &Rc<I>,
        storage: &Rc<S>,
    ) -> Option<Lifetime> {
        match binding {
            ControlBinding::Inherited(inherited) => {
                self.inherited.apply_binding(inherited, instance, storage)
            }
            ControlBinding::ControlSize(_) => None,
            ControlBinding::IsEnabled(value) => {
                value.apply(instance, storage, |i, _, enabled| i.control().set_enabled(enabled))
            }
            ControlBinding::Action(sink) => {
                let actions = self.actions.clone()?;
                sink.apply(instance, storage, move |_, _, input| {
                    actions.observe(move |()| input.send(())).into_lifetime()
                })
            }
        }
    }

    fn finalize_instance(&mut self, instance: &Rc<I>, storage: &Rc<S>) -> Option<Lifetime> {
        let inherited = self.inherited.finalize_instance(instance, storage);
        let detach = self.actions.take().map(|_| {
            let weak = Rc::downgrade(instance);
            Lifetime::from_fn(move || {
                if let Some(instance) = weak.upgrade() {
                    instance.control().set_target(None);
                }
            })
        });
        Lifetime::combine(inherited, detach)
    }
}

impl Preparer for ControlPreparer {
    const NAME: &'static str = "Control";

    type Instance = NativeControl;
    type Storage = ObjectStorage;
    type Parameters = ControlParameters;

    fn construct_storage(&mut self) -> Rc<ObjectStorage> {
        self.inherited.construct_storage()
    }

    fn take_parameters(&mut self) -> ControlParameters {
        ControlParameters {
            view: self.inherited.take_parameters(),
            control_size: std::mem::take(&mut self.control_size),
        }
    }

    fn construct_instance(parameters: ControlParameters) -> Rc<NativeControl> {
        Rc::new(NativeControl::new(parameters))
    }
}

/// Binder for plain controls.
pub type Control = Binder<ControlPreparer>;
