#![forbid(unsafe_code)]

//! Buttons: the deepest level of the view hierarchy.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bindery_core::{Constant, Dynamic, Lifetime};
use bindery_runtime::{
    ApplyBinding, AssociatedObjects, BaseBinding, Binder, BinderStorage, Binding, BindingName,
    NativeObject, ObjectStorage, PrepareBinding, Preparer, inherit_bindings,
};

use crate::control::{
    ControlBinding, ControlInstance, ControlParameters, ControlPreparer, NativeControl,
};
use crate::view::{NativeView, ViewBinding, ViewInstance};

/// Click behavior, fixed at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ButtonType {
    #[default]
    Momentary,
    /// Toggles between on and off.
    Switch,
    /// Turns on when clicked.
    Radio,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BezelStyle {
    #[default]
    Push,
    Rounded,
    Square,
    Inline,
}

impl fmt::Display for BezelStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Push => "push",
            Self::Rounded => "rounded",
            Self::Square => "square",
            Self::Inline => "inline",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ButtonState {
    #[default]
    Off,
    On,
    Mixed,
}

impl fmt::Display for ButtonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Mixed => "mixed",
        })
    }
}

/// Construction-time button parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonParameters {
    pub control: ControlParameters,
    pub button_type: ButtonType,
}

pub struct NativeButton {
    control: NativeControl,
    button_type: ButtonType,
    title: RefCell<String>,
    bezel_style: Cell<BezelStyle>,
    state: Cell<ButtonState>,
}

impl NativeButton {
    #[must_use]
    pub fn new(parameters: ButtonParameters) -> Self {
        Self {
            control: NativeControl::new(parameters.control),
            button_type: parameters.button_type,
            title: RefCell::new(String::new()),
            bezel_style: Cell::new(BezelStyle::default()),
            state: Cell::new(ButtonState::default()),
        }
    }

    #[must_use]
    pub fn button_type(&self) -> ButtonType {
        self.button_type
    }

    #[must_use]
    pub fn title(&self) -> String {
        self.title.borrow().clone()
    }

    pub fn set_title(&self, title: String) {
        self.view().journal().record("title", &title);
        *self.title.borrow_mut() = title;
    }

    #[must_use]
    pub fn bezel_style(&self) -> BezelStyle {
        self.bezel_style.get()
    }

    pub fn set_bezel_style(&self, style: BezelStyle) {
        self.bezel_style.set(style);
        self.view().journal().record("bezelStyle", style);
    }

    #[must_use]
    pub fn state(&self) -> ButtonState {
        self.state.get()
    }

    pub fn set_state(&self, state: ButtonState) {
        self.state.set(state);
        self.view().journal().record("state", state);
    }

    /// Simulate a click: update the state per button type, then send the
    /// action. Disabled buttons ignore clicks.
    pub fn perform_click(&self) -> bool {
        if !self.control.is_enabled() {
            return false;
        }
        match self.button_type {
            ButtonType::Momentary => {}
            ButtonType::Switch => self.set_state(match self.state() {
                ButtonState::Off => ButtonState::On,
                ButtonState::On | ButtonState::Mixed => ButtonState::Off,
            }),
            ButtonType::Radio => self.set_state(ButtonState::On),
        }
        self.control.perform_click()
    }
}

impl Default for NativeButton {
    fn default() -> Self {
        Self::new(ButtonParameters::default())
    }
}

impl NativeObject for NativeButton {
    fn associated_objects(&self) -> &AssociatedObjects {
        self.control.associated_objects()
    }
}

impl ViewInstance for NativeButton {
    fn view(&self) -> &NativeView {
        self.control.view()
    }
}

impl ControlInstance for NativeButton {
    fn control(&self) -> &NativeControl {
        &self.control
    }
}

impl fmt::Debug for NativeButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeButton")
            .field("control", &self.control)
            .field("title", &*self.title.borrow())
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

/// Bindings of the button level.
pub enum ButtonBinding {
    Inherited(ControlBinding),
    /// Construction only.
    ButtonType(Constant<ButtonType>),
    Title(Dynamic<String>),
    BezelStyle(Dynamic<BezelStyle>),
    State(Dynamic<ButtonState>),
}

impl ButtonBinding {
    pub fn button_type(button_type: ButtonType) -> Self {
        Self::ButtonType(Constant::new(button_type))
    }

    pub fn title(value: impl Into<Dynamic<String>>) -> Self {
        Self::Title(value.into())
    }

    pub fn bezel_style(value: impl Into<Dynamic<BezelStyle>>) -> Self {
        Self::BezelStyle(value.into())
    }

    pub fn state(value: impl Into<Dynamic<ButtonState>>) -> Self {
        Self::State(value.into())
    }
}

impl Binding for ButtonBinding {
    fn name(&self) -> BindingName {
        let case = match self {
            Self::Inherited(inherited) => return inherited.name(),
            Self::ButtonType(_) => "buttonType",
            Self::Title(_) => "title",
            Self::BezelStyle(_) => "bezelStyle",
            Self::State(_) => "state",
        };
        BindingName::new("Button", case)
    }
}

inherit_bindings!(ButtonBinding => ControlBinding => ViewBinding => BaseBinding);

#[derive(Default)]
pub struct ButtonPreparer {
    inherited: ControlPreparer,
    button_type: ButtonType,
}

impl PrepareBinding for ButtonPreparer {
    type Binding = ButtonBinding;

    fn prepare_binding(&mut self, binding: &ButtonBinding) {
        match binding {
            ButtonBinding::Inherited(inherited) => self.inherited.prepare_binding(inherited),
            ButtonBinding::ButtonType(button_type) => self.button_type = *button_type.value(),
            ButtonBinding::Title(_) | ButtonBinding::BezelStyle(_) | ButtonBinding::State(_) => {}
        }
    }
}

impl<S: BinderStorage> ApplyBinding<NativeButton, S> for ButtonPreparer {
    fn prepare_instance(&mut self, instance: &Rc<NativeButton>, storage: &Rc<S>) {
        self.inherited.prepare_instance(instance, storage);
    }

    fn apply_binding(
        &mut self,
        binding: ButtonBinding,
        instance: &Rc<NativeButton>,
        storage: &Rc<S>,
    ) -> Option<Lifetime> {
        match binding {
            ButtonBinding::Inherited(inherited) => {
                self.inherited.apply_binding(inherited, instance, storage)
            }
            ButtonBinding::ButtonType(_) => None,
            ButtonBinding::Title(value) => {
                value.apply(instance, storage, |button, _, title| button.set_title(title))
            }
            ButtonBinding::BezelStyle(value) => {
                value.apply(instance, storage, |button, _, style| button.set_bezel_style(style))
            }
            ButtonBinding::State(value) => {
                value.apply(instance, storage, |button, _, state| button.set_state(state))
            }
        }
    }

    fn finalize_instance(
        &mut self,
        instance: &Rc<NativeButton>,
        storage: &Rc<S>,
    ) -> Option<Lifetime> {
        self.inherited.finalize_instance(instance, storage)
    }
}

impl Preparer for ButtonPreparer {
    const NAME: &'static str = "Button";

    type Instance = NativeButton;
    type Storage = ObjectStorage;
    type Parameters = ButtonParameters;

    fn construct_storage(&mut self) -> Rc<ObjectStorage> {
        self.inherited.construct_storage()
    }

    fn take_parameters(&mut self) -> ButtonParameters {
        ButtonParameters {
            control: self.inherited.take_parameters(),
            button_type: std::mem::take(&mut self.button_type),
        }
    }

    fn construct_instance(parameters: ButtonParameters) -> Rc<NativeButton> {
        Rc::new(NativeButton::new(parameters))
    }
}

pub type Button = Binder<ButtonPreparer>;
