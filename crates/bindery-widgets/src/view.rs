#![forbid(unsafe_code)]

//! Views: the root of the visual hierarchy and its binding level.
//!
//! [`ViewPreparer`] serves every instance that is a view ([`ViewInstance`]),
//! so controls and buttons reuse it as their ancestor level.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bindery_core::{Constant, Dynamic, Lifetime, SignalIn, SignalOut};
use bindery_runtime::{
    ApplyBinding, AssociatedObjects, BaseBinding, BasePreparer, Binder, BinderStorage, Binding,
    BindingName, NativeObject, ObjectStorage, PrepareBinding, Preparer, inherit_bindings,
};

use crate::geometry::Rect;
use crate::native::{Journal, ObjectBase, ObjectId};
use crate::notification::NotificationCenter;

/// Posted after a view's frame changes, when the view opted in.
pub const FRAME_DID_CHANGE: &str = "viewFrameDidChange";

/// Construction-time view parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewParameters {
    pub layer_backed: bool,
}

/// A rectangular region of a window.
pub struct NativeView {
    base: ObjectBase,
    layer_backed: bool,
    frame: Cell<Rect>,
    hidden: Cell<bool>,
    alpha: Cell<f64>,
    tool_tip: RefCell<Option<String>>,
    display_count: Cell<u32>,
    posts_frame_changes: Cell<bool>,
}

impl NativeView {
    #[must_use]
    pub fn new(parameters: ViewParameters) -> Self {
        Self {
            base: ObjectBase::new(),
            layer_backed: parameters.layer_backed,
            frame: Cell::new(Rect::ZERO),
            hidden: Cell::new(false),
            alpha: Cell::new(1.0),
            tool_tip: RefCell::new(None),
            display_count: Cell::new(0),
            posts_frame_changes: Cell::new(false),
        }
    }

    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.base.id()
    }

    #[must_use]
    pub fn journal(&self) -> &Journal {
        self.base.journal()
    }

    /// Fixed at construction.
    #[must_use]
    pub fn is_layer_backed(&self) -> bool {
        self.layer_backed
    }

    #[must_use]
    pub fn frame(&self) -> Rect {
        self.frame.get()
    }

    pub fn set_frame(&self, frame: Rect) {
        self.frame.set(frame);
        self.journal().record("frame", frame);
        if self.posts_frame_changes.get() {
            NotificationCenter::default_center().post(FRAME_DID_CHANGE, self.id());
        }
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.hidden.get()
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.hidden.set(hidden);
        self.journal().record("hidden", hidden);
    }

    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha.get()
    }

    /// Clamped to `0.0..=1.0`.
    pub fn set_alpha(&self, alpha: f64) {
        let alpha = alpha.clamp(0.0, 1.0);
        self.alpha.set(alpha);
        self.journal().record("alpha", alpha);
    }

    #[must_use]
    pub fn tool_tip(&self) -> Option<String> {
        self.tool_tip.borrow().clone()
    }

    pub fn set_tool_tip(&self, tool_tip: Option<String>) {
        self.journal()
            .record("toolTip", tool_tip.as_deref().unwrap_or("<none>"));
        *self.tool_tip.borrow_mut() = tool_tip;
    }

    /// Mark the view for redisplay.
    pub fn display(&self) {
        self.display_count.set(self.display_count.get() + 1);
    }

    #[must_use]
    pub fn display_count(&self) -> u32 {
        self.display_count.get()
    }

    #[must_use]
    pub fn posts_frame_changes(&self) -> bool {
        self.posts_frame_changes.get()
    }

    pub fn set_posts_frame_changes(&self, posts: bool) {
        self.posts_frame_changes.set(posts);
    }
}

impl Default for NativeView {
    fn default() -> Self {
        Self::new(ViewParameters::default())
    }
}

impl NativeObject for NativeView {
    fn associated_objects(&self) -> &AssociatedObjects {
        self.base.associated()
    }
}

impl fmt::Debug for NativeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeView")
            .field("id", &self.id())
            .field("frame", &self.frame.get())
            .field("hidden", &self.hidden.get())
            .finish_non_exhaustive()
    }
}

/// Any native object that is a view.
pub trait ViewInstance: NativeObject {
    fn view(&self) -> &NativeView;
}

impl ViewInstance for NativeView {
    fn view(&self) -> &NativeView {
        self
    }
}

/// Bindings of the view level.
pub enum ViewBinding {
    Inherited(BaseBinding),
    /// Construction only.
    LayerBacked(Constant<bool>),
    Frame(Dynamic<Rect>),
    IsHidden(Dynamic<bool>),
    AlphaValue(Dynamic<f64>),
    ToolTip(Dynamic<Option<String>>),
    /// Each event marks the view for redisplay.
    Redisplay(SignalIn<()>),
    /// Emits the new frame after every change.
    FrameDidChange(SignalOut<Rect>),
}

impl ViewBinding {
    pub fn layer_backed(value: bool) -> Self {
        Self::LayerBacked(Constant::new(value))
    }

    pub fn frame(value: impl Into<Dynamic<Rect>>) -> Self {
        Self::Frame(value.into())
    }

    pub fn is_hidden(value: impl Into<Dynamic<bool>>) -> Self {
        Self::IsHidden(value.into())
    }

    pub fn alpha_value(value: impl Into<Dynamic<f64>>) -> Self {
        Self::AlphaValue(value.into())
    }

    pub fn tool_tip(value: impl Into<Dynamic<Option<String>>>) -> Self {
        Self::ToolTip(value.into())
    }

    pub fn redisplay(events: impl Into<SignalIn<()>>) -> Self {
        Self::Redisplay(events.into())
    }

    pub fn frame_did_change(sink: impl Into<SignalOut<Rect>>) -> Self {
        Self::FrameDidChange(sink.into())
    }
}

impl Binding for ViewBinding {
    fn name(&self) -> BindingName {
        let case = match self {
            Self::Inherited(inherited) => return inherited.name(),
            Self::LayerBacked(_) => "layerBacked",
            Self::Frame(_) => "frame",
            Self::IsHidden(_) => "isHidden",
            Self::AlphaValue(_) => "alphaValue",
            Self::ToolTip(_) => "toolTip",
            Self::Redisplay(_) => "redisplay",
            Self::FrameDidChange(_) => "frameDidChange",
        };
        BindingName::new("View", case)
    }
}

inherit_bindings!(ViewBinding => BaseBinding);

/// Preparer of the view level.
#[derive(Default)]
pub struct ViewPreparer {
    inherited: BasePreparer,
    parameters: ViewParameters,
    posts_frame_changes: bool,
}

impl PrepareBinding for ViewPreparer {
    type Binding = ViewBinding;

    fn prepare_binding(&mut self, binding: &ViewBinding) {
        match binding {
            ViewBinding::Inherited(inherited) => self.inherited.prepare_binding(inherited),
            ViewBinding::LayerBacked(value) => self.parameters.layer_backed = *value.value(),
            ViewBinding::FrameDidChange(_) => self.posts_frame_changes = true,
            _ => {}
        }
    }
}

impl<I: ViewInstance, S: BinderStorage> ApplyBinding<I, S> for ViewPreparer {
    fn prepare_instance(&mut self, instance: &Rc<I>, storage: &Rc<S>) {
        self.inherited.prepare_instance(instance, storage);
        if self.posts_frame_changes {
            instance.view().set_posts_frame_changes(true);
        }
    }

    fn apply_binding(
        &mut self,
        binding: ViewBinding,
        instance: &Rc<I>,
        storage: &Rc<S>,
    ) -> Option<Lifetime> {
        match binding {
            ViewBinding::Inherited(inherited) => {
                self.inherited.apply_binding(inherited, instance, storage)
            }
            ViewBinding::LayerBacked(_) => None,
            ViewBinding::Frame(value) => {
                value.apply(instance, storage, |i, _, frame| i.view().set_frame(frame))
            }
            ViewBinding::IsHidden(value) => {
                value.apply(instance, storage, |i, _, hidden| i.view().set_hidden(hidden))
            }
            ViewBinding::AlphaValue(value) => {
                value.apply(instance, storage, |i, _, alpha| i.view().set_alpha(alpha))
            }
            ViewBinding::ToolTip(value) => {
                value.apply(instance, storage, |i, _, tip| i.view().set_tool_tip(tip))
            }
            ViewBinding::Redisplay(events) => {
                events.apply(instance, storage, |i, _, ()| i.view().display())
            }
            ViewBinding::FrameDidChange(sink) => sink.apply(instance, storage, |instance, _, input| {
                let weak = Rc::downgrade(instance);
                let observer = NotificationCenter::default_center().observe(
                    FRAME_DID_CHANGE,
                    Some(instance.view().id()),
                    move |_| {
                        if let Some(instance) = weak.upgrade() {
                            input.send(instance.view().frame());
                        }
                    },
                );
                Lifetime::new(observer)
            }),
        }
    }

    fn finalize_instance(&mut self, instance: &Rc<I>, storage: &Rc<S>) -> Option<Lifetime> {
        self.inherited.finalize_instance(instance, storage)
    }
}

impl Preparer for ViewPreparer {
    const NAME: &'static str = "View";

    type Instance = NativeView;
    type Storage = ObjectStorage;
    type Parameters = ViewParameters;

    fn construct_storage(&mut self) -> Rc<ObjectStorage> {
        Rc::new(ObjectStorage::default())
    }

    fn take_parameters(&mut self) -> ViewParameters {
        std::mem::take(&mut self.parameters)
    }

    fn construct_instance(parameters: ViewParameters) -> Rc<NativeView> {
        Rc::new(NativeView::new(parameters))
    }
}

/// Binder for plain views.
pub type View = Binder<ViewPreparer>;
