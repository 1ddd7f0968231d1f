#![forbid(unsafe_code)]

//! Windows and their delegate-backed binding level.
//!
//! Windows are the level that needs a delegate: closing, resizing and key
//! changes are asked of / reported to the window's single delegate. The
//! preparer collects those selectors into a [`DynamicDelegate`] while
//! preparing, and the binder's storage is installed as the delegate only if
//! one of them was requested.
//!
//! # Invariants
//!
//! - Visibility is applied after content size and origin, whatever the
//!   list position of `IsVisible`.
//! - After the bindings are cancelled, delegate handlers fall back to the
//!   toolkit defaults (close allowed, proposed size kept, nothing emitted).
//! - Every `DidResize` and `DidBecomeKey` sink in the list receives each
//!   event. `ShouldClose` and `WillResize` answer with a value, so the last
//!   one in the list wins.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bindery_core::{Constant, Dynamic, Initial, Lifetime, Signal, SignalIn, SignalOut, channel};
use bindery_runtime::{
    ApplyBinding, AssociatedObjects, BaseBinding, BasePreparer, Binder, BinderStorage, Binding,
    BindingName, DelegateProtocol, DelegateSlot, DynamicDelegate, NativeObject, ObjectStorage,
    PrepareBinding, Preparer, Selector, inherit_bindings,
};

use crate::geometry::{Point, Size};
use crate::native::{Journal, ObjectBase, ObjectId};

bitflags::bitflags! {
    /// Window chrome, fixed at construction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WindowStyle: u8 {
        const TITLED = 1 << 0;
        const CLOSABLE = 1 << 1;
        const MINIATURIZABLE = 1 << 2;
        const RESIZABLE = 1 << 3;
    }
}

impl Default for WindowStyle {
    fn default() -> Self {
        Self::TITLED | Self::CLOSABLE | Self::RESIZABLE
    }
}

/// Asked before closing; `false` vetoes.
pub const SHOULD_CLOSE: Selector = Selector::new("windowShouldClose");
/// Asked during a live resize; returns the size to use.
pub const WILL_RESIZE: Selector = Selector::new("windowWillResize");
pub const DID_RESIZE: Selector = Selector::new("windowDidResize");
pub const DID_BECOME_KEY: Selector = Selector::new("windowDidBecomeKey");

/// The window delegate protocol.
#[derive(Debug)]
pub enum WindowDelegate {}

impl DelegateProtocol for WindowDelegate {
    const NAME: &'static str = "WindowDelegate";
    const SELECTORS: &'static [Selector] = &[SHOULD_CLOSE, WILL_RESIZE, DID_RESIZE, DID_BECOME_KEY];
}

/// Construction-time window parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowParameters {
    pub style: WindowStyle,
}

pub struct NativeWindow {
    base: ObjectBase,
    style: WindowStyle,
    title: RefCell<String>,
    content_size: Cell<Size>,
    origin: Cell<Point>,
    visible: Cell<bool>,
    key: Cell<bool>,
    delegate: DelegateSlot,
}

impl NativeWindow {
    #[must_use]
    pub fn new(parameters: WindowParameters) -> Self {
        Self {
            base: ObjectBase::new(),
            style: parameters.style,
            title: RefCell::new(String::new()),
            content_size: Cell::new(Size::new(480.0, 270.0)),
            origin: Cell::new(Point::ZERO),
            visible: Cell::new(false),
            key: Cell::new(false),
            delegate: DelegateSlot::new(),
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

    #[must_use]
    pub fn style(&self) -> WindowStyle {
        self.style
    }

    #[must_use]
    pub fn delegate_slot(&self) -> &DelegateSlot {
        &self.delegate
    }

    #[must_use]
    pub fn title(&self) -> String {
        self.title.borrow().clone()
    }

    pub fn set_title(&self, title: String) {
        self.journal().record("title", &title);
        *self.title.borrow_mut() = title;
    }

    #[must_use]
    pub fn content_size(&self) -> Size {
        self.content_size.get()
    }

    pub fn set_content_size(&self, size: Size) {
        self.content_size.set(size);
        self.journal().record("contentSize", size);
    }

    #[must_use]
    pub fn origin(&self) -> Point {
        self.origin.get()
    }

    pub fn set_origin(&self, origin: Point) {
        self.origin.set(origin);
        self.journal().record("origin", origin);
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible.get()
    }

    /// Show the window.
    pub fn order_front(&self) {
        self.visible.set(true);
        self.journal().record("visible", true);
    }

    /// Hide the window without asking the delegate.
    pub fn order_out(&self) {
        self.visible.set(false);
        self.journal().record("visible", false);
    }

    pub fn set_visible(&self, visible: bool) {
        if visible {
            self.order_front();
        } else {
            self.order_out();
        }
    }

    #[must_use]
    pub fn is_key(&self) -> bool {
        self.key.get()
    }

    /// Make this the key window and tell the delegate.
    pub fn make_key(&self) {
        if self.key.replace(true) {
            return;
        }
        self.journal().record("key", true);
        self.delegate.send::<(), ()>(DID_BECOME_KEY, ());
    }

    /// Simulate the close button. Returns whether the window closed.
    pub fn perform_close(&self) -> bool {
        if !self.style.contains(WindowStyle::CLOSABLE) {
            return false;
        }
        if self.delegate.send::<(), bool>(SHOULD_CLOSE, ()) == Some(false) {
            #[cfg(feature = "tracing")]
            tracing::debug!(window = %self.id(), "close vetoed by delegate");
            return false;
        }
        self.close();
        true
    }

    /// Close unconditionally.
    pub fn close(&self) {
        self.key.set(false);
        self.order_out();
    }

    /// Simulate a user resize to `proposed`. Returns the size applied.
    pub fn user_resize(&self, proposed: Size) -> Size {
        if !self.style.contains(WindowStyle::RESIZABLE) {
            return self.content_size();
        }
        let size = self
            .delegate
            .send::<Size, Size>(WILL_RESIZE, proposed)
            .unwrap_or(proposed);
        #[cfg(feature = "tracing")]
        tracing::trace!(window = %self.id(), %proposed, %size, "user resize");
        self.set_content_size(size);
        self.delegate.send::<Size, ()>(DID_RESIZE, size);
        size
    }
}

impl Default for NativeWindow {
    fn default() -> Self {
        Self::new(WindowParameters::default())
    }
}

impl NativeObject for NativeWindow {
    fn associated_objects(&self) -> &AssociatedObjects {
        self.base.associated()
    }
}

impl fmt::Debug for NativeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeWindow")
            .field("id", &self.id())
            .field("style", &self.style)
            .field("title", &*self.title.borrow())
            .field("visible", &self.visible.get())
            .field("delegate", &self.delegate)
            .finish_non_exhaustive()
    }
}

/// Bindings of the window level.
pub enum WindowBinding {
    Inherited(BaseBinding),
    /// Construction only.
    StyleMask(Constant<WindowStyle>),
    Title(Dynamic<String>),
    ContentSize(Dynamic<Size>),
    FrameOrigin(Dynamic<Point>),
    /// Applied after size and origin.
    IsVisible(Dynamic<bool>),
    /// Each event closes the window.
    Close(SignalIn<()>),
    ShouldClose(Rc<dyn Fn() -> bool>),
    WillResize(Rc<dyn Fn(Size) -> Size>),
    DidResize(SignalOut<Size>),
    DidBecomeKey(SignalOut<()>),
}

impl WindowBinding {
    pub fn style_mask(style: WindowStyle) -> Self {
        Self::StyleMask(Constant::new(style))
    }

    pub fn title(value: impl Into<Dynamic<String>>) -> Self {
        Self::Title(value.into())
    }

    pub fn content_size(value: impl Into<Dynamic<Size>>) -> Self {
        Self::ContentSize(value.into())
    }

    pub fn frame_origin(value: impl Into<Dynamic<Point>>) -> Self {
        Self::FrameOrigin(value.into())
    }

    pub fn is_visible(value: impl Into<Dynamic<bool>>) -> Self {
        Self::IsVisible(value.into())
    }

    pub fn close(events: impl Into<SignalIn<()>>) -> Self {
        Self::Close(events.into())
    }

    pub fn should_close(f: impl Fn() -> bool + 'static) -> Self {
        Self::ShouldClose(Rc::new(f))
    }

    pub fn will_resize(f: impl Fn(Size) -> Size + 'static) -> Self {
        Self::WillResize(Rc::new(f))
    }

    pub fn did_resize(sink: impl Into<SignalOut<Size>>) -> Self {
        Self::DidResize(sink.into())
    }

    pub fn did_become_key(sink: impl Into<SignalOut<()>>) -> Self {
        Self::DidBecomeKey(sink.into())
    }
}

impl Binding for WindowBinding {
    fn name(&self) -> BindingName {
        let case = match self {
            Self::Inherited(inherited) => return inherited.name(),
            Self::StyleMask(_) => "styleMask",
            Self::Title(_) => "title",
            Self::ContentSize(_) => "contentSize",
            Self::FrameOrigin(_) => "frameOrigin",
            Self::IsVisible(_) => "isVisible",
            Self::Close(_) => "close",
            Self::ShouldClose(_) => "shouldClose",
            Self::WillResize(_) => "willResize",
            Self::DidResize(_) => "didResize",
            Self::DidBecomeKey(_) => "didBecomeKey",
        };
        BindingName::new("Window", case)
    }
}

inherit_bindings!(WindowBinding => BaseBinding);

/// Visibility values held back until the window is laid out.
#[derive(Default)]
struct DeferredVisibility {
    ready: Cell<bool>,
    pending: Cell<Option<bool>>,
}

/// Storage of a bound window: its delegate plus binding lifetimes.
pub type WindowStorage = ObjectStorage<WindowDelegate>;

/// Preparer of the window level.
#[derive(Default)]
pub struct WindowPreparer {
    inherited: BasePreparer,
    parameters: WindowParameters,
    delegate: Option<DynamicDelegate<WindowDelegate>>,
    /// Cleared on cancel; delegate handlers check it.
    live: Rc<Cell<bool>>,
    visibility: Option<Rc<DeferredVisibility>>,
    /// Shared by every `DidBecomeKey` sink.
    became_key: Option<Signal<()>>,
    /// Shared by every `DidResize` sink; created in the apply phase.
    resized: Option<Signal<Size>>,
}

impl WindowPreparer {
    /// The delegate under construction, created on first use.
    fn delegate(&mut self) -> &DynamicDelegate<WindowDelegate> {
        self.delegate.get_or_insert_with(DynamicDelegate::new)
    }
}

impl PrepareBinding for WindowPreparer {
    type Binding = WindowBinding;

    fn prepare_binding(&mut self, binding: &WindowBinding) {
        let live = Rc::clone(&self.live);
        match binding {
            WindowBinding::Inherited(inherited) => self.inherited.prepare_binding(inherited),
            WindowBinding::StyleMask(style) => self.parameters.style = *style.value(),
            WindowBinding::ShouldClose(f) => {
                let f = Rc::clone(f);
                self.delegate()
                    .add_handler(SHOULD_CLOSE, move |()| !live.get() || f());
            }
            WindowBinding::WillResize(f) => {
                let f = Rc::clone(f);
                self.delegate().add_handler(WILL_RESIZE, move |proposed: Size| {
                    if live.get() { f(proposed) } else { proposed }
                });
            }
            // The sink is connected once the window exists.
            WindowBinding::DidResize(_) => self.delegate().add_selector(DID_RESIZE),
            WindowBinding::DidBecomeKey(_) => {
                if self.became_key.is_none() {
                    let (input, became_key) = channel::<()>();
                    self.delegate().add_handler(DID_BECOME_KEY, move |()| {
                        if live.get() {
                            input.send(());
                        }
                    });
                    self.became_key = Some(became_key);
                }
            }
            WindowBinding::IsVisible(_) => {
                self.visibility.get_or_insert_with(Rc::default);
            }
            WindowBinding::Title(_)
            | WindowBinding::ContentSize(_)
            | WindowBinding::FrameOrigin(_)
            | WindowBinding::Close(_) => {}
        }
    }
}

impl ApplyBinding<NativeWindow, WindowStorage> for WindowPreparer {
    fn check_instance(&self, instance: &Rc<NativeWindow>, storage: &Rc<WindowStorage>) {
        if storage.in_use() {
            instance.delegate_slot().ensure_vacant(Self::NAME);
        }
        self.inherited.check_instance(instance, storage);
    }

    fn prepare_instance(&mut self, instance: &Rc<NativeWindow>, storage: &Rc<WindowStorage>) {
        if storage.in_use() {
            instance
                .delegate_slot()
                .install(Self::NAME, Rc::clone(storage) as _);
        }
        self.live.set(true);
        self.inherited.prepare_instance(instance, storage);
    }

    fn apply_binding(
        &mut self,
        binding: WindowBinding,
        instance: &Rc<NativeWindow>,
        storage: &Rc<WindowStorage>,
    ) -> Option<Lifetime> {
        match binding {
            WindowBinding::Inherited(inherited) => {
                self.inherited.apply_binding(inherited, instance, storage)
            }
            WindowBinding::StyleMask(_)
            | WindowBinding::ShouldClose(_)
            | WindowBinding::WillResize(_) => None,
            WindowBinding::DidBecomeKey(sink) => {
                let became_key = self.became_key.clone()?;
                sink.apply(instance, storage, move |_, _, input| {
                    became_key.observe(move |()| input.send(())).into_lifetime()
                })
            }
            WindowBinding::Title(value) => {
                value.apply(instance, storage, |window, _, title| window.set_title(title))
            }
            WindowBinding::ContentSize(value) => {
                value.apply(instance, storage, |window, _, size| window.set_content_size(size))
            }
            WindowBinding::FrameOrigin(value) => {
                value.apply(instance, storage, |window, _, origin| window.set_origin(origin))
            }
            WindowBinding::IsVisible(value) => {
                let deferred = Rc::clone(self.visibility.get_or_insert_with(Rc::default));
                value.apply_with(instance, storage, Initial::Apply, move |window, _, visible| {
                    if deferred.ready.get() {
                        window.set_visible(visible);
                    } else {
                        deferred.pending.set(Some(visible));
                    }
                })
            }
            WindowBinding::Close(events) => {
                events.apply(instance, storage, |window, _, ()| window.close())
            }
            WindowBinding::DidResize(sink) => {
                if self.resized.is_none() {
                    let delegate = storage.dynamic_delegate()?;
                    let live = Rc::clone(&self.live);
                    let (input, resized) = channel::<Size>();
                    delegate.set_handler(DID_RESIZE, move |size: Size| {
                        if live.get() {
                            input.send(size);
                        }
                    });
                    self.resized = Some(resized);
                }
                let resized = self.resized.clone()?;
                sink.apply(instance, storage, move |_, _, input| {
                    resized.observe(move |size| input.send(size)).into_lifetime()
                })
            }
        }
    }

    fn finalize_instance(
        &mut self,
        instance: &Rc<NativeWindow>,
        storage: &Rc<WindowStorage>,
    ) -> Option<Lifetime> {
        if let Some(deferred) = self.visibility.take() {
            deferred.ready.set(true);
            if let Some(visible) = deferred.pending.take() {
                instance.set_visible(visible);
            }
        }
        let inherited = self.inherited.finalize_instance(instance, storage);
        let quiet = storage.in_use().then(|| {
            let live = Rc::clone(&self.live);
            Lifetime::from_fn(move || live.set(false))
        });
        Lifetime::combine(inherited, quiet)
    }
}

impl Preparer for WindowPreparer {
    const NAME: &'static str = "Window";

    type Instance = NativeWindow;
    type Storage = WindowStorage;
    type Parameters = WindowParameters;

    fn construct_storage(&mut self) -> Rc<WindowStorage> {
        Rc::new(ObjectStorage::new(self.delegate.take()))
    }

    fn take_parameters(&mut self) -> WindowParameters {
        std::mem::take(&mut self.parameters)
    }

    fn construct_instance(parameters: WindowParameters) -> Rc<NativeWindow> {
        Rc::new(NativeWindow::new(parameters))
    }
}

pub type Window = Binder<WindowPreparer>;
