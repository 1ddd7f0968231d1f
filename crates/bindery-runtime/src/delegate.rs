#![forbid(unsafe_code)]

//! Runtime-multiplexed delegates.
//!
//! A native object has one delegate slot and probes it before every callback
//! ("does the delegate respond to X?"). [`DynamicDelegate`] answers that
//! probe from a capability table filled during the prepare phase, so only
//! the callbacks whose binding case was present are ever forwarded.
//!
//! # Invariants
//!
//! 1. `responds_to(sel)` is true iff `sel` was registered.
//! 2. An unregistered selector is never forwarded: [`invoke`] returns `None`.
//! 3. A registered selector whose slot was never filled panics on its first
//!    invocation ([`ContractViolation::UnsetHandler`]).
//! 4. Only selectors declared by the [`DelegateProtocol`] can be registered,
//!    and only registered selectors can have their slot filled later.
//! 5. A [`DelegateSlot`] accepts exactly one delegate for its whole life.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use ahash::AHashMap;
use bindery_core::ContractViolation;

/// Identity of one delegate callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector(&'static str);

impl Selector {
    /// Create a selector from its callback name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The callback name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// The set of callbacks a delegate type may multiplex.
pub trait DelegateProtocol: 'static {
    /// Protocol name used in diagnostics.
    const NAME: &'static str;
    /// Every selector the protocol declares.
    const SELECTORS: &'static [Selector];

    /// Whether `selector` belongs to this protocol.
    fn declares(selector: Selector) -> bool {
        Self::SELECTORS.contains(&selector)
    }
}

/// Protocol of objects that never need a delegate.
#[derive(Debug)]
pub enum NoDelegate {}

impl DelegateProtocol for NoDelegate {
    const NAME: &'static str = "NoDelegate";
    const SELECTORS: &'static [Selector] = &[];
}

/// Object-safe view of a delegate, as seen by the native side.
pub trait Delegate: 'static {
    /// Capability probe.
    fn responds_to(&self, selector: Selector) -> bool;

    /// The type-erased handler for `selector`, or `None` if not registered.
    fn handler(&self, selector: Selector) -> Option<Rc<dyn Any>>;
}

struct Handler<A, R>(Box<dyn Fn(A) -> R>);

/// Probe `delegate` for `selector` and forward `arguments` if it responds.
///
/// # Panics
///
/// When the selector is registered but unset, or its handler was registered
/// with different argument or return types.
pub fn invoke<A: 'static, R: 'static>(
    delegate: &dyn Delegate,
    selector: Selector,
    arguments: A,
) -> Option<R> {
    if !delegate.responds_to(selector) {
        return None;
    }
    let erased = delegate.handler(selector)?;
    match erased.downcast::<Handler<A, R>>() {
        Ok(handler) => Some((handler.0)(arguments)),
        Err(_) => ContractViolation::HandlerSignature {
            selector: selector.name(),
        }
        .raise(),
    }
}

enum Slot {
    Unset,
    Set(Rc<dyn Any>),
}

/// A delegate whose capabilities are whatever was registered.
pub struct DynamicDelegate<P: DelegateProtocol> {
    slots: RefCell<AHashMap<Selector, Slot>>,
    _protocol: PhantomData<fn() -> P>,
}

impl<P: DelegateProtocol> Default for DynamicDelegate<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: DelegateProtocol> DynamicDelegate<P> {
    /// An empty delegate that responds to nothing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: RefCell::new(AHashMap::new()),
            _protocol: PhantomData,
        }
    }

    fn check(selector: Selector) {
        if !P::declares(selector) {
            ContractViolation::UnsupportedSelector {
                protocol: P::NAME,
                selector: selector.name(),
            }
            .raise();
        }
    }

    /// Claim `selector`; its handler is supplied later with
    /// [`add_handler`](Self::add_handler).
    pub fn add_selector(&self, selector: Selector) {
        Self::check(selector);
        self.slots
            .borrow_mut()
            .entry(selector)
            .or_insert(Slot::Unset);
    }

    /// Claim `selector` and store its handler, replacing an unset slot.
    pub fn add_handler<A: 'static, R: 'static>(
        &self,
        selector: Selector,
        handler: impl Fn(A) -> R + 'static,
    ) {
        Self::check(selector);
        let erased: Rc<dyn Any> = Rc::new(Handler::<A, R>(Box::new(handler)));
        self.slots.borrow_mut().insert(selector, Slot::Set(erased));
    }

    /// Fill the slot of a selector registered earlier with
    /// [`add_selector`](Self::add_selector).
    ///
    /// # Panics
    ///
    /// If `selector` was never registered.
    pub fn set_handler<A: 'static, R: 'static>(
        &self,
        selector: Selector,
        handler: impl Fn(A) -> R + 'static,
    ) {
        if !self.responds_to(selector) {
            ContractViolation::UnregisteredSelector {
                protocol: P::NAME,
                selector: selector.name(),
            }
            .raise();
        }
        self.add_handler(selector, handler);
    }

    /// Whether `selector` was registered.
    #[must_use]
    pub fn responds_to(&self, selector: Selector) -> bool {
        self.slots.borrow().contains_key(&selector)
    }

    /// Registered selectors, sorted by name.
    #[must_use]
    pub fn selectors(&self) -> Vec<Selector> {
        let mut selectors: Vec<Selector> = self.slots.borrow().keys().copied().collect();
        selectors.sort();
        selectors
    }

    /// Number of registered selectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Whether nothing was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }
}

impl<P: DelegateProtocol> Delegate for DynamicDelegate<P> {
    fn responds_to(&self, selector: Selector) -> bool {
        DynamicDelegate::responds_to(self, selector)
    }

    fn handler(&self, selector: Selector) -> Option<Rc<dyn Any>> {
        match self.slots.borrow().get(&selector)? {
            Slot::Set(handler) => Some(Rc::clone(handler)),
            Slot::Unset => ContractViolation::UnsetHandler {
                protocol: P::NAME,
                selector: selector.name(),
            }
            .raise(),
        }
    }
}

impl<P: DelegateProtocol> fmt::Debug for DynamicDelegate<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicDelegate")
            .field("protocol", &P::NAME)
            .field("selectors", &self.selectors())
            .finish()
    }
}

/// A native object's single delegate slot.
#[derive(Default)]
pub struct DelegateSlot {
    delegate: RefCell<Option<Rc<dyn Delegate>>>,
}

impl DelegateSlot {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the delegate.
    ///
    /// # Panics
    ///
    /// If a delegate is already installed.
    #[track_caller]
    pub fn install(&self, owner: &'static str, delegate: Rc<dyn Delegate>) {
        self.ensure_vacant(owner);
        *self.delegate.borrow_mut() = Some(delegate);
    }

    /// Raise the violation [`install`](Self::install) would, without
    /// installing anything.
    ///
    /// # Panics
    ///
    /// If a delegate is already installed.
    #[track_caller]
    pub fn ensure_vacant(&self, owner: &'static str) {
        if self.is_occupied() {
            ContractViolation::ConflictingDelegate { owner }.raise();
        }
    }

    /// Whether a delegate is installed.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.delegate.borrow().is_some()
    }

    /// The installed delegate.
    #[must_use]
    pub fn delegate(&self) -> Option<Rc<dyn Delegate>> {
        self.delegate.borrow().clone()
    }

    /// Probe the installed delegate.
    #[must_use]
    pub fn responds_to(&self, selector: Selector) -> bool {
        self.delegate()
            .is_some_and(|delegate| delegate.responds_to(selector))
    }

    /// Native-side dispatch: probe, then forward.
    pub fn send<A: 'static, R: 'static>(&self, selector: Selector, arguments: A) -> Option<R> {
        // Clone out of the slot so the handler may inspect the slot itself.
        let delegate = self.delegate()?;
        invoke(&*delegate, selector, arguments)
    }
}

impl fmt::Debug for DelegateSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateSlot")
            .field("occupied", &self.is_occupied())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const SHOULD_CLOSE: Selector = Selector::new("shouldClose");
    const DID_MOVE: Selector = Selector::new("didMove");
    const UNDECLARED: Selector = Selector::new("somethingElse");

    enum TestProtocol {}

    impl DelegateProtocol for TestProtocol {
        const NAME: &'static str = "TestDelegate";
        const SELECTORS: &'static [Selector] = &[SHOULD_CLOSE, DID_MOVE];
    }

    #[test]
    fn unregistered_selector_is_not_forwarded() {
        let delegate = DynamicDelegate::<TestProtocol>::new();
        assert!(!delegate.responds_to(SHOULD_CLOSE));
        assert_eq!(invoke::<(), bool>(&delegate, SHOULD_CLOSE, ()), None);
    }

    #[test]
    fn registered_handler_is_invoked() {
        let delegate = DynamicDelegate::<TestProtocol>::new();
        delegate.add_handler(SHOULD_CLOSE, |()| false);
        assert!(delegate.responds_to(SHOULD_CLOSE));
        assert!(!delegate.responds_to(DID_MOVE));
        assert_eq!(invoke::<(), bool>(&delegate, SHOULD_CLOSE, ()), Some(false));
    }

    #[test]
    fn handler_fills_unset_slot() {
        let delegate = DynamicDelegate::<TestProtocol>::new();
        delegate.add_selector(DID_MOVE);
        let moved = Rc::new(Cell::new((0, 0)));
        let m = Rc::clone(&moved);
        delegate.add_handler(DID_MOVE, move |pos: (i32, i32)| m.set(pos));
        invoke::<(i32, i32), ()>(&delegate, DID_MOVE, (3, 4));
        assert_eq!(moved.get(), (3, 4));
    }

    #[test]
    fn set_handler_fills_registered_slot() {
        let delegate = DynamicDelegate::<TestProtocol>::new();
        delegate.add_selector(SHOULD_CLOSE);
        delegate.set_handler(SHOULD_CLOSE, |()| true);
        assert_eq!(invoke::<(), bool>(&delegate, SHOULD_CLOSE, ()), Some(true));
    }

    #[test]
    #[should_panic(expected = "unregistered selector: TestDelegate.didMove")]
    fn set_handler_requires_registration() {
        let delegate = DynamicDelegate::<TestProtocol>::new();
        delegate.set_handler(DID_MOVE, |_: (i32, i32)| ());
    }

    #[test]
    fn add_selector_keeps_existing_handler() {
        let delegate = DynamicDelegate::<TestProtocol>::new();
        delegate.add_handler(SHOULD_CLOSE, |()| true);
        delegate.add_selector(SHOULD_CLOSE);
        assert_eq!(invoke::<(), bool>(&delegate, SHOULD_CLOSE, ()), Some(true));
    }

    #[test]
    #[should_panic(expected = "unset handler: TestDelegate.didMove")]
    fn unset_slot_panics_on_invocation() {
        let delegate = DynamicDelegate::<TestProtocol>::new();
        delegate.add_selector(DID_MOVE);
        invoke::<(i32, i32), ()>(&delegate, DID_MOVE, (0, 0));
    }

    #[test]
    #[should_panic(expected = "unsupported selector")]
    fn undeclared_selector_is_rejected() {
        let delegate = DynamicDelegate::<TestProtocol>::new();
        delegate.add_selector(UNDECLARED);
    }

    #[test]
    #[should_panic(expected = "handler signature mismatch")]
    fn signature_mismatch_panics() {
        let delegate = DynamicDelegate::<TestProtocol>::new();
        delegate.add_handler(SHOULD_CLOSE, |()| true);
        invoke::<u8, bool>(&delegate, SHOULD_CLOSE, 1);
    }

    #[test]
    fn selectors_are_sorted() {
        let delegate = DynamicDelegate::<TestProtocol>::new();
        delegate.add_selector(SHOULD_CLOSE);
        delegate.add_selector(DID_MOVE);
        assert_eq!(delegate.selectors(), vec![DID_MOVE, SHOULD_CLOSE]);
        assert_eq!(delegate.len(), 2);
    }

    #[test]
    fn slot_forwards_to_installed_delegate() {
        let slot = DelegateSlot::new();
        assert_eq!(slot.send::<(), bool>(SHOULD_CLOSE, ()), None);

        let delegate = DynamicDelegate::<TestProtocol>::new();
        delegate.add_handler(SHOULD_CLOSE, |()| false);
        slot.install("Test", Rc::new(delegate));
        assert!(slot.responds_to(SHOULD_CLOSE));
        assert_eq!(slot.send::<(), bool>(SHOULD_CLOSE, ()), Some(false));
        assert_eq!(slot.send::<(i32, i32), ()>(DID_MOVE, (1, 1)), None);
    }

    #[test]
    #[should_panic(expected = "conflicting delegate: Test")]
    fn ensure_vacant_rejects_occupied_slot() {
        let slot = DelegateSlot::new();
        slot.ensure_vacant("Test");
        slot.install("Test", Rc::new(DynamicDelegate::<TestProtocol>::new()));
        slot.ensure_vacant("Test");
    }

    #[test]
    #[should_panic(expected = "conflicting delegate: Test")]
    fn second_install_panics() {
        let slot = DelegateSlot::new();
        slot.install("Test", Rc::new(DynamicDelegate::<TestProtocol>::new()));
        slot.install("Test", Rc::new(DynamicDelegate::<TestProtocol>::new()));
    }
}
