#![forbid(unsafe_code)]

//! The four value shapes a binding case can carry.
//!
//! | Shape | Read in | Effect |
//! |-------|---------|--------|
//! | [`Constant`] | prepare phase | baked into construction |
//! | [`Dynamic`] | apply phase | initial value now, later values as they arrive |
//! | [`SignalIn`] | apply phase | every inbound event, no initial value |
//! | [`SignalOut`] | apply phase | native events pushed into an outbound sink |
//!
//! Apply closures receive the instance and storage by reference. The
//! subscription only holds weak references to both, so a live subscription
//! never keeps a native object alive; values arriving after either is gone
//! are dropped.
//!
//! # Initial values
//!
//! A dynamic value's initial value is resolved at apply time, never during
//! the prepare phase. Signal-sourced dynamic values read the signal's latest
//! value on subscription, so an update between composing the binding list and
//! applying it is not lost.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::ContractViolation;
use crate::lifetime::{Cancellable, Lifetime};
use crate::signal::{Event, Signal, SignalInput};

/// Whether [`Dynamic::apply_with`] delivers the initial value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Initial {
    /// Apply the initial value synchronously (the normal case).
    #[default]
    Apply,
    /// Leave the toolkit default in place; only later values are applied.
    Skip,
}

/// A value fixed at composition time and consumed during construction.
#[derive(Clone, PartialEq, Eq)]
pub struct Constant<T>(T);

impl<T> Constant<T> {
    /// Wrap a value.
    pub const fn new(value: T) -> Self {
        Self(value)
    }

    /// Read the value. Meant for the prepare phase only.
    pub fn value(&self) -> &T {
        &self.0
    }

    /// Take the value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Constant<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl From<&str> for Constant<String> {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl<T: fmt::Debug> fmt::Debug for Constant<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Constant").field(&self.0).finish()
    }
}

enum DynamicSource<T> {
    Fixed(T),
    Stream { initial: T, subsequent: Signal<T> },
    Signal(Signal<T>),
}

/// An initial value plus a stream of later values.
pub struct Dynamic<T> {
    source: DynamicSource<T>,
}

impl<T: Clone + 'static> Dynamic<T> {
    /// A dynamic value that never changes.
    pub fn fixed(value: T) -> Self {
        Self {
            source: DynamicSource::Fixed(value),
        }
    }

    /// An explicit initial value followed by every value of `subsequent`.
    pub fn new(initial: T, subsequent: Signal<T>) -> Self {
        Self {
            source: DynamicSource::Stream {
                initial,
                subsequent,
            },
        }
    }

    /// A signal that must deliver its initial value on subscription, such as
    /// a continuous signal or a [`Variable`](crate::signal::Variable)'s.
    pub fn from_signal(signal: Signal<T>) -> Self {
        Self {
            source: DynamicSource::Signal(signal),
        }
    }

    /// Whether applying this value leaves a subscription behind.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self.source, DynamicSource::Fixed(_))
    }

    /// Apply the initial value, then every later value.
    pub fn apply<I: 'static, S: 'static>(
        self,
        instance: &Rc<I>,
        storage: &Rc<S>,
        f: impl Fn(&I, &S, T) + 'static,
    ) -> Option<Lifetime> {
        self.apply_with(instance, storage, Initial::Apply, f)
    }

    /// Like [`apply`](Self::apply), with control over the initial application.
    pub fn apply_with<I: 'static, S: 'static>(
        self,
        instance: &Rc<I>,
        storage: &Rc<S>,
        initial: Initial,
        f: impl Fn(&I, &S, T) + 'static,
    ) -> Option<Lifetime> {
        match self.source {
            DynamicSource::Fixed(value) => {
                if initial == Initial::Apply {
                    f(instance, storage, value);
                }
                None
            }
            DynamicSource::Stream {
                initial: value,
                subsequent,
            } => {
                if initial == Initial::Apply {
                    f(instance, storage, value);
                }
                // A replay from a continuous `subsequent` would duplicate the
                // explicit initial value; only values sent after subscription count.
                let live = Rc::new(Cell::new(false));
                let gate = Rc::clone(&live);
                let lifetime = subscribe_weak(&subsequent, instance, storage, f, move |_| gate.get());
                live.set(true);
                Some(lifetime)
            }
            DynamicSource::Signal(signal) => {
                let received = Rc::new(Cell::new(false));
                let seen = Rc::clone(&received);
                let lifetime = subscribe_weak(&signal, instance, storage, f, move |_| {
                    let first = !seen.replace(true);
                    !(first && initial == Initial::Skip)
                });
                if !received.get() {
                    ContractViolation::MissingInitialValue {
                        value_type: std::any::type_name::<T>(),
                    }
                    .raise();
                }
                Some(lifetime)
            }
        }
    }
}

impl<T: Clone + 'static> From<T> for Dynamic<T> {
    fn from(value: T) -> Self {
        Self::fixed(value)
    }
}

impl From<&str> for Dynamic<String> {
    fn from(value: &str) -> Self {
        Self::fixed(value.to_owned())
    }
}

impl<T: Clone + 'static> From<Signal<T>> for Dynamic<T> {
    fn from(signal: Signal<T>) -> Self {
        Self::from_signal(signal)
    }
}

impl<T> fmt::Debug for Dynamic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            DynamicSource::Fixed(_) => "fixed",
            DynamicSource::Stream { .. } => "stream",
            DynamicSource::Signal(_) => "signal",
        };
        f.debug_struct("Dynamic").field("source", &kind).finish()
    }
}

/// How many values a [`SignalIn`] consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fire {
    /// Every value until the lifetime ends.
    Continuous,
    /// The first value, then disconnect.
    Once,
}

/// An inbound event stream consumed by the object.
pub struct SignalIn<T> {
    signal: Signal<T>,
    fire: Fire,
}

impl<T: Clone + 'static> SignalIn<T> {
    /// Consume every event.
    pub fn continuous(signal: Signal<T>) -> Self {
        Self {
            signal,
            fire: Fire::Continuous,
        }
    }

    /// Consume the first event only.
    pub fn once(signal: Signal<T>) -> Self {
        Self {
            signal,
            fire: Fire::Once,
        }
    }

    /// Firing mode.
    #[must_use]
    pub fn fire(&self) -> Fire {
        self.fire
    }

    /// Subscribe `f` to inbound events. No value is delivered synchronously
    /// beyond what the signal itself replays.
    pub fn apply<I: 'static, S: 'static>(
        self,
        instance: &Rc<I>,
        storage: &Rc<S>,
        f: impl Fn(&I, &S, T) + 'static,
    ) -> Option<Lifetime> {
        match self.fire {
            Fire::Continuous => Some(subscribe_weak(&self.signal, instance, storage, f, |_| true)),
            Fire::Once => {
                let slot: Rc<RefCell<Option<Lifetime>>> = Rc::default();
                let fired = Rc::new(Cell::new(false));
                let s = Rc::clone(&slot);
                let gate = Rc::clone(&fired);
                let lifetime = subscribe_weak(
                    &self.signal,
                    instance,
                    storage,
                    move |i, st, value| {
                        f(i, st, value);
                        // Disconnect from inside our own dispatch.
                        let own = s.borrow_mut().take();
                        if let Some(mut own) = own {
                            own.cancel();
                        }
                    },
                    move |_| !gate.replace(true),
                );
                if fired.get() {
                    // A replayed value already consumed the single shot.
                    drop(lifetime);
                    return None;
                }
                *slot.borrow_mut() = Some(lifetime);
                Some(Lifetime::new(SlotLifetime(slot)))
            }
        }
    }
}

struct SlotLifetime(Rc<RefCell<Option<Lifetime>>>);

impl Cancellable for SlotLifetime {
    fn cancel(&mut self) {
        let taken = self.0.borrow_mut().take();
        if let Some(mut lifetime) = taken {
            lifetime.cancel();
        }
    }
}

impl<T: Clone + 'static> From<Signal<T>> for SignalIn<T> {
    fn from(signal: Signal<T>) -> Self {
        Self::continuous(signal)
    }
}

impl<T> fmt::Debug for SignalIn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalIn").field("fire", &self.fire).finish()
    }
}

/// An outbound sink the object feeds from toolkit events.
pub struct SignalOut<T> {
    input: SignalInput<T>,
}

impl<T: Clone + 'static> SignalOut<T> {
    /// Feed events into `input`.
    pub fn new(input: SignalInput<T>) -> Self {
        Self { input }
    }

    /// A fresh hot channel: the binding plus the signal to observe.
    pub fn channel() -> (Self, Signal<T>) {
        let (input, signal) = crate::signal::channel();
        (Self { input }, signal)
    }

    /// A clone of the sink, for handlers registered in the prepare phase.
    #[must_use]
    pub fn input(&self) -> SignalInput<T> {
        self.input.clone()
    }

    /// Connect the sink to a native observer.
    ///
    /// `register` receives the instance, the storage and the sink, and
    /// returns the registration's lifetime.
    pub fn apply<I: 'static, S: 'static>(
        self,
        instance: &Rc<I>,
        storage: &Rc<S>,
        register: impl FnOnce(&Rc<I>, &Rc<S>, SignalInput<T>) -> Lifetime,
    ) -> Option<Lifetime> {
        Some(register(instance, storage, self.input))
    }
}

impl<T: Clone + 'static> From<SignalInput<T>> for SignalOut<T> {
    fn from(input: SignalInput<T>) -> Self {
        Self::new(input)
    }
}

impl<T> fmt::Debug for SignalOut<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalOut").finish_non_exhaustive()
    }
}

/// Kind tag of a [`BindingValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Constant,
    Dynamic,
    SignalIn,
    SignalOut,
}

/// Tagged union over the four value shapes.
#[derive(Debug)]
pub enum BindingValue<T> {
    Constant(Constant<T>),
    Dynamic(Dynamic<T>),
    SignalIn(SignalIn<T>),
    SignalOut(SignalOut<T>),
}

impl<T> BindingValue<T> {
    /// The shape of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Constant(_) => ValueKind::Constant,
            Self::Dynamic(_) => ValueKind::Dynamic,
            Self::SignalIn(_) => ValueKind::SignalIn,
            Self::SignalOut(_) => ValueKind::SignalOut,
        }
    }
}

impl<T> From<Constant<T>> for BindingValue<T> {
    fn from(value: Constant<T>) -> Self {
        Self::Constant(value)
    }
}

impl<T> From<Dynamic<T>> for BindingValue<T> {
    fn from(value: Dynamic<T>) -> Self {
        Self::Dynamic(value)
    }
}

impl<T> From<SignalIn<T>> for BindingValue<T> {
    fn from(value: SignalIn<T>) -> Self {
        Self::SignalIn(value)
    }
}

impl<T> From<SignalOut<T>> for BindingValue<T> {
    fn from(value: SignalOut<T>) -> Self {
        Self::SignalOut(value)
    }
}

/// Subscribe `f` through weak references to instance and storage.
///
/// `admit` filters values before `f` sees them. Failures end the
/// subscription and are logged; they never reach `f`.
fn subscribe_weak<T, I, S>(
    signal: &Signal<T>,
    instance: &Rc<I>,
    storage: &Rc<S>,
    f: impl Fn(&I, &S, T) + 'static,
    admit: impl Fn(&T) -> bool + 'static,
) -> Lifetime
where
    T: Clone + 'static,
    I: 'static,
    S: 'static,
{
    let instance: Weak<I> = Rc::downgrade(instance);
    let storage: Weak<S> = Rc::downgrade(storage);
    signal
        .subscribe(move |event| match event {
            Event::Value(value) => {
                if !admit(&value) {
                    return;
                }
                if let (Some(i), Some(s)) = (instance.upgrade(), storage.upgrade()) {
                    f(&i, &s, value);
                }
            }
            Event::Completed => {}
            Event::Failed(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_err, "binding stream failed; subscription ended");
            }
        })
        .into_lifetime()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{Variable, channel, continuous};
    use crate::error::StreamError;

    struct Target {
        log: RefCell<Vec<i32>>,
    }

    fn target() -> (Rc<Target>, Rc<()>) {
        (
            Rc::new(Target {
                log: RefCell::new(Vec::new()),
            }),
            Rc::new(()),
        )
    }

    fn push(t: &Target, _: &(), v: i32) {
        t.log.borrow_mut().push(v);
    }

    #[test]
    fn fixed_dynamic_applies_once_without_lifetime() {
        let (t, s) = target();
        let lifetime = Dynamic::fixed(7).apply(&t, &s, push);
        assert!(lifetime.is_none());
        assert_eq!(*t.log.borrow(), vec![7]);
    }

    #[test]
    fn stream_dynamic_initial_precedes_subsequent() {
        let (input, signal) = channel();
        let (t, s) = target();
        let _lifetime = Dynamic::new(1, signal).apply(&t, &s, push);
        assert_eq!(*t.log.borrow(), vec![1]);
        input.send(2);
        input.send(3);
        assert_eq!(*t.log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn stream_dynamic_ignores_replay_of_continuous_subsequent() {
        let (input, signal) = continuous(Some(5));
        let (t, s) = target();
        let _lifetime = Dynamic::new(1, signal).apply(&t, &s, push);
        input.send(6);
        assert_eq!(*t.log.borrow(), vec![1, 6]);
    }

    #[test]
    fn skip_initial_applies_only_later_values() {
        let (input, signal) = channel();
        let (t, s) = target();
        let _lifetime = Dynamic::new(1, signal).apply_with(&t, &s, Initial::Skip, push);
        assert!(t.log.borrow().is_empty());
        input.send(2);
        assert_eq!(*t.log.borrow(), vec![2]);
    }

    #[test]
    fn variable_dynamic_reads_at_apply_time() {
        let var = Variable::new(1);
        let dynamic = Dynamic::from_signal(var.signal());
        var.set(4);
        let (t, s) = target();
        let _lifetime = dynamic.apply(&t, &s, push);
        var.set(9);
        assert_eq!(*t.log.borrow(), vec![4, 9]);
    }

    #[test]
    fn variable_dynamic_skip_initial() {
        let var = Variable::new(1);
        let (t, s) = target();
        let _lifetime = Dynamic::from_signal(var.signal()).apply_with(&t, &s, Initial::Skip, push);
        var.set(2);
        assert_eq!(*t.log.borrow(), vec![2]);
    }

    #[test]
    #[should_panic(expected = "missing initial value")]
    fn hot_signal_dynamic_without_initial_panics() {
        let (_input, signal) = channel::<i32>();
        let (t, s) = target();
        let _ = Dynamic::from_signal(signal).apply(&t, &s, push);
    }

    #[test]
    #[should_panic(expected = "missing initial value")]
    fn completed_signal_dynamic_without_initial_panics() {
        let (input, signal) = continuous::<i32>(None);
        input.complete();
        let (t, s) = target();
        let _ = Dynamic::from_signal(signal).apply(&t, &s, push);
    }

    #[test]
    fn cancel_stops_updates() {
        let (input, signal) = channel();
        let (t, s) = target();
        let mut lifetime = Dynamic::new(0, signal).apply(&t, &s, push).unwrap();
        input.send(1);
        lifetime.cancel();
        input.send(2);
        assert_eq!(*t.log.borrow(), vec![0, 1]);
    }

    #[test]
    fn failure_ends_only_its_own_subscription() {
        let (bad, bad_signal) = channel();
        let (good, good_signal) = channel();
        let (t, s) = target();
        let _a = Dynamic::new(0, bad_signal).apply(&t, &s, push);
        let _b = Dynamic::new(10, good_signal).apply(&t, &s, push);

        bad.fail(StreamError::new("producer gone"));
        bad.send(1);
        good.send(11);
        assert_eq!(*t.log.borrow(), vec![0, 10, 11]);
    }

    #[test]
    fn values_after_instance_drop_are_ignored() {
        let (input, signal) = channel();
        let (t, s) = target();
        let weak = Rc::downgrade(&t);
        let _lifetime = Dynamic::new(0, signal).apply(&t, &s, push);
        drop(t);
        input.send(1);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn signal_in_has_no_initial() {
        let (input, signal) = continuous::<i32>(None);
        let (t, s) = target();
        let _lifetime = SignalIn::continuous(signal).apply(&t, &s, push);
        assert!(t.log.borrow().is_empty());
        input.send(3);
        input.send(4);
        assert_eq!(*t.log.borrow(), vec![3, 4]);
    }

    #[test]
    fn signal_in_once_disconnects_after_first() {
        let (input, signal) = channel();
        let (t, s) = target();
        let lifetime = SignalIn::once(signal.clone()).apply(&t, &s, push);
        assert!(lifetime.is_some());
        input.send(1);
        input.send(2);
        assert_eq!(*t.log.borrow(), vec![1]);
        assert_eq!(signal.observer_count(), 0);
    }

    #[test]
    fn signal_in_once_consumed_by_replay() {
        let (input, signal) = continuous(Some(8));
        let (t, s) = target();
        let lifetime = SignalIn::once(signal).apply(&t, &s, push);
        assert!(lifetime.is_none());
        input.send(9);
        assert_eq!(*t.log.borrow(), vec![8]);
    }

    #[test]
    fn signal_out_registration_lifetime() {
        let (out, signal) = SignalOut::<i32>::channel();
        let (t, s) = target();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sn = Rc::clone(&seen);
        let _watch = signal.observe(move |v| sn.borrow_mut().push(v));

        let registered = Rc::new(Cell::new(true));
        let r = Rc::clone(&registered);
        let mut lifetime = out
            .apply(&t, &s, move |_, _, input| {
                input.send(42);
                Lifetime::from_fn(move || r.set(false))
            })
            .unwrap();
        assert_eq!(*seen.borrow(), vec![42]);
        lifetime.cancel();
        assert!(!registered.get());
    }

    #[test]
    fn binding_value_kinds() {
        let (_input, signal) = channel::<i32>();
        assert_eq!(BindingValue::from(Constant::new(1)).kind(), ValueKind::Constant);
        assert_eq!(BindingValue::from(Dynamic::fixed(1)).kind(), ValueKind::Dynamic);
        assert_eq!(
            BindingValue::from(SignalIn::continuous(signal)).kind(),
            ValueKind::SignalIn
        );
        assert_eq!(
            BindingValue::from(SignalOut::<i32>::channel().0).kind(),
            ValueKind::SignalOut
        );
    }

    #[test]
    fn conversions() {
        let c: Constant<String> = "hi".into();
        assert_eq!(c.value(), "hi");
        let d: Dynamic<String> = "hi".into();
        assert!(d.is_fixed());
        let var = Variable::new(2u8);
        let d: Dynamic<u8> = var.signal().into();
        assert!(!d.is_fixed());
    }
}
