#![forbid(unsafe_code)]

//! Single-threaded multicast signals.
//!
//! A [`channel`] splits into a write side ([`SignalInput`]) and a read side
//! ([`Signal`]). Both halves are cheap `Rc` clones of the same channel.
//! A [`continuous`] channel additionally remembers its latest value and
//! replays it synchronously to every new subscriber, which is what lets a
//! dynamic binding read its initial value at subscription time.
//!
//! # Architecture
//!
//! Observers live in a `RefCell<Vec<..>>` keyed by a monotonically increasing
//! id. Dispatch clones the observer list first and releases the borrow before
//! invoking any callback, so callbacks may send, subscribe, or cancel
//! (including their own subscription) without a borrow conflict.
//!
//! # Invariants
//!
//! 1. Observers are notified in registration order.
//! 2. A cancelled observer is never invoked again, even mid-dispatch.
//! 3. A terminal event (`Completed` / `Failed`) is delivered at most once per
//!    observer and removes every observer; later sends are ignored.
//! 4. Subscribing to a terminated signal delivers the terminal event
//!    immediately and returns an inert subscription.
//! 5. A continuous signal replays exactly one value (the latest) to a new
//!    subscriber, before any later value.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::StreamError;
use crate::lifetime::{Cancellable, Lifetime};

/// One item delivered to an observer.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<T> {
    /// A new value.
    Value(T),
    /// The producer finished normally.
    Completed,
    /// The producer failed.
    Failed(StreamError),
}

impl<T> Event<T> {
    /// Whether this event ends the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Event::Value(_))
    }
}

type Callback<T> = Rc<dyn Fn(Event<T>)>;

struct Observer<T> {
    id: u64,
    active: Rc<Cell<bool>>,
    callback: Callback<T>,
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            active: Rc::clone(&self.active),
            callback: Rc::clone(&self.callback),
        }
    }
}

#[derive(Clone)]
enum Termination {
    Completed,
    Failed(StreamError),
}

impl Termination {
    fn event<T>(&self) -> Event<T> {
        match self {
            Termination::Completed => Event::Completed,
            Termination::Failed(err) => Event::Failed(err.clone()),
        }
    }
}

struct Channel<T> {
    observers: RefCell<Vec<Observer<T>>>,
    latest: RefCell<Option<T>>,
    continuous: bool,
    terminated: RefCell<Option<Termination>>,
    next_id: Cell<u64>,
}

impl<T: Clone + 'static> Channel<T> {
    fn new(continuous: bool, initial: Option<T>) -> Rc<Self> {
        Rc::new(Self {
            observers: RefCell::new(Vec::new()),
            latest: RefCell::new(initial),
            continuous,
            terminated: RefCell::new(None),
            next_id: Cell::new(0),
        })
    }

    fn snapshot(&self) -> Vec<Observer<T>> {
        self.observers.borrow().clone()
    }

    fn remove(&self, id: u64) {
        self.observers.borrow_mut().retain(|o| o.id != id);
    }

    fn send(&self, value: T) {
        if self.terminated.borrow().is_some() {
            return;
        }
        if self.continuous {
            *self.latest.borrow_mut() = Some(value.clone());
        }
        for observer in self.snapshot() {
            if observer.active.get() {
                (observer.callback)(Event::Value(value.clone()));
            }
        }
    }

    fn terminate(&self, termination: Termination) {
        if self.terminated.borrow().is_some() {
            return;
        }
        *self.terminated.borrow_mut() = Some(termination.clone());
        let observers = std::mem::take(&mut *self.observers.borrow_mut());
        for observer in observers {
            if observer.active.replace(false) {
                (observer.callback)(termination.event());
            }
        }
    }
}

/// Create a hot multicast channel.
#[must_use]
pub fn channel<T: Clone + 'static>() -> (SignalInput<T>, Signal<T>) {
    let inner = Channel::new(false, None);
    (
        SignalInput {
            inner: Rc::clone(&inner),
        },
        Signal { inner },
    )
}

/// Create a channel that replays its latest value to new subscribers.
#[must_use]
pub fn continuous<T: Clone + 'static>(initial: Option<T>) -> (SignalInput<T>, Signal<T>) {
    let inner = Channel::new(true, initial);
    (
        SignalInput {
            inner: Rc::clone(&inner),
        },
        Signal { inner },
    )
}

/// Read side of a channel.
pub struct Signal<T> {
    inner: Rc<Channel<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Register an observer for every subsequent event.
    ///
    /// On a continuous signal holding a value, `callback` is invoked with that
    /// value before this method returns.
    pub fn subscribe(&self, callback: impl Fn(Event<T>) + 'static) -> Subscription {
        let termination = self.inner.terminated.borrow().clone();
        if let Some(termination) = termination {
            callback(termination.event());
            return Subscription::inert();
        }

        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        let active = Rc::new(Cell::new(true));
        let observer = Observer {
            id,
            active: Rc::clone(&active),
            callback: Rc::new(callback),
        };
        let callback = Rc::clone(&observer.callback);
        self.inner.observers.borrow_mut().push(observer);

        let subscription = Subscription {
            channel: Some(Rc::downgrade(&self.inner) as Weak<dyn Detach>),
            id,
            active: Rc::clone(&active),
        };

        if self.inner.continuous {
            let latest = self.inner.latest.borrow().clone();
            if let Some(value) = latest
                && active.get()
            {
                callback(Event::Value(value));
            }
        }
        subscription
    }

    /// Register an observer for values only; terminal events are dropped.
    pub fn observe(&self, callback: impl Fn(T) + 'static) -> Subscription {
        self.subscribe(move |event| {
            if let Event::Value(value) = event {
                callback(value);
            }
        })
    }

    /// The latest value of a continuous signal.
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        self.inner.latest.borrow().clone()
    }

    /// Whether this signal replays its latest value.
    #[must_use]
    pub fn is_continuous(&self) -> bool {
        self.inner.continuous
    }

    /// Whether the signal has completed or failed.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.borrow().is_some()
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("continuous", &self.inner.continuous)
            .field("observers", &self.inner.observers.borrow().len())
            .finish()
    }
}

/// Write side of a channel.
pub struct SignalInput<T> {
    inner: Rc<Channel<T>>,
}

impl<T> Clone for SignalInput<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> SignalInput<T> {
    /// Deliver a value to every observer.
    pub fn send(&self, value: T) {
        self.inner.send(value);
    }

    /// End the stream normally.
    pub fn complete(&self) {
        self.inner.terminate(Termination::Completed);
    }

    /// End the stream with an error.
    pub fn fail(&self, error: StreamError) {
        self.inner.terminate(Termination::Failed(error));
    }

    /// The read side of this channel.
    #[must_use]
    pub fn signal(&self) -> Signal<T> {
        Signal {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for SignalInput<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalInput")
            .field("continuous", &self.inner.continuous)
            .finish()
    }
}

trait Detach {
    fn detach(&self, id: u64);
}

impl<T: Clone + 'static> Detach for Channel<T> {
    fn detach(&self, id: u64) {
        self.remove(id);
    }
}

/// RAII guard for one observer registration.
///
/// Dropping or cancelling the subscription removes the observer.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    channel: Option<Weak<dyn Detach>>,
    id: u64,
    active: Rc<Cell<bool>>,
}

impl Subscription {
    fn inert() -> Self {
        Self {
            channel: None,
            id: 0,
            active: Rc::new(Cell::new(false)),
        }
    }

    /// Whether the observer can still receive events.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Remove the observer. Idempotent and safe to call from the observer's
    /// own callback.
    pub fn cancel(&mut self) {
        self.active.set(false);
        if let Some(channel) = self.channel.take().and_then(|weak| weak.upgrade()) {
            channel.detach(self.id);
        }
    }

    /// Convert into an owned [`Lifetime`].
    pub fn into_lifetime(self) -> Lifetime {
        Lifetime::new(self)
    }
}

impl Cancellable for Subscription {
    fn cancel(&mut self) {
        Subscription::cancel(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        Subscription::cancel(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active.get())
            .finish()
    }
}

/// A value holder backed by a continuous channel.
///
/// `Variable` is the usual source for a dynamic binding: its signal replays
/// the current value on subscription, then follows every `set`.
pub struct Variable<T> {
    input: SignalInput<T>,
}

impl<T> Clone for Variable<T> {
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Variable<T> {
    /// Create a variable holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        let (input, _) = continuous(Some(value));
        Self { input }
    }

    /// The current value.
    #[must_use]
    pub fn get(&self) -> T {
        // A continuous channel created with `Some` never loses its value.
        match self.input.inner.latest.borrow().as_ref() {
            Some(value) => value.clone(),
            None => unreachable!("variable channel always holds a value"),
        }
    }

    /// Replace the value. Setting an equal value is a no-op.
    pub fn set(&self, value: T) {
        if self.input.inner.latest.borrow().as_ref() == Some(&value) {
            return;
        }
        self.input.send(value);
    }

    /// Modify the value in place via a closure.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut value = self.get();
        f(&mut value);
        self.set(value);
    }

    /// The signal of this variable.
    #[must_use]
    pub fn signal(&self) -> Signal<T> {
        self.input.signal()
    }
}

impl<T: fmt::Debug> fmt::Debug for Variable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("value", &*self.input.inner.latest.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<Event<T>>>>, impl Fn(Event<T>) + 'static) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        (log, move |event| l.borrow_mut().push(event))
    }

    #[test]
    fn hot_channel_delivers_in_order() {
        let (input, signal) = channel::<i32>();
        let (log, f) = recorder();
        let _sub = signal.subscribe(f);

        input.send(1);
        input.send(2);
        assert_eq!(*log.borrow(), vec![Event::Value(1), Event::Value(2)]);
    }

    #[test]
    fn hot_channel_does_not_replay() {
        let (input, signal) = channel::<i32>();
        input.send(1);
        let (log, f) = recorder();
        let _sub = signal.subscribe(f);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn continuous_replays_latest_once() {
        let (input, signal) = continuous(Some(1));
        input.send(2);
        let (log, f) = recorder();
        let _sub = signal.subscribe(f);
        assert_eq!(*log.borrow(), vec![Event::Value(2)]);

        input.send(3);
        assert_eq!(*log.borrow(), vec![Event::Value(2), Event::Value(3)]);
    }

    #[test]
    fn drop_subscription_stops_delivery() {
        let (input, signal) = channel::<i32>();
        let (log, f) = recorder();
        let sub = signal.subscribe(f);
        input.send(1);
        drop(sub);
        input.send(2);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(signal.observer_count(), 0);
    }

    #[test]
    fn cancel_from_own_callback() {
        let (input, signal) = channel::<i32>();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let seen = Rc::new(Cell::new(0));

        let s = Rc::clone(&slot);
        let n = Rc::clone(&seen);
        let sub = signal.observe(move |_| {
            n.set(n.get() + 1);
            if let Some(mut sub) = s.borrow_mut().take() {
                sub.cancel();
            }
        });
        *slot.borrow_mut() = Some(sub);

        input.send(1);
        input.send(2);
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn cancel_sibling_mid_dispatch_skips_it() {
        let (input, signal) = channel::<i32>();
        let victim_seen = Rc::new(Cell::new(0));
        let victim_slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let slot = Rc::clone(&victim_slot);
        let _killer = signal.observe(move |_| {
            slot.borrow_mut().take();
        });
        let v = Rc::clone(&victim_seen);
        *victim_slot.borrow_mut() = Some(signal.observe(move |_| v.set(v.get() + 1)));

        input.send(1);
        assert_eq!(victim_seen.get(), 0);
    }

    #[test]
    fn completion_is_terminal() {
        let (input, signal) = channel::<i32>();
        let (log, f) = recorder();
        let sub = signal.subscribe(f);
        input.complete();
        input.send(5);
        input.complete();
        assert_eq!(*log.borrow(), vec![Event::Completed]);
        assert!(!sub.is_active());
        assert!(signal.is_terminated());
    }

    #[test]
    fn late_subscriber_sees_failure() {
        let (input, signal) = channel::<i32>();
        input.fail(StreamError::new("boom"));
        let (log, f) = recorder();
        let sub = signal.subscribe(f);
        assert_eq!(*log.borrow(), vec![Event::Failed(StreamError::new("boom"))]);
        assert!(!sub.is_active());
    }

    #[test]
    fn variable_set_is_deduplicated() {
        let var = Variable::new(1);
        let (log, f) = recorder();
        let _sub = var.signal().subscribe(f);
        var.set(1);
        var.set(2);
        var.update(|v| *v += 1);
        assert_eq!(var.get(), 3);
        assert_eq!(
            *log.borrow(),
            vec![Event::Value(1), Event::Value(2), Event::Value(3)]
        );
    }

    #[test]
    fn send_from_callback_nests() {
        let (input, signal) = channel::<i32>();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let echo = input.clone();
        let _sub = signal.observe(move |v| {
            l.borrow_mut().push(v);
            if v < 3 {
                echo.send(v + 1);
            }
        });
        input.send(1);
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn subscription_into_lifetime() {
        let (input, signal) = channel::<i32>();
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        let mut lifetime = signal.observe(move |v| s.set(v)).into_lifetime();
        input.send(4);
        lifetime.cancel();
        input.send(9);
        assert_eq!(seen.get(), 4);
    }
}
