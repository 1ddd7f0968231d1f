#![forbid(unsafe_code)]

//! Test harness for bindery.
//!
//! - [`init_test_logging`] installs a `tracing` subscriber that writes
//!   through the test harness, filtered by `BINDERY_LOG` (default `warn`).
//! - [`Recorder`] captures everything a signal delivers.
//! - [`CancelProbe`] hands out lifetimes and counts their cancellations.
//! - [`journal_snapshot`] renders a native object's mutation journal as
//!   JSON lines for comparison against an expected transcript.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Once;

use bindery_core::{Event, Lifetime, Signal, StreamError, Subscription};
use bindery_widgets::Journal;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the test log filter.
pub const LOG_ENV: &str = "BINDERY_LOG";

static INIT_LOGGING: Once = Once::new();

/// Install the test subscriber once per process.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
        // Another harness may have installed a global subscriber already.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
        tracing::debug!(filter_env = LOG_ENV, "test logging installed");
    });
}

/// What a [`Recorder`] saw, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded<T> {
    Value(T),
    Completed,
    Failed(StreamError),
}

/// Subscribes to a signal and keeps every event it delivers.
pub struct Recorder<T> {
    events: Rc<RefCell<Vec<Recorded<T>>>>,
    subscription: Subscription,
}

impl<T: Clone + 'static> Recorder<T> {
    /// Start recording `signal`.
    pub fn attach(signal: &Signal<T>) -> Self {
        let events: Rc<RefCell<Vec<Recorded<T>>>> = Rc::default();
        let sink = Rc::clone(&events);
        let subscription = signal.subscribe(move |event| {
            let recorded = match event {
                Event::Value(value) => Recorded::Value(value),
                Event::Completed => Recorded::Completed,
                Event::Failed(error) => Recorded::Failed(error),
            };
            sink.borrow_mut().push(recorded);
        });
        Self {
            events,
            subscription,
        }
    }

    /// Every event so far.
    #[must_use]
    pub fn events(&self) -> Vec<Recorded<T>> {
        self.events.borrow().clone()
    }

    /// Only the values, in order.
    #[must_use]
    pub fn values(&self) -> Vec<T> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Recorded::Value(value) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.events
            .borrow()
            .iter()
            .any(|event| matches!(event, Recorded::Completed))
    }

    #[must_use]
    pub fn failure(&self) -> Option<StreamError> {
        self.events.borrow().iter().find_map(|event| match event {
            Recorded::Failed(error) => Some(error.clone()),
            _ => None,
        })
    }

    /// Stop recording; already captured events are kept.
    pub fn detach(&mut self) {
        self.subscription.cancel();
    }
}

/// Counts how often the lifetimes it issued were cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelProbe {
    issued: Rc<Cell<usize>>,
    cancelled: Rc<Cell<usize>>,
}

impl CancelProbe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh lifetime reporting to this probe.
    pub fn lifetime(&self) -> Lifetime {
        self.issued.set(self.issued.get() + 1);
        let cancelled = Rc::clone(&self.cancelled);
        Lifetime::from_fn(move || cancelled.set(cancelled.get() + 1))
    }

    #[must_use]
    pub fn issued(&self) -> usize {
        self.issued.get()
    }

    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.cancelled.get()
    }
}

/// One JSON object per journal entry, newline separated.
///
/// # Panics
///
/// If an entry fails to serialize.
#[must_use]
pub fn journal_snapshot(journal: &Journal) -> String {
    journal
        .entries()
        .iter()
        .map(|mutation| serde_json::to_string(mutation).expect("journal entry serializes"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Assert a journal matches an expected `property=value` transcript.
#[macro_export]
macro_rules! assert_journal {
    ($journal:expr, [$($entry:expr),* $(,)?]) => {{
        let actual: ::std::vec::Vec<::std::string::String> = $journal
            .entries()
            .iter()
            .map(|m| ::std::format!("{}={}", m.property, m.value))
            .collect();
        let expected: ::std::vec::Vec<::std::string::String> =
            ::std::vec![$(::std::string::String::from($entry)),*];
        assert_eq!(actual, expected, "journal mismatch");
    }};
}
