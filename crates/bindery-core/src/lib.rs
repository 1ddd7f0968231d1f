#![forbid(unsafe_code)]

//! Foundational types for the bindery binding engine.
//!
//! - [`signal`]: single-threaded multicast signals and [`Variable`].
//! - [`value`]: the four value shapes a binding case carries
//!   ([`Constant`], [`Dynamic`], [`SignalIn`], [`SignalOut`]).
//! - [`lifetime`]: [`Lifetime`] and [`AggregateLifetime`] cancellation handles.
//! - [`error`]: [`StreamError`] and the fatal [`ContractViolation`]s.
//!
//! Everything here is `!Send`: binding application, delegate dispatch and
//! cancellation all run on the toolkit's single UI thread.

pub mod error;
pub mod lifetime;
pub mod signal;
pub mod value;

pub use error::{ContractViolation, StreamError};
pub use lifetime::{AggregateLifetime, Cancellable, Lifetime};
pub use signal::{Event, Signal, SignalInput, Subscription, Variable, channel, continuous};
pub use value::{BindingValue, Constant, Dynamic, Fire, Initial, SignalIn, SignalOut, ValueKind};
