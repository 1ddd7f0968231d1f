#![forbid(unsafe_code)]

//! bindery: declarative bindings for imperative native objects.
//!
//! A binding list describes how a native object's properties and events
//! relate to signals; a [`Binder`] builds the object and keeps those
//! relationships alive until cancelled.
//!
//! ```ignore
//! use bindery::prelude::*;
//!
//! let enabled = Variable::new(true);
//! let ok = Button::new(bindings![
//!     ButtonBinding::title("OK"),
//!     ViewBinding::is_hidden(false),
//!     ControlBinding::is_enabled(enabled.signal()),
//! ]);
//! let button = ok.instance();
//! enabled.set(false);
//! ok.cancel();
//! ```

pub use bindery_core as core;
pub use bindery_runtime as runtime;
#[cfg(feature = "widgets")]
pub use bindery_widgets as widgets;

pub use bindery_core::{
    AggregateLifetime, Constant, ContractViolation, Dynamic, Lifetime, Signal, SignalIn,
    SignalInput, SignalOut, StreamError, Variable,
};
pub use bindery_runtime::{Binder, BinderConfig, bindings, inherit_bindings};

/// Everything needed to write binding lists.
pub mod prelude {
    pub use bindery_core::{
        Constant, Dynamic, Event, Initial, Lifetime, Signal, SignalIn, SignalInput, SignalOut,
        Variable, channel, continuous,
    };
    pub use bindery_runtime::{
        BaseBinding, Binder, BinderConfig, BinderPhase, Binding, bindings, inherit_bindings,
    };
    #[cfg(feature = "widgets")]
    pub use bindery_widgets::{
        Button, ButtonBinding, Control, ControlBinding, ControlInstance, Point, Rect, Size, View,
        ViewBinding, ViewInstance, Window, WindowBinding, WindowStyle,
    };
}
