#![forbid(unsafe_code)]

//! A simulated native toolkit and its binding adapters.
//!
//! The toolkit mimics an object-oriented UI framework: reference-counted
//! native objects with mutable properties, a single delegate slot per
//! window, a notification centre and target/action controls. Every
//! property change is journaled so binding effects can be asserted.
//!
//! Binding levels form the chain
//!
//! ```text
//! BaseBinding ◀── ViewBinding ◀── ControlBinding ◀── ButtonBinding
//! BaseBinding ◀── WindowBinding
//! ```
//!
//! and each level has a binder alias: [`View`], [`Control`], [`Button`],
//! [`Window`].

pub mod button;
pub mod control;
pub mod geometry;
pub mod native;
pub mod notification;
pub mod view;
pub mod window;

pub use button::{
    BezelStyle, Button, ButtonBinding, ButtonParameters, ButtonPreparer, ButtonState, ButtonType,
    NativeButton,
};
pub use control::{
    ActionTarget, Control, ControlBinding, ControlInstance, ControlParameters, ControlPreparer,
    ControlSize, NativeControl,
};
pub use geometry::{Point, Rect, Size};
pub use native::{Journal, Mutation, ObjectBase, ObjectId};
pub use notification::{Notification, NotificationCenter, Observer};
pub use view::{NativeView, View, ViewBinding, ViewInstance, ViewParameters, ViewPreparer};
pub use window::{
    NativeWindow, Window, WindowBinding, WindowDelegate, WindowParameters, WindowPreparer,
    WindowStorage, WindowStyle,
};
