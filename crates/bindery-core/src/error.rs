#![forbid(unsafe_code)]

//! Error types shared by every layer of the binding engine.
//!
//! Two very different kinds of failure exist:
//!
//! - [`StreamError`] is data: it travels through a signal as a terminal
//!   [`Event::Failed`](crate::signal::Event::Failed) and ends exactly one
//!   subscription. Sibling bindings are unaffected.
//! - [`ContractViolation`] is a composition bug in caller code. It is never
//!   returned; [`ContractViolation::raise`] panics with a message naming the
//!   violated invariant.
//!
//! # Failure Modes
//!
//! | Violation | Cause |
//! |-----------|-------|
//! | `ConflictingDelegate` | A second delegate installed on one native object |
//! | `UnsetHandler` | A registered selector invoked before a handler was set |
//! | `HandlerSignature` | A handler invoked with argument/return types it was not registered with |
//! | `UnsupportedSelector` | A selector outside the delegate protocol |
//! | `UnregisteredSelector` | A handler set for a selector nobody registered |
//! | `MissingInitialValue` | A signal-sourced dynamic value with no synchronous initial value |
//! | `ReentrantConstruction` | A binder's instance requested while it is being built |
//! | `AlreadyBound` | Bindings applied twice through one binder |
//! | `InstanceAlreadyBound` | Two binders pointed at one native object |

use std::fmt;

/// Terminal error carried by a failing signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError {
    message: String,
}

impl StreamError {
    /// Create a stream error with a human readable message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The producer's message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream failed: {}", self.message)
    }
}

impl std::error::Error for StreamError {}

/// A broken engine precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    /// The native object's delegate slot was already occupied.
    ConflictingDelegate { owner: &'static str },
    /// A selector was registered but its handler slot was never filled.
    UnsetHandler {
        protocol: &'static str,
        selector: &'static str,
    },
    /// A handler was invoked with a signature it was not registered with.
    HandlerSignature { selector: &'static str },
    /// A selector is not part of the delegate protocol.
    UnsupportedSelector {
        protocol: &'static str,
        selector: &'static str,
    },
    /// A handler was supplied for a selector that was never registered.
    UnregisteredSelector {
        protocol: &'static str,
        selector: &'static str,
    },
    /// A signal-sourced dynamic value produced no value on subscription.
    MissingInitialValue { value_type: &'static str },
    /// The binder was asked for its instance while constructing it.
    ReentrantConstruction { owner: &'static str },
    /// The binder has already applied its bindings.
    AlreadyBound { owner: &'static str },
    /// The native object already carries another binder's storage.
    InstanceAlreadyBound { owner: &'static str },
}

impl ContractViolation {
    /// Abort with a diagnostic naming the violated invariant.
    #[track_caller]
    pub fn raise(self) -> ! {
        #[cfg(feature = "tracing")]
        tracing::error!(violation = %self, "binding contract violated");
        panic!("{self}")
    }
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConflictingDelegate { owner } => {
                write!(f, "conflicting delegate: {owner} instance already has a delegate")
            }
            Self::UnsetHandler { protocol, selector } => write!(
                f,
                "unset handler: {protocol}.{selector} was registered but never given a handler"
            ),
            Self::HandlerSignature { selector } => {
                write!(f, "handler signature mismatch for selector {selector}")
            }
            Self::UnsupportedSelector { protocol, selector } => {
                write!(f, "unsupported selector: {selector} is not part of {protocol}")
            }
            Self::UnregisteredSelector { protocol, selector } => write!(
                f,
                "unregistered selector: {protocol}.{selector} must be registered before its handler is set"
            ),
            Self::MissingInitialValue { value_type } => write!(
                f,
                "missing initial value: dynamic {value_type} signal produced nothing on subscription"
            ),
            Self::ReentrantConstruction { owner } => {
                write!(f, "reentrant construction: {owner} instance requested while binding")
            }
            Self::AlreadyBound { owner } => {
                write!(f, "already bound: {owner} binder has already applied its bindings")
            }
            Self::InstanceAlreadyBound { owner } => write!(
                f,
                "instance already bound: {owner} instance carries another binder's storage"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_error_display() {
        let err = StreamError::new("socket closed");
        assert_eq!(err.message(), "socket closed");
        assert_eq!(err.to_string(), "stream failed: socket closed");
    }

    #[test]
    fn violation_messages_name_the_invariant() {
        let msg = ContractViolation::ConflictingDelegate { owner: "Window" }.to_string();
        assert!(msg.starts_with("conflicting delegate"));

        let msg = ContractViolation::UnsetHandler {
            protocol: "WindowDelegate",
            selector: "windowDidResize",
        }
        .to_string();
        assert!(msg.contains("WindowDelegate.windowDidResize"));
    }

    #[test]
    #[should_panic(expected = "already bound: Button")]
    fn raise_panics_with_message() {
        ContractViolation::AlreadyBound { owner: "Button" }.raise();
    }
}
