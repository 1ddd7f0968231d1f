#![forbid(unsafe_code)]

//! Binder configuration.
//!
//! Defaults can be overridden from the environment:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `BINDERY_TRACE_BINDINGS` | `1`/`true`/`yes`/`on` emits a trace event per binding and phase |

/// Environment variable enabling per-binding trace events.
pub const TRACE_BINDINGS_ENV: &str = "BINDERY_TRACE_BINDINGS";

/// Diagnostics knobs for one binder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinderConfig {
    /// Free-form label attached to the construction span.
    pub label: Option<String>,
    /// Emit a `trace!` event for every binding in every phase.
    pub trace_bindings: bool,
}

impl BinderConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through `lookup`, for hermetic tests.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let trace_bindings = lookup(TRACE_BINDINGS_ENV)
            .as_deref()
            .and_then(parse_flag)
            .unwrap_or(false);
        Self {
            label: None,
            trace_bindings,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_trace_bindings(mut self, enabled: bool) -> Self {
        self.trace_bindings = enabled;
        self
    }

    /// The label, if one was set.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
