//! Error types for tracescope-core
//!
//! This module defines the errors raised while assembling a normalized trace and
//! while placing declared storage variables into slots.

use thiserror::Error;

/// Errors that can occur while fetching or assembling a call trace
///
/// Per-field decoding problems inside a trace are not errors; they are reported
/// as [`crate::Diagnostic`] values next to a successful result.
#[derive(Error, Debug)]
pub enum TraceError {
    /// The root of the raw trace is not a record
    #[error("Malformed trace: {0}")]
    MalformedTrace(String),
    /// The call tree is nested deeper than the configured limit
    #[error("Trace exceeds maximum call depth of {max_depth}")]
    TraceTooDeep { max_depth: usize },
    /// The node does not know the requested transaction or chain
    #[error("Not found: {0}")]
    NotFound(String),
    /// The trace source could not be reached or answered garbage
    #[error("Transport error: {0}")]
    Transport(String),
    /// A source compiler rejected its input
    #[error("Compilation failed: {0}")]
    Compile(String),
    /// Caller supplied input failed validation (tx hash, chain name, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TraceError {
    /// Shorthand for a [`TraceError::Transport`] built from any displayable cause
    pub fn transport(cause: impl std::fmt::Display) -> Self {
        TraceError::Transport(cause.to_string())
    }
}

/// Errors that can occur while placing declared variables into storage slots
///
/// These indicate an inconsistent layout description rather than a property of
/// any particular touched slot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotResolutionError {
    /// Elementary type name with no known storage width
    #[error("Unknown elementary type: {0}")]
    UnknownType(String),
    /// Static array declared with a length below one
    #[error("Invalid array length {length} for '{name}'")]
    InvalidLength { name: String, length: i64 },
    /// Struct reference with no matching definition in the layout
    #[error("Unknown struct: {0}")]
    UnknownStruct(String),
    /// Struct that contains itself by value
    #[error("Recursive struct: {0}")]
    RecursiveStruct(String),
    /// Storage footprint does not fit in the 256-bit slot space
    #[error("Storage footprint of '{0}' overflows the slot space")]
    Overflow(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_error_display() {
        let err = TraceError::TraceTooDeep { max_depth: 4 };
        assert_eq!(err.to_string(), "Trace exceeds maximum call depth of 4");

        let err = TraceError::transport("connection refused");
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json");
        let err: TraceError = parse.unwrap_err().into();
        assert!(matches!(err, TraceError::Serialization(_)));
    }

    #[test]
    fn test_slot_resolution_error_display() {
        let err = SlotResolutionError::InvalidLength {
            name: "items".to_string(),
            length: -1,
        };
        assert_eq!(err.to_string(), "Invalid array length -1 for 'items'");
    }
}
