//! Non-fatal problems collected while building a response
//!
//! Decoding a trace or classifying slots never aborts on a single bad field.
//! The offending value is replaced by a default and a [`Diagnostic`] records
//! where and why, so callers decide whether to log, surface or ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single degraded field, tagged with the entry it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Trace path of the affected node, or the slot hex for storage diagnostics
    pub path: String,
    pub kind: DiagnosticKind,
}

/// What went wrong for a [`Diagnostic`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DiagnosticKind {
    /// A hex quantity (gas, gasUsed) did not parse; zero was used instead
    NumericDecode { field: String, raw: String },
    /// The raw call type is not a known EVM call kind; `call` was used instead
    UnknownCallType { raw: String },
    /// A child call at this index is not a record and was dropped
    SkippedChild { index: usize },
    /// A log at this index is not a record and was dropped
    SkippedLog { index: usize },
    /// A preimage entry is not valid hex and was ignored
    InvalidPreimage { hash: String },
    /// A touched slot string is not a 256-bit quantity
    InvalidSlot { raw: String },
    /// The layout could not be placed, so the slot stays unresolved
    UnresolvedLayout { reason: String },
}

impl Diagnostic {
    pub fn new(path: impl Into<String>, kind: DiagnosticKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::NumericDecode { field, raw } => {
                write!(f, "{}: could not decode {} '{}'", self.path, field, raw)
            }
            DiagnosticKind::UnknownCallType { raw } => {
                write!(f, "{}: unknown call type '{}'", self.path, raw)
            }
            DiagnosticKind::SkippedChild { index } => {
                write!(f, "{}: skipped non-object call at index {}", self.path, index)
            }
            DiagnosticKind::SkippedLog { index } => {
                write!(f, "{}: skipped non-object log at index {}", self.path, index)
            }
            DiagnosticKind::InvalidPreimage { hash } => {
                write!(f, "{}: ignored invalid preimage for {}", self.path, hash)
            }
            DiagnosticKind::InvalidSlot { raw } => {
                write!(f, "{}: invalid slot '{}'", self.path, raw)
            }
            DiagnosticKind::UnresolvedLayout { reason } => {
                write!(f, "{}: layout unresolved: {}", self.path, reason)
            }
        }
    }
}
