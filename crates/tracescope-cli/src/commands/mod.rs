//! Command implementations for the tracescope CLI tool
//!
//! This module contains the implementation of all CLI commands, one file per
//! subcommand.

pub mod layout;
pub mod storage;
pub mod trace;

pub use layout::cmd_layout;
pub use storage::cmd_storage;
pub use trace::{cmd_trace, TraceRequest};
