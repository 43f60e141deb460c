//! Data model for the ivcheck conformance oracle.
//!
//! Everything here is pure data: keys, synchronization modes, authored
//! action records and their validated forms, and the wire result the
//! external client echoes back. No I/O, no process handling — that lives
//! in `ivcheck-harness`.

pub mod action;
pub mod key;
pub mod wire;

pub use action::{Action, RawAction, SyncMode, validate_script};
pub use key::IvKey;
pub use wire::WireResult;
