//! The wire result a client invocation leaves behind.

use serde::{Deserialize, Serialize};

/// The client's report of one fetch outcome, written as a JSON object to
/// the result-exchange file named by `-l`.
///
/// Lifecycle: produced by the external process for exactly one action,
/// consumed once by the verification engine, then the file is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireResult {
    /// Logical return code from the cache. `0` is success; negative values
    /// are cache error conditions (e.g. a missing or invalidated entry).
    pub return_code: i32,
    /// Echoed key: 16 hex characters, rank then index, both little-endian
    /// 32-bit.
    pub key: String,
    /// Echoed value: hex string, zero-padded out to the cache's fixed-size
    /// value buffer.
    pub value: String,
}
