//! Incast-variable keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one incast-variable entry in the distributed cache.
///
/// `rank` is the logical identifier of the owning node; `index`
/// disambiguates entries within that rank. Both halves are unsigned 32-bit
/// by wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IvKey {
    /// Owning node's logical identifier.
    pub rank: u32,
    /// Entry index within the owning rank.
    pub index: u32,
}

impl IvKey {
    #[must_use]
    pub const fn new(rank: u32, index: u32) -> Self {
        Self { rank, index }
    }
}

/// Renders the `-k` argument shape the client expects: `rank:index`.
impl fmt::Display for IvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.rank, self.index)
    }
}
