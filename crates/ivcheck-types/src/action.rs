//! Authored action records and their validated forms.
//!
//! A test script is an ordered JSON list of [`RawAction`] records — the
//! permissive authoring surface, where every operation-specific field is
//! optional. Before anything is executed, each record is validated into an
//! [`Action`]: a closed enum with one variant per operation, carrying
//! exactly the fields that operation requires. A record missing a required
//! field is an authoring bug and is rejected up front, never retried.

use ivcheck_error::{IvError, Result};
use serde::{Deserialize, Serialize};

use crate::key::IvKey;

/// How eagerly an update or invalidate propagates to other ranks before
/// the operation is considered complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// No propagation guarantee on completion.
    #[default]
    None,
    /// Other ranks are notified before completion; the payload follows.
    EagerNotify,
    /// Other ranks receive the payload before completion.
    EagerUpdate,
}

impl SyncMode {
    /// The `-s` argument value the client expects.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::EagerNotify => "eager_notify",
            Self::EagerUpdate => "eager_update",
        }
    }
}

/// One authored action record, as it appears in a JSON script.
///
/// Everything except `operation` is optional at this layer; which fields
/// are actually required depends on the operation tag and is enforced by
/// [`RawAction::validate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAction {
    /// Operation tag: `fetch`, `update`, `invalidate`, `set_grp_version`,
    /// `get_grp_version`, or `shutdown`.
    pub operation: String,
    /// Target rank executing the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    /// Entry key as a `[rank, index]` pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Vec<u32>>,
    /// Payload for `update`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Synchronization mode for `update`/`invalidate`; `none` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncMode>,
    /// Logical return code a `fetch` must yield.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,
    /// Value a successful `fetch` must echo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<String>,
    /// Group version for `set_grp_version`, as `"0x..."` hex or decimal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Timestamp for `set_grp_version`.
    #[serde(default, alias = "time", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// A validated cache operation, ready to dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Read an entry and verify the echoed return code, key, and value.
    Fetch {
        rank: u32,
        key: IvKey,
        /// Logical return code the cache must report. `0` is success;
        /// negative values are intentional-failure expectations.
        expected_rc: i32,
        /// Value the cache must echo when `expected_rc` is 0.
        expected_value: String,
    },
    /// Write an entry.
    Update {
        rank: u32,
        key: IvKey,
        value: String,
        sync: SyncMode,
    },
    /// Remove an entry from every rank's local view.
    Invalidate {
        rank: u32,
        key: IvKey,
        sync: SyncMode,
    },
    /// Force a rank's group version, for version-skew scenarios.
    SetGrpVersion {
        rank: u32,
        version: u32,
        timestamp: u64,
    },
    /// Read back a rank's group version.
    GetGrpVersion { rank: u32 },
    /// Ask a rank to shut down. Best-effort when dispatched from a script.
    Shutdown { rank: u32 },
}

impl Action {
    /// The operation tag, as authored and as passed to the client's `-o`.
    #[must_use]
    pub fn operation_name(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::Update { .. } => "update",
            Self::Invalidate { .. } => "invalidate",
            Self::SetGrpVersion { .. } => "set_grp_version",
            Self::GetGrpVersion { .. } => "get_grp_version",
            Self::Shutdown { .. } => "shutdown",
        }
    }

    /// The rank this operation targets.
    #[must_use]
    pub fn rank(&self) -> u32 {
        match self {
            Self::Fetch { rank, .. }
            | Self::Update { rank, .. }
            | Self::Invalidate { rank, .. }
            | Self::SetGrpVersion { rank, .. }
            | Self::GetGrpVersion { rank }
            | Self::Shutdown { rank } => *rank,
        }
    }
}

impl RawAction {
    /// Validate this record into an [`Action`].
    ///
    /// `index` is the record's position in the script and is carried into
    /// the error so a failing report can point at the offending line.
    ///
    /// # Errors
    ///
    /// `IvError::MalformedAction` when a field required by the operation
    /// tag is missing or ill-formed.
    pub fn validate(&self, index: usize) -> Result<Action> {
        let malformed = |reason: &str| IvError::MalformedAction {
            index,
            reason: reason.to_owned(),
        };

        let rank = self
            .rank
            .ok_or_else(|| malformed("every action must name a target rank"))?;

        match self.operation.as_str() {
            "fetch" => {
                let key = self.require_key(index)?;
                let expected_rc = self
                    .return_code
                    .ok_or_else(|| malformed("fetch requires a return_code"))?;
                let expected_value = self
                    .expected_value
                    .clone()
                    .ok_or_else(|| malformed("fetch requires an expected_value"))?;
                Ok(Action::Fetch {
                    rank,
                    key,
                    expected_rc,
                    expected_value,
                })
            }
            "update" => {
                let key = self.require_key(index)?;
                let value = self
                    .value
                    .clone()
                    .ok_or_else(|| malformed("update requires a value"))?;
                Ok(Action::Update {
                    rank,
                    key,
                    value,
                    sync: self.sync.unwrap_or_default(),
                })
            }
            "invalidate" => {
                let key = self.require_key(index)?;
                Ok(Action::Invalidate {
                    rank,
                    key,
                    sync: self.sync.unwrap_or_default(),
                })
            }
            "set_grp_version" => {
                let raw = self
                    .version
                    .as_deref()
                    .ok_or_else(|| malformed("set_grp_version requires a version"))?;
                let version = parse_version(raw).ok_or_else(|| {
                    malformed("version must be a decimal or 0x-prefixed 32-bit integer")
                })?;
                let timestamp = self
                    .timestamp
                    .ok_or_else(|| malformed("set_grp_version requires a timestamp"))?;
                Ok(Action::SetGrpVersion {
                    rank,
                    version,
                    timestamp,
                })
            }
            "get_grp_version" => Ok(Action::GetGrpVersion { rank }),
            "shutdown" => Ok(Action::Shutdown { rank }),
            other => Err(malformed(&format!("unknown operation '{other}'"))),
        }
    }

    fn require_key(&self, index: usize) -> Result<IvKey> {
        let key = self.key.as_deref().ok_or_else(|| IvError::MalformedAction {
            index,
            reason: "this operation requires a key".to_owned(),
        })?;
        match key {
            [rank, idx] => Ok(IvKey::new(*rank, *idx)),
            _ => Err(IvError::MalformedAction {
                index,
                reason: "key must be a pair of (rank, index)".to_owned(),
            }),
        }
    }
}

/// Validate an entire authored script, fail-fast on the first malformed
/// record.
///
/// # Errors
///
/// The first `IvError::MalformedAction` encountered, with the offending
/// record's index. Nothing is executed when any record is malformed.
pub fn validate_script(script: &[RawAction]) -> Result<Vec<Action>> {
    script
        .iter()
        .enumerate()
        .map(|(index, raw)| raw.validate(index))
        .collect()
}

/// Parse a group version from its authored form: decimal, or `0x` hex.
fn parse_version(raw: &str) -> Option<u32> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        raw.parse().ok()
    }
}
