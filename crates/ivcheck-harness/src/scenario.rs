//! Scenario preset library and script loading.
//!
//! A scenario is an ordered action sequence with a name. The presets here
//! cover the active conformance coverage for a five-rank tree deployment;
//! custom coverage is authored as a JSON script (a list of records,
//! validated before anything runs).

use std::fs;
use std::path::Path;

use ivcheck_error::{IvError, Result};
use ivcheck_types::{Action, IvKey, RawAction, SyncMode, validate_script};

/// The key both presets exercise: owned by rank 4, index 42.
const PRESET_KEY: IvKey = IvKey::new(4, 42);

/// Replication convergence: an update at the root must become visible on
/// every rank.
///
/// Updates `(4,42)` to `"turnip"` at rank 0, then fetches it from each of
/// the five ranks expecting success with that exact value. The fetch
/// order deliberately mixes parents and children so convergence is
/// checked across the tree, not just down one path.
#[must_use]
pub fn replication_convergence() -> Vec<Action> {
    let mut actions = vec![Action::Update {
        rank: 0,
        key: PRESET_KEY,
        value: "turnip".to_owned(),
        sync: SyncMode::None,
    }];
    for rank in [1, 0, 3, 2, 4] {
        actions.push(Action::Fetch {
            rank,
            key: PRESET_KEY,
            expected_rc: 0,
            expected_value: "turnip".to_owned(),
        });
    }
    actions
}

/// Invalidation propagation: after an eager-notify invalidate, the entry
/// must be unreachable from every rank.
///
/// Runs [`replication_convergence`] first (the entry has to exist before
/// invalidating it is meaningful), invalidates at rank 4 with
/// `eager_notify`, then fetches from every rank expecting return code
/// −1 — the intentional-failure case where only the code is checked.
#[must_use]
pub fn invalidation_propagation() -> Vec<Action> {
    let mut actions = replication_convergence();
    actions.push(Action::Invalidate {
        rank: 4,
        key: PRESET_KEY,
        sync: SyncMode::EagerNotify,
    });
    for rank in [4, 1, 0, 2, 3] {
        actions.push(Action::Fetch {
            rank,
            key: PRESET_KEY,
            expected_rc: -1,
            expected_value: String::new(),
        });
    }
    actions
}

/// The full one-node suite: convergence followed by invalidation, in the
/// canonical order. This is the default scenario.
#[must_use]
pub fn one_node_suite() -> Vec<Action> {
    invalidation_propagation()
}

/// Metadata describing a built-in scenario.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioMeta {
    /// Machine-readable name accepted by [`by_name`].
    pub name: &'static str,
    /// What the scenario demonstrates.
    pub description: &'static str,
}

/// Catalog of built-in scenarios.
#[must_use]
pub fn scenario_catalog() -> &'static [ScenarioMeta] {
    &[
        ScenarioMeta {
            name: "replication_convergence",
            description: "update at the root is visible from every rank",
        },
        ScenarioMeta {
            name: "invalidation_propagation",
            description: "eager-notify invalidate makes the entry unreachable everywhere",
        },
        ScenarioMeta {
            name: "one_node_suite",
            description: "convergence then invalidation, the default coverage",
        },
    ]
}

/// Look up a built-in scenario by name.
#[must_use]
pub fn by_name(name: &str) -> Option<Vec<Action>> {
    match name {
        "replication_convergence" => Some(replication_convergence()),
        "invalidation_propagation" => Some(invalidation_propagation()),
        "one_node_suite" => Some(one_node_suite()),
        _ => None,
    }
}

/// Parse and validate a JSON script: a list of action records.
///
/// # Errors
///
/// `IvError::Config` when the text is not a JSON list of records;
/// `IvError::MalformedAction` for the first structurally invalid record.
pub fn parse_script(text: &str) -> Result<Vec<Action>> {
    let raws: Vec<RawAction> = serde_json::from_str(text).map_err(|err| IvError::Config {
        reason: format!("script is not a JSON action list: {err}"),
    })?;
    validate_script(&raws)
}

/// Load and validate a JSON script from a file.
///
/// # Errors
///
/// As [`parse_script`], plus `IvError::Io` when the file is unreadable.
pub fn load_script(path: &Path) -> Result<Vec<Action>> {
    let text = fs::read_to_string(path)?;
    parse_script(&text)
}
