//! Harness configuration.
//!
//! Everything the engine, dispatcher, and orchestrator need arrives
//! through [`HarnessConfig`] — none of them reads the environment. The
//! single place the environment is consulted is
//! [`shared_dir_from_env`], meant for the runner binary's edge.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use ivcheck_error::{IvError, Result};

/// Environment variable naming the shared result-exchange directory.
pub const SHARED_DIR_ENV: &str = "IVCHECK_SHARED_DIR";

/// How to wait for asynchronous propagation after a synced mutation.
///
/// The cache offers no signal for "propagation complete", so the oracle
/// can only choose how long to stand back after an `eager_notify` /
/// `eager_update` operation before issuing the next action. Additional
/// strategies (e.g. polling until convergent) would extend this enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Proceed immediately; trust the sync mode's completion semantics.
    #[default]
    Immediate,
    /// Sleep a fixed delay before the next action.
    FixedDelay(Duration),
}

/// Configuration for one conformance run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Path to the IV client binary.
    pub client_bin: PathBuf,
    /// Launcher argv prepended to every client invocation (empty to run
    /// the client directly).
    pub client_prefix: Vec<String>,
    /// Directory for per-fetch result-exchange files. Must be visible to
    /// both the oracle and the client processes.
    pub shared_dir: PathBuf,
    /// Number of ranks in the server group; teardown targets `0..rank_count`.
    pub rank_count: u32,
    /// Wait applied after update/invalidate actions with a non-`none`
    /// sync mode.
    pub wait: WaitPolicy,
    /// Settle delay after launching the server group, before the first
    /// action.
    pub launch_settle: Duration,
    /// Settle delay after the non-root ranks have been told to shut down.
    pub shutdown_settle: Duration,
    /// Settle delay after rank 0 has been told to shut down.
    pub root_shutdown_settle: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            client_bin: PathBuf::from("iv_client"),
            client_prefix: Vec::new(),
            shared_dir: env::temp_dir(),
            rank_count: 5,
            wait: WaitPolicy::default(),
            launch_settle: Duration::from_secs(2),
            shutdown_settle: Duration::from_secs(1),
            root_shutdown_settle: Duration::from_secs(2),
        }
    }
}

impl HarnessConfig {
    /// A config with every settle delay zeroed. Test runs against fake
    /// invokers have nothing to wait for.
    #[must_use]
    pub fn without_delays() -> Self {
        Self {
            launch_settle: Duration::ZERO,
            shutdown_settle: Duration::ZERO,
            root_shutdown_settle: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Resolve the shared result-exchange directory from the deployment
/// environment: [`SHARED_DIR_ENV`] if set and non-empty, else `HOME`.
///
/// # Errors
///
/// `IvError::Config` when neither variable is set — a missing shared
/// directory is a deployment problem, not a protocol failure.
pub fn shared_dir_from_env() -> Result<PathBuf> {
    for var in [SHARED_DIR_ENV, "HOME"] {
        if let Ok(dir) = env::var(var) {
            if !dir.is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }
    }
    Err(IvError::Config {
        reason: format!("neither {SHARED_DIR_ENV} nor HOME names a shared directory"),
    })
}
