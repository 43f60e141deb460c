//! The sequential execution engine.
//!
//! Runs an authored script against the live cache, one action at a time,
//! strictly in order: no action is dispatched before the previous one's
//! client process has terminated and its result has been verified. Each
//! action progresses dispatch → verify; the first error marks the action
//! failed and every remaining action skipped. No action is ever retried —
//! each operation is a one-shot network-visible side effect, and a blind
//! retry would corrupt the distributed state under observation.
//!
//! Teardown is guaranteed: the shutdown orchestrator runs on every exit
//! path, including a script that failed validation and never dispatched
//! anything.
//!
//! # Result-exchange channel
//!
//! A fetch hands the client a fresh file in the shared directory via
//! `-l`; the client writes its [`WireResult`] there. The file is created
//! per fetch, read once, and deleted before verification proceeds. No two
//! fetches ever share a channel — the engine never has two in flight.

use std::fs;
use std::io;
use std::thread;
use std::time::Instant;

use ivcheck_error::{IvError, Result};
use ivcheck_types::{Action, IvKey, RawAction, SyncMode, WireResult, validate_script};
use tracing::{info, warn};

use crate::codec;
use crate::config::{HarnessConfig, WaitPolicy};
use crate::invoke::{ClientInvoker, ClientOutput, ClientRequest};
use crate::report::{
    ActionOutcome, ActionStatus, FailureInfo, ShutdownFailureRecord, ShutdownReport, TestRunReport,
};
use crate::shutdown::ShutdownOrchestrator;

/// Drives one conformance run to completion.
///
/// The engine exclusively owns the run's aggregated state; the codec and
/// the request builders are pure functions over what they are given.
pub struct ExecutionEngine<'a, I: ClientInvoker> {
    config: &'a HarnessConfig,
    invoker: &'a I,
}

impl<'a, I: ClientInvoker> ExecutionEngine<'a, I> {
    #[must_use]
    pub fn new(config: &'a HarnessConfig, invoker: &'a I) -> Self {
        Self { config, invoker }
    }

    /// Validate and run an authored script.
    ///
    /// The whole script is validated before anything executes: a malformed
    /// record anywhere means zero client invocations, a report with every
    /// action skipped, and teardown still runs.
    #[must_use]
    pub fn run_script(&self, script: &[RawAction]) -> TestRunReport {
        match validate_script(script) {
            Ok(actions) => self.run(&actions),
            Err(err) => {
                warn!(error = %err, "script rejected before execution");
                let mut report = self.new_report();
                for (index, raw) in script.iter().enumerate() {
                    report.actions.push(ActionOutcome {
                        index,
                        operation: raw.operation.clone(),
                        rank: raw.rank.unwrap_or(0),
                        status: ActionStatus::Skipped,
                        duration_ms: 0,
                    });
                }
                report.first_failure = Some(FailureInfo::from_error(&err));
                report.success = false;
                self.finish(report)
            }
        }
    }

    /// Run a pre-validated action sequence.
    #[must_use]
    pub fn run(&self, actions: &[Action]) -> TestRunReport {
        let mut report = self.new_report();
        let mut first_failure: Option<IvError> = None;

        for (index, action) in actions.iter().enumerate() {
            if first_failure.is_some() {
                report.actions.push(ActionOutcome {
                    index,
                    operation: action.operation_name().to_owned(),
                    rank: action.rank(),
                    status: ActionStatus::Skipped,
                    duration_ms: 0,
                });
                continue;
            }

            let start = Instant::now();
            let outcome = self.execute(index, action, &mut report.shutdown);
            let duration_ms = elapsed_ms(start);

            let status = match outcome {
                Ok(()) => ActionStatus::Pass,
                Err(err) => {
                    warn!(index, error = %err, "action failed; skipping the rest");
                    first_failure = Some(err);
                    ActionStatus::Fail
                }
            };
            report.actions.push(ActionOutcome {
                index,
                operation: action.operation_name().to_owned(),
                rank: action.rank(),
                status,
                duration_ms,
            });
        }

        report.success = first_failure.is_none();
        report.first_failure = first_failure.as_ref().map(FailureInfo::from_error);
        self.finish(report)
    }

    /// Guaranteed-cleanup tail: orchestrated teardown on every exit path.
    fn finish(&self, mut report: TestRunReport) -> TestRunReport {
        let teardown = ShutdownOrchestrator::new(self.config, self.invoker).run();
        report.shutdown.attempted.extend(teardown.attempted);
        report.shutdown.failures.extend(teardown.failures);
        report
    }

    fn new_report(&self) -> TestRunReport {
        TestRunReport::new(
            self.config.client_bin.to_string_lossy().into_owned(),
            self.config.rank_count,
        )
    }

    fn execute(
        &self,
        index: usize,
        action: &Action,
        shutdown: &mut ShutdownReport,
    ) -> Result<()> {
        info!(index, operation = action.operation_name(), rank = action.rank(), "dispatching");
        match action {
            Action::Fetch {
                rank,
                key,
                expected_rc,
                expected_value,
            } => self.execute_fetch(index, *rank, *key, *expected_rc, expected_value),
            Action::Update {
                rank,
                key,
                value,
                sync,
            } => {
                let request = ClientRequest::update(self.config, *rank, *key, value, *sync);
                self.invoke_checked(index, &request)?;
                self.settle_after_sync(*sync);
                Ok(())
            }
            Action::Invalidate { rank, key, sync } => {
                let request = ClientRequest::invalidate(self.config, *rank, *key, *sync);
                self.invoke_checked(index, &request)?;
                self.settle_after_sync(*sync);
                Ok(())
            }
            Action::SetGrpVersion {
                rank,
                version,
                timestamp,
            } => {
                let request =
                    ClientRequest::set_grp_version(self.config, *rank, *version, *timestamp);
                self.invoke_checked(index, &request)?;
                Ok(())
            }
            Action::GetGrpVersion { rank } => {
                let request = ClientRequest::get_grp_version(self.config, *rank);
                self.invoke_checked(index, &request)?;
                Ok(())
            }
            Action::Shutdown { rank } => {
                // In-script shutdown is best-effort, like orchestrated
                // teardown: a failure is recorded and never fatal.
                let request = ClientRequest::shutdown(self.config, *rank);
                match self.invoke_checked(index, &request) {
                    Ok(_) => {}
                    Err(err) => {
                        warn!(rank, error = %err, "scripted shutdown failed");
                        shutdown.failures.push(ShutdownFailureRecord {
                            rank: *rank,
                            detail: err.to_string(),
                        });
                    }
                }
                Ok(())
            }
        }
    }

    fn execute_fetch(
        &self,
        index: usize,
        rank: u32,
        key: IvKey,
        expected_rc: i32,
        expected_value: &str,
    ) -> Result<()> {
        let result = self.exchange_fetch(index, rank, key)?;

        if result.return_code != expected_rc {
            return Err(IvError::ProtocolMismatch {
                index,
                what: "return_code",
                expected: expected_rc.to_string(),
                actual: result.return_code.to_string(),
            });
        }

        // A fetch that was *expected* to fail carries no meaningful
        // payload; the return code was the whole check.
        if expected_rc != 0 {
            return Ok(());
        }

        if !codec::verify_key(key, &result.key) {
            return Err(IvError::ProtocolMismatch {
                index,
                what: "key",
                expected: codec::encode_key(key),
                actual: result.key,
            });
        }
        if !codec::verify_value(expected_value, &result.value) {
            return Err(IvError::ProtocolMismatch {
                index,
                what: "value",
                expected: codec::encode_value(expected_value),
                actual: result.value,
            });
        }
        Ok(())
    }

    /// Run one fetch round-trip through the result-exchange channel:
    /// fresh file, client invocation, parse, delete.
    fn exchange_fetch(&self, index: usize, rank: u32, key: IvKey) -> Result<WireResult> {
        let channel = tempfile::Builder::new()
            .prefix("ivcheck-result-")
            .suffix(".json")
            .tempfile_in(&self.config.shared_dir)
            .map_err(|err| IvError::Config {
                reason: format!(
                    "cannot create a result file in '{}': {err}",
                    self.config.shared_dir.display()
                ),
            })?;

        let request = ClientRequest::fetch(self.config, rank, key, channel.path());
        self.invoke_checked(index, &request)?;

        let path = channel.path().to_path_buf();
        let text = fs::read_to_string(&path).map_err(|err| IvError::WireResult {
            index,
            path: path.clone(),
            detail: err.to_string(),
        })?;
        let result: WireResult =
            serde_json::from_str(&text).map_err(|err| IvError::WireResult {
                index,
                path: path.clone(),
                detail: err.to_string(),
            })?;

        // Consume-once: the channel is gone before verification proceeds.
        channel.close().map_err(IvError::Io)?;
        Ok(result)
    }

    /// Dispatch a request and require a clean process exit.
    ///
    /// The process exit code is infrastructure: any non-zero exit (or a
    /// spawn failure) aborts the run, independent of the logical return
    /// code a fetch may carry in its payload.
    fn invoke_checked(&self, index: usize, request: &ClientRequest) -> Result<ClientOutput> {
        let output = self
            .invoker
            .invoke(request)
            .map_err(|err: io::Error| IvError::InvocationFailure {
                index,
                exit_code: -1,
                stderr: format!("spawn failed: {err}"),
            })?;
        if !output.success() {
            return Err(IvError::InvocationFailure {
                index,
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    fn settle_after_sync(&self, sync: SyncMode) {
        if sync == SyncMode::None {
            return;
        }
        match self.config.wait {
            WaitPolicy::Immediate => {}
            WaitPolicy::FixedDelay(delay) => thread::sleep(delay),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
