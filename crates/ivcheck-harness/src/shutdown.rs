//! Reverse-order teardown of the server group.
//!
//! The cache's tree topology makes rank 0 the root, and intermediate and
//! leaf ranks may still depend on the root while tearing down. The
//! orchestrator therefore shuts down every non-zero rank first, in
//! descending rank order, and the root strictly last. That ordering is a
//! required behavior of the system under test, and the oracle preserves
//! it on every exit path — pass, fail, or aborted script.
//!
//! Every shutdown request is an independent best-effort invocation: a
//! failed attempt is recorded and the orchestrator moves on to the next
//! rank.

use std::thread;

use tracing::{info, warn};

use crate::config::HarnessConfig;
use crate::invoke::{ClientInvoker, ClientRequest};
use crate::report::{ShutdownFailureRecord, ShutdownReport};

/// Tears down ranks `0..rank_count`, root last.
pub struct ShutdownOrchestrator<'a, I: ClientInvoker> {
    config: &'a HarnessConfig,
    invoker: &'a I,
}

impl<'a, I: ClientInvoker> ShutdownOrchestrator<'a, I> {
    #[must_use]
    pub fn new(config: &'a HarnessConfig, invoker: &'a I) -> Self {
        Self { config, invoker }
    }

    /// Request shutdown of every rank and report what happened.
    ///
    /// Never fails: every spawn error and non-zero exit becomes a
    /// [`ShutdownFailureRecord`] and the remaining ranks are still
    /// attempted.
    #[must_use]
    pub fn run(&self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        if self.config.rank_count == 0 {
            return report;
        }

        for rank in (1..self.config.rank_count).rev() {
            self.request_shutdown(rank, &mut report);
        }
        thread::sleep(self.config.shutdown_settle);

        // Rank 0 is the root and must go down last.
        self.request_shutdown(0, &mut report);
        thread::sleep(self.config.root_shutdown_settle);

        report
    }

    fn request_shutdown(&self, rank: u32, report: &mut ShutdownReport) {
        let request = ClientRequest::shutdown(self.config, rank);
        info!(rank, command = %request, "requesting shutdown");
        report.attempted.push(rank);

        match self.invoker.invoke(&request) {
            Ok(output) if output.success() => {}
            Ok(output) => {
                warn!(rank, exit_code = output.exit_code, "shutdown request failed");
                report.failures.push(ShutdownFailureRecord {
                    rank,
                    detail: format!("client exited {}: {}", output.exit_code, output.stderr),
                });
            }
            Err(err) => {
                warn!(rank, error = %err, "shutdown request could not be spawned");
                report.failures.push(ShutdownFailureRecord {
                    rank,
                    detail: format!("spawn failed: {err}"),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;

    use super::ShutdownOrchestrator;
    use crate::config::HarnessConfig;
    use crate::invoke::{ClientInvoker, ClientOutput, ClientRequest};

    /// Records every shutdown target; fails the ranks it is told to.
    struct RecordingInvoker {
        ranks_seen: Mutex<Vec<u32>>,
        fail_ranks: Vec<u32>,
        spawn_error_ranks: Vec<u32>,
    }

    impl RecordingInvoker {
        fn new() -> Self {
            Self {
                ranks_seen: Mutex::new(Vec::new()),
                fail_ranks: Vec::new(),
                spawn_error_ranks: Vec::new(),
            }
        }

        fn rank_of(request: &ClientRequest) -> u32 {
            let pos = request.command.iter().position(|a| a == "-r").expect("-r");
            request.command[pos + 1].parse().expect("rank arg")
        }
    }

    impl ClientInvoker for RecordingInvoker {
        fn invoke(&self, request: &ClientRequest) -> io::Result<ClientOutput> {
            let rank = Self::rank_of(request);
            self.ranks_seen.lock().expect("lock").push(rank);
            if self.spawn_error_ranks.contains(&rank) {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such binary"));
            }
            let exit_code = i32::from(self.fail_ranks.contains(&rank));
            Ok(ClientOutput {
                exit_code,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn config(rank_count: u32) -> HarnessConfig {
        HarnessConfig {
            rank_count,
            ..HarnessConfig::without_delays()
        }
    }

    #[test]
    fn ranks_go_down_in_descending_order_root_last() {
        let invoker = RecordingInvoker::new();
        let config = config(5);
        let report = ShutdownOrchestrator::new(&config, &invoker).run();

        assert_eq!(*invoker.ranks_seen.lock().expect("lock"), [4, 3, 2, 1, 0]);
        assert_eq!(report.attempted, [4, 3, 2, 1, 0]);
        assert!(report.clean());
    }

    #[test]
    fn failures_never_stop_later_ranks() {
        let invoker = RecordingInvoker {
            fail_ranks: vec![3],
            spawn_error_ranks: vec![2],
            ..RecordingInvoker::new()
        };
        let config = config(5);
        let report = ShutdownOrchestrator::new(&config, &invoker).run();

        // Every rank was still attempted, root still last.
        assert_eq!(report.attempted, [4, 3, 2, 1, 0]);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].rank, 3);
        assert_eq!(report.failures[1].rank, 2);
        assert!(report.failures[1].detail.contains("spawn failed"));
    }

    #[test]
    fn single_rank_group_only_shuts_down_the_root() {
        let invoker = RecordingInvoker::new();
        let config = config(1);
        let report = ShutdownOrchestrator::new(&config, &invoker).run();
        assert_eq!(report.attempted, [0]);
    }

    #[test]
    fn empty_group_is_a_no_op() {
        let invoker = RecordingInvoker::new();
        let config = config(0);
        let report = ShutdownOrchestrator::new(&config, &invoker).run();
        assert!(report.attempted.is_empty());
    }
}
