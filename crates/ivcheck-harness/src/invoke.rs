//! Client invocation: argv construction and process execution.
//!
//! The client binary accepts
//! `-o <operation> -r <rank> -k <rank>:<index> [-v <value>] [-s <sync>]
//! [-l <result_path>] [-m <timestamp>]`. [`ClientRequest`] owns one
//! constructor per operation so the argv shape for each is explicit and
//! testable. [`ClientInvoker`] is the seam between the engine and the
//! operating system; the default [`ProcessClientInvoker`] spawns real
//! processes, tests substitute a scripted cache model.

use std::fmt;
use std::io;
use std::path::Path;
use std::process::Command;

use ivcheck_types::{IvKey, SyncMode};
use tracing::debug;

use crate::config::HarnessConfig;

/// Cap on captured stdout/stderr carried into reports.
const SNIPPET_MAX: usize = 4096;

/// One fully-formed client invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
    /// Complete command line; `command[0]` is the program.
    pub command: Vec<String>,
}

impl ClientRequest {
    fn base(config: &HarnessConfig, operation: &str, rank: u32) -> Vec<String> {
        let mut command = config.client_prefix.clone();
        command.push(config.client_bin.to_string_lossy().into_owned());
        command.push("-o".to_owned());
        command.push(operation.to_owned());
        command.push("-r".to_owned());
        command.push(rank.to_string());
        command
    }

    fn push_key(command: &mut Vec<String>, key: IvKey) {
        command.push("-k".to_owned());
        command.push(key.to_string());
    }

    /// `fetch` — the result file named by `-l` carries the echo to verify.
    #[must_use]
    pub fn fetch(config: &HarnessConfig, rank: u32, key: IvKey, result_path: &Path) -> Self {
        let mut command = Self::base(config, "fetch", rank);
        Self::push_key(&mut command, key);
        command.push("-l".to_owned());
        command.push(result_path.to_string_lossy().into_owned());
        Self { command }
    }

    /// `update` — write a value with the given sync mode.
    #[must_use]
    pub fn update(
        config: &HarnessConfig,
        rank: u32,
        key: IvKey,
        value: &str,
        sync: SyncMode,
    ) -> Self {
        let mut command = Self::base(config, "update", rank);
        Self::push_key(&mut command, key);
        command.push("-v".to_owned());
        command.push(value.to_owned());
        command.push("-s".to_owned());
        command.push(sync.as_str().to_owned());
        Self { command }
    }

    /// `invalidate` — drop an entry with the given sync mode.
    #[must_use]
    pub fn invalidate(config: &HarnessConfig, rank: u32, key: IvKey, sync: SyncMode) -> Self {
        let mut command = Self::base(config, "invalidate", rank);
        Self::push_key(&mut command, key);
        command.push("-s".to_owned());
        command.push(sync.as_str().to_owned());
        Self { command }
    }

    /// `set_grp_version` — force a rank's group version (`-v` hex) at a
    /// given timestamp (`-m`).
    #[must_use]
    pub fn set_grp_version(config: &HarnessConfig, rank: u32, version: u32, timestamp: u64) -> Self {
        let mut command = Self::base(config, "set_grp_version", rank);
        command.push("-v".to_owned());
        command.push(format!("0x{version:x}"));
        command.push("-m".to_owned());
        command.push(timestamp.to_string());
        Self { command }
    }

    /// `get_grp_version` — read back a rank's group version.
    #[must_use]
    pub fn get_grp_version(config: &HarnessConfig, rank: u32) -> Self {
        Self {
            command: Self::base(config, "get_grp_version", rank),
        }
    }

    /// `shutdown` — ask one rank to shut down.
    #[must_use]
    pub fn shutdown(config: &HarnessConfig, rank: u32) -> Self {
        Self {
            command: Self::base(config, "shutdown", rank),
        }
    }
}

impl fmt::Display for ClientRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command.join(" "))
    }
}

/// Captured outcome of one client process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOutput {
    /// Process exit code; `-1` when terminated by a signal.
    pub exit_code: i32,
    /// Stdout, truncated to 4 KiB.
    pub stdout: String,
    /// Stderr, truncated to 4 KiB.
    pub stderr: String,
}

impl ClientOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Abstraction over running one client invocation to completion.
///
/// The engine only ever runs one invocation at a time and blocks on it;
/// implementations need no concurrency story.
pub trait ClientInvoker {
    /// Run the request and wait for the process to terminate.
    ///
    /// # Errors
    ///
    /// `io::Error` when the process cannot be spawned at all; a process
    /// that runs and exits non-zero is reported through
    /// [`ClientOutput::exit_code`], not as an error.
    fn invoke(&self, request: &ClientRequest) -> io::Result<ClientOutput>;
}

/// Default process-backed invoker.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessClientInvoker;

impl ClientInvoker for ProcessClientInvoker {
    fn invoke(&self, request: &ClientRequest) -> io::Result<ClientOutput> {
        let Some((program, args)) = request.command.split_first() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty client command",
            ));
        };

        debug!(command = %request, "invoking client");
        let output = Command::new(program).args(args).output()?;

        Ok(ClientOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: truncate_snippet(&String::from_utf8_lossy(&output.stdout)),
            stderr: truncate_snippet(&String::from_utf8_lossy(&output.stderr)),
        })
    }
}

/// Truncate captured process output to a report-friendly snippet.
fn truncate_snippet(text: &str) -> String {
    if text.len() <= SNIPPET_MAX {
        return text.to_owned();
    }
    let mut end = SNIPPET_MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_owned()
}

#[cfg(test)]
mod tests {
    use ivcheck_types::{IvKey, SyncMode};

    use super::{ClientRequest, truncate_snippet};
    use crate::config::HarnessConfig;

    fn config() -> HarnessConfig {
        HarnessConfig {
            client_bin: "tests/iv_client".into(),
            ..HarnessConfig::default()
        }
    }

    #[test]
    fn fetch_argv_names_the_result_file() {
        let request = ClientRequest::fetch(
            &config(),
            1,
            IvKey::new(4, 42),
            std::path::Path::new("/shared/result.json"),
        );
        assert_eq!(
            request.command,
            [
                "tests/iv_client",
                "-o",
                "fetch",
                "-r",
                "1",
                "-k",
                "4:42",
                "-l",
                "/shared/result.json",
            ]
        );
    }

    #[test]
    fn update_argv_carries_value_and_sync() {
        let request =
            ClientRequest::update(&config(), 0, IvKey::new(4, 42), "turnip", SyncMode::None);
        assert_eq!(
            request.command,
            ["tests/iv_client", "-o", "update", "-r", "0", "-k", "4:42", "-v", "turnip", "-s", "none"]
        );
    }

    #[test]
    fn invalidate_argv_carries_sync() {
        let request =
            ClientRequest::invalidate(&config(), 4, IvKey::new(4, 42), SyncMode::EagerNotify);
        assert_eq!(
            request.command,
            ["tests/iv_client", "-o", "invalidate", "-r", "4", "-k", "4:42", "-s", "eager_notify"]
        );
    }

    #[test]
    fn set_grp_version_renders_hex_version() {
        let request = ClientRequest::set_grp_version(&config(), 0, 0xdead_c0de, 2);
        assert_eq!(
            request.command,
            ["tests/iv_client", "-o", "set_grp_version", "-r", "0", "-v", "0xdeadc0de", "-m", "2"]
        );
    }

    #[test]
    fn bare_operations_have_no_extra_args() {
        let request = ClientRequest::get_grp_version(&config(), 3);
        assert_eq!(
            request.command,
            ["tests/iv_client", "-o", "get_grp_version", "-r", "3"]
        );

        let request = ClientRequest::shutdown(&config(), 0);
        assert_eq!(request.command, ["tests/iv_client", "-o", "shutdown", "-r", "0"]);
    }

    #[test]
    fn launcher_prefix_precedes_the_client() {
        let config = HarnessConfig {
            client_prefix: vec!["orterun".to_owned(), "-np".to_owned(), "1".to_owned()],
            client_bin: "iv_client".into(),
            ..HarnessConfig::default()
        };
        let request = ClientRequest::shutdown(&config, 2);
        assert_eq!(
            request.command[..4],
            ["orterun", "-np", "1", "iv_client"]
        );
    }

    #[test]
    fn snippets_respect_char_boundaries() {
        let text = "é".repeat(3000);
        let snippet = truncate_snippet(&text);
        assert!(snippet.len() <= 4096);
        assert!(text.starts_with(&snippet));
    }
}
