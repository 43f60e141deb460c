//! Server lifecycle collaborator.
//!
//! The cache's server group is launched and stopped by an external
//! process-group manager; the oracle treats it as opaque. All it needs is
//! that launching is asynchronous (the call returns once the group is
//! spawned, not once it is ready — the launch settle delay covers the
//! gap) and that liveness can be answered synchronously.

use std::io;
use std::process::{Child, Command, Stdio};

use ivcheck_error::{IvError, Result};
use tracing::{info, warn};

/// Handle on the external server group.
pub trait ServerLifecycle {
    /// Spawn the group in the background.
    ///
    /// # Errors
    ///
    /// `IvError::Config` when no launcher is configured,
    /// `IvError::Io` when the spawn itself fails.
    fn launch(&mut self) -> Result<()>;

    /// Whether the group is still running. Answers synchronously.
    fn check_running(&mut self) -> bool;

    /// Stop the group if it is still up; returns its exit code.
    ///
    /// # Errors
    ///
    /// `IvError::Io` when the process cannot be signalled or reaped.
    fn stop(&mut self) -> Result<i32>;
}

/// `Command`-backed lifecycle: one launcher process owning the group.
#[derive(Debug)]
pub struct ProcessGroupLifecycle {
    launcher: Vec<String>,
    child: Option<Child>,
}

impl ProcessGroupLifecycle {
    /// `launcher[0]` is the program, the rest its arguments.
    #[must_use]
    pub fn new(launcher: Vec<String>) -> Self {
        Self {
            launcher,
            child: None,
        }
    }
}

impl ServerLifecycle for ProcessGroupLifecycle {
    fn launch(&mut self) -> Result<()> {
        let Some((program, args)) = self.launcher.split_first() else {
            return Err(IvError::Config {
                reason: "server launcher command is empty".to_owned(),
            });
        };
        info!(command = %self.launcher.join(" "), "launching server group");
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()?;
        self.child = Some(child);
        Ok(())
    }

    fn check_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    warn!(%status, "server group exited on its own");
                    false
                }
                Err(err) => {
                    warn!(error = %err, "cannot query server group");
                    false
                }
            },
            None => false,
        }
    }

    fn stop(&mut self) -> Result<i32> {
        let Some(mut child) = self.child.take() else {
            return Ok(0);
        };
        // Already exited? Reap without killing.
        if let Some(status) = child.try_wait()? {
            return Ok(status.code().unwrap_or(-1));
        }
        match child.kill() {
            Ok(()) => {}
            // Lost the race with its own exit.
            Err(err) if err.kind() == io::ErrorKind::InvalidInput => {}
            Err(err) => return Err(IvError::Io(err)),
        }
        let status = child.wait()?;
        Ok(status.code().unwrap_or(-1))
    }
}

#[cfg(test)]
mod tests {
    use super::{ProcessGroupLifecycle, ServerLifecycle};

    #[test]
    fn empty_launcher_is_a_config_error() {
        let mut lifecycle = ProcessGroupLifecycle::new(Vec::new());
        let err = lifecycle.launch().unwrap_err();
        assert_eq!(err.kind_label(), "config");
    }

    #[test]
    fn unlaunched_group_is_not_running_and_stops_cleanly() {
        let mut lifecycle = ProcessGroupLifecycle::new(vec!["srv".to_owned()]);
        assert!(!lifecycle.check_running());
        assert_eq!(lifecycle.stop().expect("nothing to stop"), 0);
    }
}
