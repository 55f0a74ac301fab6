//! Command execution port for the OS address facilities.
//!
//! Address changes and interface inspection go through iproute2's `ip`
//! binary. The [`CommandRunner`] trait keeps process spawning behind a
//! narrow seam so the configurator can run against a fake in tests.

use std::fmt;
use std::io;
use std::process::Command;
use tracing::debug;

/// Exit status `ip` uses when the address already exists on add, or is
/// already gone on delete.
pub const EXIT_ALREADY_IN_DESIRED_STATE: i32 = 2;

/// Default iproute2 binary (resolved through PATH)
pub const DEFAULT_IP_BINARY: &str = "ip";

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a command that exited with `code` and printed nothing.
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs an external program to completion.
///
/// `Err` means the program could not be launched at all.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;
}

/// Spawns real processes with `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        debug!(program, ?args, "Running command");

        let output = Command::new(program).args(args).output()?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Requested address mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressAction {
    Add,
    Delete,
}

impl AddressAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressAction::Add => "add",
            AddressAction::Delete => "delete",
        }
    }
}

impl fmt::Display for AddressAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Argument builder for the iproute2 `ip` binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpCommand {
    binary: String,
}

impl Default for IpCommand {
    fn default() -> Self {
        Self::new(DEFAULT_IP_BINARY)
    }
}

impl IpCommand {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// `ip addr <add|delete> <cidr> dev <interface>`
    pub fn address_args(&self, action: AddressAction, cidr: &str, interface: &str) -> Vec<String> {
        vec![
            "addr".to_string(),
            action.as_str().to_string(),
            cidr.to_string(),
            "dev".to_string(),
            interface.to_string(),
        ]
    }

    /// `ip -4 addr show dev <interface>`
    pub fn show_args(&self, interface: &str) -> Vec<String> {
        vec![
            "-4".to_string(),
            "addr".to_string(),
            "show".to_string(),
            "dev".to_string(),
            interface.to_string(),
        ]
    }
}

/// Classified result of an add/delete command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The change was applied
    Success,
    /// Nothing to do, the requested state already held
    AlreadyInDesiredState,
    /// Anything else, with a human-readable cause
    Failed(String),
}

impl CommandOutcome {
    pub fn classify(result: io::Result<CommandOutput>) -> Self {
        let output = match result {
            Ok(output) => output,
            Err(e) => return CommandOutcome::Failed(format!("launch failed: {e}")),
        };

        match output.code {
            Some(0) => CommandOutcome::Success,
            Some(EXIT_ALREADY_IN_DESIRED_STATE) => CommandOutcome::AlreadyInDesiredState,
            Some(code) => {
                let stderr = output.stderr.trim();
                if stderr.is_empty() {
                    CommandOutcome::Failed(format!("exit status {code}"))
                } else {
                    CommandOutcome::Failed(format!("exit status {code}: {stderr}"))
                }
            }
            None => CommandOutcome::Failed("terminated by signal".to_string()),
        }
    }

    /// Both `Success` and `AlreadyInDesiredState` satisfy the postcondition.
    pub fn is_success(&self) -> bool {
        !matches!(self, CommandOutcome::Failed(_))
    }
}
