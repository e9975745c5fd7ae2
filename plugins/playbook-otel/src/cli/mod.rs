//! CLI module for the playbook correlator
//!
//! This module provides the `replay` command: feed a recorded JSON-lines
//! stream of lifecycle events through the correlator and print the
//! resulting span tree, or write the exported records as JSON lines.

pub mod commands;
pub mod output;

pub use commands::{ReplayCli, ReplayCommands};
pub use output::{OutputFormat, ReplaySummary};

use thiserror::Error;

/// Errors surfaced to the CLI user
#[derive(Error, Debug)]
pub enum CliError {
    /// Malformed event stream or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File access or I/O error
    #[error("File error: {0}")]
    File(#[from] std::io::Error),
}

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Replay finished and every event correlated cleanly
    Success = 0,
    /// Replay finished but anomalies were recorded
    Anomalies = 2,
    /// Invalid input or arguments
    InvalidInput = 3,
    /// File not found or inaccessible
    FileError = 4,
    /// Internal error
    InternalError = 10,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Determine exit code from the number of recorded anomalies
    pub fn from_anomalies(count: usize) -> Self {
        if count == 0 {
            ExitCode::Success
        } else {
            ExitCode::Anomalies
        }
    }

    /// Map a command error to an exit code
    pub fn from_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<CliError>() {
            Some(CliError::InvalidInput(_)) => ExitCode::InvalidInput,
            Some(CliError::File(_)) => ExitCode::FileError,
            None => ExitCode::InternalError,
        }
    }
}

/// Run the CLI with the given arguments and return the exit code
pub fn run(cli: ReplayCli) -> anyhow::Result<ExitCode> {
    match cli.command {
        ReplayCommands::Replay {
            input,
            format,
            output,
            metrics,
        } => commands::execute_replay(&input, format, output.as_deref(), metrics),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_code_conversion() {
        assert_eq!(i32::from(ExitCode::Success), 0);
        assert_eq!(i32::from(ExitCode::Anomalies), 2);
        assert_eq!(i32::from(ExitCode::InternalError), 10);
    }

    #[test]
    fn test_exit_code_from_anomalies() {
        assert_eq!(ExitCode::from_anomalies(0), ExitCode::Success);
        assert_eq!(ExitCode::from_anomalies(3), ExitCode::Anomalies);
    }

    #[test]
    fn test_exit_code_from_error_through_context() {
        let err = Err::<(), _>(CliError::InvalidInput("line 3".into()))
            .context("reading events")
            .unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::InvalidInput);

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = anyhow::Error::from(CliError::from(io));
        assert_eq!(ExitCode::from_error(&err), ExitCode::FileError);

        let other = anyhow::anyhow!("boom");
        assert_eq!(ExitCode::from_error(&other), ExitCode::InternalError);
    }
}
