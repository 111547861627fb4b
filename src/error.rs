//! Error types for running processes and capturing their output.

use std::borrow::Cow;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when terminating a process.
#[derive(Debug, Error)]
pub enum TerminationError {
    /// Failed to terminate the process after trying all signals (SIGINT, SIGTERM, SIGKILL).
    #[error(
        "Failed to terminate process '{process_name}'. SIGINT failed: {sigint_error}. SIGTERM failed: {sigterm_error}. SIGKILL failed: {sigkill_error}"
    )]
    TerminationFailed {
        /// The name of the process.
        process_name: Cow<'static, str>,
        /// Error from SIGINT attempt.
        sigint_error: String,
        /// Error from SIGTERM attempt.
        sigterm_error: String,
        /// Error from SIGKILL attempt.
        #[source]
        sigkill_error: io::Error,
    },
}

/// Errors that can occur when spawning a process.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// Failed to create the pipe receiving the process output.
    #[error("Failed to set up output capture for process '{process_name}': {source}")]
    CaptureSetupFailed {
        /// The name of the process.
        process_name: Cow<'static, str>,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Failed to spawn the process.
    #[error("Failed to spawn process '{process_name}': {source}")]
    SpawnFailed {
        /// The name of the process.
        process_name: Cow<'static, str>,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Errors that can occur when waiting for a process and its output.
#[derive(Debug, Error)]
pub enum WaitError {
    /// A general IO error occurred.
    #[error("IO error occurred while waiting for process '{process_name}': {source}")]
    IoError {
        /// The name of the process.
        process_name: Cow<'static, str>,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The process did not exit and close its output within the timeout. It was terminated.
    #[error("Process '{process_name}' did not complete within {timeout:?}")]
    Timeout {
        /// The name of the process.
        process_name: Cow<'static, str>,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// The task reading the process output panicked or was cancelled.
    #[error("Output reader of process '{process_name}' failed: {source}")]
    ReaderFailed {
        /// The name of the process.
        process_name: Cow<'static, str>,
        /// The underlying join error.
        #[source]
        source: tokio::task::JoinError,
    },

    /// Output was already taken by an earlier wait.
    #[error("Output of process '{process_name}' was already collected")]
    OutputAlreadyCollected {
        /// The name of the process.
        process_name: Cow<'static, str>,
    },

    /// Could not terminate the process after a timeout.
    #[error("Could not terminate process: {0}")]
    TerminationError(#[from] TerminationError),
}

/// Errors of a complete run: spawn, capture, exit code check.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    Wait(#[from] WaitError),

    /// The process exited with a code its [crate::ExitCodePolicy] does not accept.
    #[error("Return code is {}. Check the logs:\nvvvvv\n{output}\n^^^^^\n", describe_code(.code))]
    UnacceptedExitCode {
        /// The name of the process.
        process_name: Cow<'static, str>,
        /// The exit code, `None` if the process was terminated by a signal.
        code: Option<i32>,
        /// Everything the process wrote.
        output: String,
    },
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "<none, terminated by signal>".to_owned(),
    }
}
