//! Builder API for running a process to completion and capturing its output.

use crate::env::EnvOverrides;
use crate::error::RunError;
use crate::exit_code::ExitCodePolicy;
use crate::output::CapturedOutput;
use crate::process_handle::{DEFAULT_SHUTDOWN_TIMEOUT, ProcessHandle};
use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// A program to launch, optionally with arguments that always precede the per-run arguments.
///
/// Leading arguments allow launching tools through a wrapper, for example `sh ./fake-kafkacat.sh`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executable {
    program: String,
    leading_args: Vec<String>,
}

impl Executable {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Splits a command line on whitespace. The first word is the program. Returns `None` for a
    /// blank command line.
    ///
    /// No shell quoting is supported.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut words = command_line.split_whitespace();
        let program = words.next()?;
        Some(Self::new(program).with_leading_args(words))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn leading_args(&self) -> &[String] {
        &self.leading_args
    }
}

impl From<&str> for Executable {
    fn from(program: &str) -> Self {
        Self::new(program)
    }
}

impl From<String> for Executable {
    fn from(program: String) -> Self {
        Self::new(program)
    }
}

impl Display for Executable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.leading_args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// A single run of an external program: what to start, with which arguments and environment, how
/// long to wait for it, and which exit codes are acceptable.
///
/// # Examples
///
/// ```no_run
/// use notification_acceptance::{ExitCodePolicy, Invocation, RunError};
/// use std::time::Duration;
///
/// # async fn show_version() -> Result<(), RunError> {
/// let output = Invocation::new("ccx-notification-service")
///     .arg("--show-version")
///     .env("CCX_NOTIFICATION_SERVICE__KAFKA_BROKER__ENABLED", "false")
///     .timeout(Duration::from_secs(30))
///     .exit_codes(ExitCodePolicy::success_only())
///     .run()
///     .await?;
///
/// assert!(output.contains_line("Notification service version 1.0"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Invocation {
    executable: Executable,
    args: Vec<String>,
    env: EnvOverrides,
    name: Option<Cow<'static, str>>,
    timeout: Option<Duration>,
    interrupt_timeout: Duration,
    terminate_timeout: Duration,
    exit_codes: ExitCodePolicy,
    filter_coverage_message: bool,
}

impl Invocation {
    /// Without further configuration, the run has no timeout, accepts every exit code and filters
    /// the coverage warning from the captured lines.
    pub fn new(executable: impl Into<Executable>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            env: EnvOverrides::new(),
            name: None,
            timeout: None,
            interrupt_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            terminate_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            exit_codes: ExitCodePolicy::Any,
            filter_coverage_message: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets one variable on top of the inherited environment.
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.set(name, value);
        self
    }

    /// Sets all `overrides` on top of the inherited environment.
    pub fn envs(mut self, overrides: &EnvOverrides) -> Self {
        for (name, value) in overrides.iter() {
            self.env.set(name, value);
        }
        self
    }

    /// Name used in logs and errors. Derived from the command line when not set.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Upper bound for the process to exit and close its output. Afterward, it gets terminated.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn maybe_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// See [ProcessHandle::terminate].
    pub fn shutdown_timeouts(
        mut self,
        interrupt_timeout: Duration,
        terminate_timeout: Duration,
    ) -> Self {
        self.interrupt_timeout = interrupt_timeout;
        self.terminate_timeout = terminate_timeout;
        self
    }

    pub fn exit_codes(mut self, policy: ExitCodePolicy) -> Self {
        self.exit_codes = policy;
        self
    }

    /// Whether [crate::COVERAGE_MESSAGE] lines are dropped from [CapturedOutput::lines].
    pub fn filter_coverage_message(mut self, filter: bool) -> Self {
        self.filter_coverage_message = filter;
        self
    }

    /// All arguments handed to the program, leading arguments first.
    pub fn command_line(&self) -> Vec<String> {
        self.executable
            .leading_args()
            .iter()
            .chain(self.args.iter())
            .cloned()
            .collect()
    }

    /// Name in the form `program "arg" "arg"`, unless one was set explicitly.
    pub fn name(&self) -> Cow<'static, str> {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let mut name = self.executable.program().to_owned();
        for arg in self.command_line() {
            name.push_str(" \"");
            name.push_str(&arg);
            name.push('"');
        }
        name.into()
    }

    /// Runs the process to completion.
    ///
    /// Fails when the process cannot be started, does not complete in time, or exits with a code
    /// the configured [ExitCodePolicy] rejects.
    pub async fn run(self) -> Result<CapturedOutput, RunError> {
        let name = self.name();

        let mut cmd = tokio::process::Command::new(self.executable.program());
        cmd.args(self.command_line());
        self.env.apply(&mut cmd);

        tracing::debug!(process = %name, timeout = ?self.timeout, "Running process");
        let mut handle = ProcessHandle::spawn(name.clone(), cmd)?
            .with_shutdown_timeouts(self.interrupt_timeout, self.terminate_timeout);
        let (status, raw) = handle.wait_for_completion_with_output(self.timeout).await?;

        let output = CapturedOutput::new(status, raw, self.filter_coverage_message);
        if !self.exit_codes.accepts(output.exit_code()) {
            return Err(RunError::UnacceptedExitCode {
                process_name: name,
                code: output.exit_code(),
                output: output.text().into_owned(),
            });
        }

        tracing::info!(process = %name, code = ?output.exit_code(), "Process finished");
        Ok(output)
    }
}
