use crate::age::MaxAge;
use crate::env::EnvOverrides;
use crate::error::RunError;
use crate::exit_code::ExitCodePolicy;
use crate::output::CapturedOutput;
use crate::process::{Executable, Invocation};
use std::time::Duration;

/// Flag making the service remove old reports before doing anything else.
pub const CLEANUP_ON_STARTUP_FLAG: &str = "--cleanup-on-startup";

/// How the notification service under test is started in a scenario.
///
/// Steps preceding the start (`max-age ... is specified`, `cleanup-on-startup ... is specified`,
/// environment tables) configure this value; starting it returns the captured output for the
/// steps that follow.
#[derive(Debug, Clone)]
pub struct NotificationService {
    executable: Executable,
    max_age: Option<MaxAge>,
    cleanup_on_startup: bool,
    env: EnvOverrides,
    exit_codes: ExitCodePolicy,
    timeout: Option<Duration>,
}

impl NotificationService {
    /// The service may exit because its dependencies are unavailable, see
    /// [ExitCodePolicy::dependency_unavailable].
    pub fn new(executable: impl Into<Executable>) -> Self {
        Self {
            executable: executable.into(),
            max_age: None,
            cleanup_on_startup: false,
            env: EnvOverrides::new(),
            exit_codes: ExitCodePolicy::dependency_unavailable(),
            timeout: None,
        }
    }

    pub fn with_max_age(mut self, max_age: MaxAge) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn with_cleanup_on_startup(mut self) -> Self {
        self.cleanup_on_startup = true;
        self
    }

    /// Adds environment overrides. Called multiple times, later overrides win.
    pub fn with_env(mut self, overrides: &EnvOverrides) -> Self {
        for (name, value) in overrides.iter() {
            self.env.set(name, value);
        }
        self
    }

    pub fn with_exit_codes(mut self, policy: ExitCodePolicy) -> Self {
        self.exit_codes = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments after the leading arguments of the executable: the flag to start with, followed by
    /// the max age and cleanup flags when configured.
    pub fn command_line(&self, flag: &str) -> Vec<String> {
        let mut args = vec![flag.to_owned()];
        if let Some(max_age) = &self.max_age {
            args.push(max_age.to_flag());
        }
        if self.cleanup_on_startup {
            args.push(CLEANUP_ON_STARTUP_FLAG.to_owned());
        }
        args
    }

    pub fn invocation(&self, flag: &str) -> Invocation {
        Invocation::new(self.executable.clone())
            .args(self.command_line(flag))
            .envs(&self.env)
            .exit_codes(self.exit_codes.clone())
            .maybe_timeout(self.timeout)
    }

    /// Starts the service with the given command line flag and waits for it to finish.
    pub async fn start_with_flag(&self, flag: &str) -> Result<CapturedOutput, RunError> {
        tracing::info!(service = %self.executable, flag, "Starting notification service");
        self.invocation(flag).run().await
    }
}
