mod age;
pub mod checks;
mod config;
mod env;
mod error;
mod exit_code;
pub mod message_bus;
mod normalize;
mod output;
mod process;
mod process_handle;
mod service;
pub mod service_log;
mod signal;
mod table;

pub use age::{AgeError, MaxAge, parse_max_age};
pub use checks::CheckError;
pub use config::{ConfigError, EnvSource, HarnessConfig, ProcessEnv};
pub use env::EnvOverrides;
pub use error::{RunError, SpawnError, TerminationError, WaitError};
pub use exit_code::{
    CONTENT_SERVICE_UNAVAILABLE, ExitCodePolicy, KAFKA_BROKER_UNAVAILABLE,
    PUSH_GATEWAY_UNAVAILABLE,
};
pub use message_bus::{KafkacatReader, MessageBusConfig};
pub use normalize::{COVERAGE_MESSAGE, filter_coverage_message, normalize_lines};
pub use output::CapturedOutput;
pub use process::{Executable, Invocation};
pub use process_handle::{DEFAULT_SHUTDOWN_TIMEOUT, ProcessHandle, RunningState};
pub use service::{CLEANUP_ON_STARTUP_FLAG, NotificationService};
pub use service_log::{ClusterLog, ServiceLogClient, ServiceLogError};
pub use table::{Row, ScenarioTable, TableError};

#[cfg(all(test, unix))]
mod test {
    use crate::checks::{check_help, check_old_reports_cleanup, check_status_code};
    use crate::{
        COVERAGE_MESSAGE, EnvOverrides, Executable, NotificationService, ProcessHandle,
        RunningState, ScenarioTable, parse_max_age,
    };
    use assertr::prelude::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;
    use tokio::process::Command;

    #[tokio::test]
    async fn is_running() {
        let mut cmd = Command::new("sleep");
        cmd.arg("1");
        let mut process =
            ProcessHandle::spawn("sleep", cmd).expect("Failed to spawn `sleep` command");

        match process.is_running() {
            RunningState::Running => {}
            RunningState::Terminated(exit_status) => {
                assert_that(exit_status).fail("Process should be running");
            }
            RunningState::Uncertain(_) => {
                assert_that_ref(&process).fail("Process state should not be uncertain");
            }
        };

        let (exit_status, _output) = process.wait_for_completion_with_output(None).await.unwrap();
        assert_that(exit_status.success()).is_true();

        match process.is_running() {
            RunningState::Running => {
                assert_that(process).fail("Process should not be running anymore");
            }
            RunningState::Terminated(exit_status) => {
                assert_that(exit_status.code()).is_some().is_equal_to(0);
            }
            RunningState::Uncertain(_) => {
                assert_that(process).fail("Process state should not be uncertain");
            }
        };
    }

    #[tokio::test]
    async fn terminate() {
        let mut cmd = Command::new("sleep");
        cmd.arg("1000");
        let mut process =
            ProcessHandle::spawn("sleep", cmd).expect("Failed to spawn `sleep` command");
        process
            .terminate(Duration::from_secs(1), Duration::from_secs(1))
            .await
            .unwrap();
        match process.is_running() {
            RunningState::Running => {
                assert_that(process).fail("Process should not be running anymore");
            }
            RunningState::Terminated(exit_status) => {
                // Terminating a process with a signal results in no code being emitted (on linux).
                assert_that(exit_status.code()).is_none();
                assert_that(exit_status.success()).is_false();
            }
            RunningState::Uncertain(_) => {
                assert_that(process).fail("Process state should not be uncertain");
            }
        };
    }

    /// Behaves like the notification service for `--help` and `--old-reports-cleanup`, printing
    /// the coverage warning first like an instrumented build does.
    fn fake_service() -> NamedTempFile {
        let script = format!(
            r#"echo '{COVERAGE_MESSAGE}'
case "$1" in
  --help)
    for flag in cleanup-on-startup instant-reports 'max-age string' new-reports-cleanup \
        old-reports-cleanup print-new-reports-for-cleanup print-old-reports-for-cleanup \
        show-authors show-configuration show-version weekly-reports; do
      printf '  -%s\n    \tdescription\n' "$flag"
    done
    ;;
  --old-reports-cleanup)
    echo "Cleanup operation for all organizations" >&2
    echo "DELETE FROM reported WHERE updated_at < NOW() - '${{2#--max-age=}}'::INTERVAL"
    echo 'Cleanup `reported` finished' >&2
    if [ "$CCX_NOTIFICATION_SERVICE__KAFKA_BROKER__ENABLED" = "true" ]; then exit 5; fi
    ;;
esac
"#
        );
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(script.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn help_scenario() {
        let script = fake_service();
        let service = NotificationService::new(
            Executable::new("sh").with_leading_args([script.path().to_string_lossy()]),
        );

        let output = service.start_with_flag("--help").await.unwrap();

        check_status_code(&output, 0).unwrap();
        check_help(&output).unwrap();
    }

    #[tokio::test]
    async fn cleanup_scenario() {
        let script = fake_service();
        let env = ScenarioTable::parse(
            "| val                                             | var  |
             | CCX_NOTIFICATION_SERVICE__KAFKA_BROKER__ENABLED | true |",
        )
        .unwrap();
        let max_age = parse_max_age("\"90 days\"").unwrap();
        let service = NotificationService::new(
            Executable::new("sh").with_leading_args([script.path().to_string_lossy()]),
        )
        .with_max_age(max_age.clone())
        .with_env(&EnvOverrides::from_table(&env).unwrap());

        let output = service.start_with_flag("--old-reports-cleanup").await.unwrap();

        check_status_code(&output, 5).unwrap();
        check_old_reports_cleanup(&output, &max_age).unwrap();
    }
}
