use crate::error::{SpawnError, TerminationError, WaitError};
use crate::signal::{self, ShutdownSignal};
use bytes::{Bytes, BytesMut};
use std::borrow::Cow;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// Number of bytes the output reader makes room for before every read.
const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Default time a process gets to exit after `SIGINT`, then again after `SIGTERM`.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Represents the running state of a process.
#[derive(Debug)]
pub enum RunningState {
    /// The process is still running.
    Running,

    /// The process has terminated with the given exit status.
    Terminated(ExitStatus),

    /// Failed to determine process state.
    Uncertain(io::Error),
}

type OutputReader = JoinHandle<io::Result<Bytes>>;

/// A spawned process whose standard output and standard error are drained into one buffer by a
/// background task, so that the process never blocks on a full pipe.
///
/// The process is killed when this handle is dropped while it is still running.
#[derive(Debug)]
pub struct ProcessHandle {
    name: Cow<'static, str>,
    child: Child,
    output_reader: Option<OutputReader>,
    interrupt_timeout: Duration,
    terminate_timeout: Duration,
}

impl ProcessHandle {
    /// Spawns `cmd`, taking over its stdin, stdout and stderr configuration.
    ///
    /// Stdin is closed. On unix, stdout and stderr are one pipe, so the captured output interleaves
    /// exactly like it would on a terminal. Elsewhere, stderr is appended after stdout.
    pub fn spawn(
        name: impl Into<Cow<'static, str>>,
        mut cmd: Command,
    ) -> Result<Self, SpawnError> {
        let name = name.into();

        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        let capture =
            OutputCapture::attach(&mut cmd).map_err(|source| SpawnError::CaptureSetupFailed {
                process_name: name.clone(),
                source,
            })?;

        let mut child = cmd.spawn().map_err(|source| SpawnError::SpawnFailed {
            process_name: name.clone(),
            source,
        })?;
        // `cmd` still holds our copies of the pipe's write ends. Reading only ends once they are
        // closed.
        drop(cmd);

        tracing::debug!(process = %name, pid = ?child.id(), "Spawned process");

        let output_reader = capture.start(&mut child);
        Ok(Self {
            name,
            child,
            output_reader: Some(output_reader),
            interrupt_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            terminate_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        })
    }

    /// How long the process gets to exit after each graceful shutdown signal, when it has to be
    /// terminated after exceeding its timeout.
    pub fn with_shutdown_timeouts(
        mut self,
        interrupt_timeout: Duration,
        terminate_timeout: Duration,
    ) -> Self {
        self.interrupt_timeout = interrupt_timeout;
        self.terminate_timeout = terminate_timeout;
        self
    }

    //noinspection RsSelfConvention
    pub fn is_running(&mut self) -> RunningState {
        match self.child.try_wait() {
            Ok(None) => RunningState::Running,
            Ok(Some(exit_status)) => RunningState::Terminated(exit_status),
            Err(err) => RunningState::Uncertain(err),
        }
    }

    /// Waits for the process to exit and for its output to reach end-of-stream.
    ///
    /// Without a `timeout`, this may wait forever. When the timeout elapses, the process is
    /// terminated (see [ProcessHandle::terminate]) and [WaitError::Timeout] is returned.
    ///
    /// Output can only be collected once.
    pub async fn wait_for_completion_with_output(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<(ExitStatus, Bytes), WaitError> {
        let mut reader =
            self.output_reader
                .take()
                .ok_or_else(|| WaitError::OutputAlreadyCollected {
                    process_name: self.name.clone(),
                })?;

        let Some(timeout) = timeout else {
            return complete(&self.name, &mut self.child, &mut reader).await;
        };

        let completed =
            tokio::time::timeout(timeout, complete(&self.name, &mut self.child, &mut reader))
                .await;
        match completed {
            Ok(result) => result,
            Err(_elapsed) => {
                tracing::warn!(
                    process = %self.name,
                    ?timeout,
                    "Process did not complete in time, terminating it"
                );
                reader.abort();
                self.terminate(self.interrupt_timeout, self.terminate_timeout)
                    .await?;
                Err(WaitError::Timeout {
                    process_name: self.name.clone(),
                    timeout,
                })
            }
        }
    }

    /// Terminates the process, escalating from `SIGINT` to `SIGTERM` to `SIGKILL`.
    ///
    /// The process gets `interrupt_timeout` to exit after `SIGINT` and `terminate_timeout` after
    /// `SIGTERM`. Only when killing it fails as well, an error is returned.
    pub async fn terminate(
        &mut self,
        interrupt_timeout: Duration,
        terminate_timeout: Duration,
    ) -> Result<ExitStatus, TerminationError> {
        let sigint_error = match self
            .signal_and_wait(ShutdownSignal::Interrupt, interrupt_timeout)
            .await
        {
            Ok(exit_status) => return Ok(exit_status),
            Err(err) => {
                tracing::warn!(
                    process = %self.name,
                    error = %err,
                    "Graceful shutdown using SIGINT failed, attempting SIGTERM"
                );
                err
            }
        };

        let sigterm_error = match self
            .signal_and_wait(ShutdownSignal::Terminate, terminate_timeout)
            .await
        {
            Ok(exit_status) => return Ok(exit_status),
            Err(err) => {
                tracing::warn!(
                    process = %self.name,
                    error = %err,
                    "Graceful shutdown using SIGTERM failed, attempting to kill the process"
                );
                err
            }
        };

        let killed = match self.child.kill().await {
            Ok(()) => self.child.wait().await,
            Err(err) => Err(err),
        };
        killed.map_err(|sigkill_error| TerminationError::TerminationFailed {
            process_name: self.name.clone(),
            sigint_error: sigint_error.to_string(),
            sigterm_error: sigterm_error.to_string(),
            sigkill_error,
        })
    }

    async fn signal_and_wait(
        &mut self,
        signal: ShutdownSignal,
        timeout: Duration,
    ) -> io::Result<ExitStatus> {
        signal::send(&self.child, signal)?;
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(exit_status) => exit_status,
            Err(_elapsed) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!(
                    "process did not exit within {timeout:?} after receiving {}",
                    signal.name()
                ),
            )),
        }
    }
}

async fn complete(
    name: &Cow<'static, str>,
    child: &mut Child,
    reader: &mut OutputReader,
) -> Result<(ExitStatus, Bytes), WaitError> {
    let status = child.wait().await.map_err(|source| WaitError::IoError {
        process_name: name.clone(),
        source,
    })?;
    let output = reader
        .await
        .map_err(|source| WaitError::ReaderFailed {
            process_name: name.clone(),
            source,
        })?
        .map_err(|source| WaitError::IoError {
            process_name: name.clone(),
            source,
        })?;

    tracing::debug!(process = %name, ?status, bytes = output.len(), "Process completed");
    Ok((status, output))
}

/// Reads `read` until end-of-stream.
async fn read_to_end<R: AsyncRead + Unpin>(mut read: R) -> io::Result<Bytes> {
    let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
    loop {
        buf.reserve(READ_CHUNK_SIZE);
        if read.read_buf(&mut buf).await? == 0 {
            break;
        }
    }
    Ok(buf.freeze())
}

/// The read side of a process' output, set up before the process is spawned.
enum OutputCapture {
    #[cfg(unix)]
    Merged(tokio::net::unix::pipe::Receiver),
    #[cfg(not(unix))]
    Separate,
}

impl OutputCapture {
    #[cfg(unix)]
    fn attach(cmd: &mut Command) -> io::Result<Self> {
        let (reader, writer) = io::pipe()?;
        cmd.stdout(writer.try_clone()?);
        cmd.stderr(writer);
        let receiver = tokio::net::unix::pipe::Receiver::from_owned_fd(reader.into())?;
        Ok(Self::Merged(receiver))
    }

    #[cfg(not(unix))]
    fn attach(cmd: &mut Command) -> io::Result<Self> {
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        Ok(Self::Separate)
    }

    #[cfg_attr(unix, allow(unused_variables))]
    fn start(self, child: &mut Child) -> OutputReader {
        match self {
            #[cfg(unix)]
            OutputCapture::Merged(receiver) => tokio::spawn(read_to_end(receiver)),
            #[cfg(not(unix))]
            OutputCapture::Separate => {
                let stdout = child.stdout.take();
                let stderr = child.stderr.take();
                tokio::spawn(async move {
                    let (stdout, stderr) = tokio::join!(
                        async {
                            match stdout {
                                Some(stdout) => read_to_end(stdout).await,
                                None => Ok(Bytes::new()),
                            }
                        },
                        async {
                            match stderr {
                                Some(stderr) => read_to_end(stderr).await,
                                None => Ok(Bytes::new()),
                            }
                        },
                    );
                    let (stdout, stderr) = (stdout?, stderr?);
                    let mut merged = BytesMut::with_capacity(stdout.len() + stderr.len());
                    merged.extend_from_slice(&stdout);
                    merged.extend_from_slice(&stderr);
                    Ok(merged.freeze())
                })
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use assertr::prelude::*;
    use tracing_test::traced_test;

    fn shell(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr_in_order() {
        let mut process = ProcessHandle::spawn(
            "interleaved",
            shell("echo one; echo two >&2; echo three"),
        )
        .expect("Failed to spawn `sh`");

        let (status, output) = process.wait_for_completion_with_output(None).await.unwrap();

        assert_that(status.success()).is_true();
        assert_that(output).is_equal_to(Bytes::from_static(b"one\ntwo\nthree\n"));
    }

    #[tokio::test]
    async fn captures_output_larger_than_a_pipe_buffer() {
        let mut process = ProcessHandle::spawn(
            "large-output",
            shell("i=0; while [ $i -lt 20000 ]; do echo 0123456789; i=$((i+1)); done"),
        )
        .expect("Failed to spawn `sh`");

        let (status, output) = process
            .wait_for_completion_with_output(Some(Duration::from_secs(30)))
            .await
            .unwrap();

        assert_that(status.success()).is_true();
        assert_that(output.len()).is_equal_to(20000 * 11);
    }

    #[tokio::test]
    async fn reports_exit_code() {
        let mut process =
            ProcessHandle::spawn("exit", shell("exit 4")).expect("Failed to spawn `sh`");
        let (status, output) = process.wait_for_completion_with_output(None).await.unwrap();
        assert_that(status.code()).is_equal_to(Some(4));
        assert_that(output.is_empty()).is_true();
    }

    #[tokio::test]
    async fn output_can_only_be_collected_once() {
        let mut process = ProcessHandle::spawn("true", shell("true")).expect("Failed to spawn");
        process.wait_for_completion_with_output(None).await.unwrap();

        let err = process
            .wait_for_completion_with_output(None)
            .await
            .unwrap_err();
        assert_that(matches!(err, WaitError::OutputAlreadyCollected { .. })).is_true();
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let err = ProcessHandle::spawn(
            "missing",
            Command::new("definitely-not-an-installed-program"),
        )
        .unwrap_err();
        assert_that(matches!(err, SpawnError::SpawnFailed { .. })).is_true();
    }

    #[tokio::test]
    #[traced_test]
    async fn terminates_process_exceeding_timeout() {
        let mut process = ProcessHandle::spawn("sleep", shell("exec sleep 30"))
            .expect("Failed to spawn `sh`")
            .with_shutdown_timeouts(Duration::from_secs(1), Duration::from_secs(1));

        let err = process
            .wait_for_completion_with_output(Some(Duration::from_millis(200)))
            .await
            .unwrap_err();

        assert_that(matches!(err, WaitError::Timeout { .. })).is_true();
        match process.is_running() {
            RunningState::Running => {
                assert_that(process).fail("Process should not be running anymore");
            }
            RunningState::Terminated(exit_status) => {
                // Terminating a process with a signal results in no code being emitted (on linux).
                assert_that(exit_status.code()).is_none();
            }
            RunningState::Uncertain(_) => {
                assert_that(process).fail("Process state should not be uncertain");
            }
        };
        assert!(logs_contain("Process did not complete in time, terminating it"));
    }

    #[tokio::test]
    #[traced_test]
    async fn escalates_to_sigterm_when_sigint_is_ignored() {
        let mut process = ProcessHandle::spawn(
            "ignores-sigint",
            shell("trap '' INT; while true; do sleep 0.05; done"),
        )
        .expect("Failed to spawn `sh`");
        // Give the shell time to install its trap.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let status = process
            .terminate(Duration::from_millis(300), Duration::from_secs(2))
            .await
            .unwrap();

        assert_that(status.success()).is_false();
        assert!(logs_contain("Graceful shutdown using SIGINT failed"));
    }
}
