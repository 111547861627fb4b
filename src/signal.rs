/// Signals asking a process to shut down, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShutdownSignal {
    /// - on `cfg(unix)`: `SIGINT`.
    /// - on `cfg(windows)`: `CTRL_C_EVENT`.
    Interrupt,

    /// - on `cfg(unix)`: `SIGTERM`.
    /// - on `cfg(windows)`: `CTRL_BREAK_EVENT`.
    Terminate,
}

impl ShutdownSignal {
    pub(crate) fn name(self) -> &'static str {
        match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
        }
    }
}

/// Sends `signal` to `child`.
///
/// Does nothing if the child was already "polled to completion", as it has no pid anymore.
/// Fails with `Unsupported` on platforms other than unix and windows.
pub(crate) fn send(child: &tokio::process::Child, signal: ShutdownSignal) -> std::io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };

    #[cfg(unix)]
    {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let signal = match signal {
            ShutdownSignal::Interrupt => Signal::SIGINT,
            ShutdownSignal::Terminate => Signal::SIGTERM,
        };
        signal::kill(Pid::from_raw(pid as i32), signal).map_err(std::io::Error::from)
    }

    #[cfg(windows)]
    {
        use windows_sys::Win32::Foundation::{CTRL_BREAK_EVENT, CTRL_C_EVENT};
        use windows_sys::Win32::System::Console::GenerateConsoleCtrlEvent;

        let event = match signal {
            ShutdownSignal::Interrupt => CTRL_C_EVENT,
            ShutdownSignal::Terminate => CTRL_BREAK_EVENT,
        };
        let success = unsafe { GenerateConsoleCtrlEvent(event, pid) };
        if success == 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(all(not(windows), not(unix)))]
    {
        let _ = (pid, signal);
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "Cannot send shutdown signals to processes on this platform",
        ))
    }
}
