use crate::Cleanup;
use std::{
    ffi::OsStr,
    io,
    os::unix::process::ExitStatusExt,
    process::{ExitStatus, Stdio},
};
use tokio::{
    process::{Child, Command},
    signal::unix::{signal, Signal, SignalKind},
};
use tracing::{debug, info, warn};

/// Variables passed through to the downstream process. Everything else in
/// the bridge's environment is withheld.
pub const INHERITED_ENV: &[&str] = &[
    "PATH",
    "LANG",
    "G_MESSAGES_DEBUG",
    "G_SLICE",
    "COCKPIT_REMOTE_PEER",
    "KUBERNETES_SERVICE_HOST",
    "KUBERNETES_SERVICE_PORT",
];

/// Runs the downstream process for a logged-in session.
///
/// Termination signals received while the child runs are forwarded to it
/// rather than terminating the bridge, so the session can always be cleaned
/// up after the child exits.
pub struct Supervisor {
    child: Child,
    signals: Signals,
}

/// How the bridge should exit to mirror a finished process.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Exit {
    Code(i32),
    Signal(i32),
}

struct Signals {
    terminate: Signal,
    interrupt: Signal,
    quit: Signal,
}

// === impl Supervisor ===

impl Supervisor {
    /// Spawns `program` with the inherited allow-list and `env` as its only
    /// environment. The child shares the bridge's standard streams.
    pub fn spawn<I, S, E, K, V>(program: impl AsRef<OsStr>, args: I, env: E) -> io::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
        E: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        // Registered before the child exists so no signal is missed.
        let signals = Signals::register()?;

        let mut cmd = Command::new(program.as_ref());
        cmd.args(args)
            .env_clear()
            .envs(
                INHERITED_ENV
                    .iter()
                    .filter_map(|name| std::env::var_os(name).map(|value| (*name, value))),
            )
            .envs(env)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        terminate_with_parent(&mut cmd);

        let child = cmd.spawn()?;
        info!(
            program = %program.as_ref().to_string_lossy(),
            pid = child.id(),
            "spawned session process"
        );
        Ok(Self { child, signals })
    }

    /// Waits for the child to exit, forwarding termination signals to it,
    /// then runs `cleanup`.
    ///
    /// Cleanup failures are logged and never affect the returned status.
    pub async fn wait<C>(mut self, cleanup: &C) -> io::Result<ExitStatus>
    where
        C: Cleanup + ?Sized,
    {
        let status = loop {
            tokio::select! {
                status = self.child.wait() => break status,
                Some(()) = self.signals.terminate.recv() => self.forward(libc::SIGTERM),
                Some(()) = self.signals.interrupt.recv() => self.forward(libc::SIGINT),
                Some(()) = self.signals.quit.recv() => self.forward(libc::SIGQUIT),
            }
        };
        match &status {
            Ok(status) => info!(%status, "session process exited"),
            Err(error) => warn!(%error, "failed to wait for session process"),
        }

        if let Err(error) = cleanup.cleanup().await {
            warn!(error = %format_args!("{error:#}"), "session cleanup failed");
        }
        status
    }

    fn forward(&self, signal: libc::c_int) {
        let Some(pid) = self.child.id() else {
            return;
        };
        debug!(pid, signal, "forwarding signal");
        if let Err(error) = kill(pid, signal) {
            warn!(pid, signal, %error, "failed to forward signal");
        }
    }
}

// === impl Signals ===

impl Signals {
    fn register() -> io::Result<Self> {
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
            quit: signal(SignalKind::quit())?,
        })
    }
}

// === impl Exit ===

impl From<ExitStatus> for Exit {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => Self::Code(code),
            (None, Some(signal)) => Self::Signal(signal),
            (None, None) => Self::Code(crate::FATAL_EXIT_CODE),
        }
    }
}

impl Exit {
    /// Ends the process with this status. Signals are re-raised with their
    /// default disposition; should that fail to terminate the process, it
    /// exits with the shell's `128 + signal` convention.
    pub fn exit(self) -> ! {
        match self {
            Self::Code(code) => std::process::exit(code),
            Self::Signal(signal) => {
                raise_default(signal);
                std::process::exit(128 + signal)
            }
        }
    }
}

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
fn terminate_with_parent(cmd: &mut Command) {
    // SAFETY: the hook runs in the forked child before exec and only makes
    // an async-signal-safe system call.
    unsafe {
        cmd.pre_exec(|| {
            if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM as libc::c_ulong) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(target_os = "linux"))]
fn terminate_with_parent(_: &mut Command) {}

#[allow(unsafe_code)]
fn kill(pid: u32, signal: libc::c_int) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill has no memory-safety preconditions.
    if unsafe { libc::kill(pid, signal) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[allow(unsafe_code)]
fn raise_default(signal: libc::c_int) {
    // SAFETY: restoring the default disposition and raising a signal have no
    // memory-safety preconditions.
    unsafe {
        libc::signal(signal, libc::SIG_DFL);
        libc::raise(signal);
    }
}
