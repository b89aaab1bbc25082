use crate::{
    exchange::{self, Outcome},
    Exit, Supervisor, TokenRevocation, REFUSED_EXIT_CODE,
};
use anyhow::{Context, Result};
use clap::{builder::BoolishValueParser, Parser};
use kube_login_bridge_core::{ClusterEndpoint, DEFAULT_USER_API_PATH};
use kube_login_bridge_k8s_client::Client;
use std::{
    ffi::OsString,
    io,
    os::fd::{AsFd, BorrowedFd},
    path::PathBuf,
    sync::Arc,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[clap(
    name = "kube-login-bridge",
    about = "Confirms a login against a Kubernetes API server, then runs the session"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "kube_login_bridge=info,warn",
        env = "LOGIN_BRIDGE_LOG"
    )]
    log_level: String,

    #[clap(long, default_value = "plain", env = "LOGIN_BRIDGE_LOG_FORMAT")]
    log_format: LogFormat,

    /// The API server's host, or its full URL.
    #[clap(long, env = "KUBERNETES_SERVICE_HOST")]
    api_host: String,

    #[clap(long, default_value = "443", env = "KUBERNETES_SERVICE_PORT")]
    api_port: u16,

    /// PEM-encoded roots trusted for the API server. Takes precedence over
    /// `--ca-file`.
    #[clap(long, env = "KUBERNETES_CA_DATA")]
    ca_data: Option<String>,

    /// Defaults to the in-cluster service account CA.
    #[clap(long, env = "KUBERNETES_CA_FILE")]
    ca_file: Option<PathBuf>,

    /// Disables API server certificate verification.
    #[clap(long, env = "KUBERNETES_INSECURE", value_parser = BoolishValueParser::new())]
    insecure: bool,

    /// Refuses API servers that lack the extended user API.
    #[clap(long, env = "REGISTRY_ONLY", value_parser = BoolishValueParser::new())]
    registry_only: bool,

    #[clap(long, default_value = DEFAULT_USER_API_PATH, env = "KUBERNETES_USER_API")]
    user_api_path: String,

    /// The program run once the login is confirmed.
    program: PathBuf,

    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<OsString>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

// === impl Args ===

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<Exit> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<Exit> {
        let Self {
            log_level,
            log_format,
            api_host,
            api_port,
            ca_data,
            ca_file,
            insecure,
            registry_only,
            user_api_path,
            program,
            args,
        } = self;

        let filter = EnvFilter::try_new(&log_level)
            .with_context(|| format!("invalid log filter: {log_level}"))?;
        log_format.try_init(filter)?;

        let endpoint = ClusterEndpoint {
            ca_bundle: ca_data.filter(|pem| !pem.trim().is_empty()),
            ca_file,
            insecure_skip_verify: insecure,
            require_extended_api: registry_only,
            user_api_path,
            ..ClusterEndpoint::new(&api_host, api_port)
        };

        // The session process inherits stdin, so the exchange must not
        // consume anything beyond the response frame.
        let mut input = unbuffered(io::stdin().as_fd()).context("failed to open stdin")?;
        let mut output = tokio::io::stdout();

        let api = match Client::new(Arc::new(endpoint)).await {
            Ok(api) => api,
            Err(error) => return Err(exchange::internal_error(&mut output, error.into()).await),
        };

        let cookie = exchange::session_cookie();
        let login = match exchange::login(&mut input, &mut output, &api, &cookie).await? {
            Outcome::LoggedIn(login) => login,
            Outcome::Refused => return Ok(Exit::Code(REFUSED_EXIT_CODE)),
        };
        drop((input, output));

        let cleanup = TokenRevocation::for_login(api, &login);
        let supervisor = Supervisor::spawn(&program, &args, std::iter::empty::<(&str, &str)>())
            .with_context(|| format!("failed to spawn {}", program.display()))?;
        let status = supervisor.wait(&cleanup).await?;
        Ok(Exit::from(status))
    }
}

/// Reads a duplicate of `fd` without buffering: every read asks for no more
/// than the caller's buffer holds, and the file offset is shared with `fd`.
fn unbuffered(fd: BorrowedFd<'_>) -> io::Result<tokio::fs::File> {
    let fd = fd.try_clone_to_owned()?;
    Ok(tokio::fs::File::from_std(std::fs::File::from(fd)))
}

// === impl LogFormat ===

impl LogFormat {
    /// Installs the global subscriber. Logs are written to stderr since
    /// stdout carries the control channel.
    pub fn try_init(self, filter: EnvFilter) -> Result<()> {
        let registry = tracing_subscriber::registry().with(filter);
        match self {
            Self::Plain => registry
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()?,
            Self::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_writer(std::io::stderr),
                )
                .try_init()?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube_login_bridge_core::frame;
    use parking_lot::Mutex;
    use std::io::{Read, Seek, SeekFrom, Write};

    /// Serializes tests that read or modify the process environment.
    static ENV: Mutex<()> = parking_lot::const_mutex(());

    #[test]
    fn parses_environment_style_arguments() {
        let _env = ENV.lock();
        let args = Args::try_parse_from([
            "kube-login-bridge",
            "--api-host",
            "10.0.0.1",
            "--insecure",
            "--log-format",
            "json",
            "/usr/libexec/session",
            "--interactive",
            "-x",
        ])
        .unwrap();
        assert_eq!(args.api_host, "10.0.0.1");
        assert!(args.insecure);
        assert!(!args.registry_only);
        assert_eq!(args.user_api_path, DEFAULT_USER_API_PATH);
        assert_eq!(args.log_format, LogFormat::Json);
        assert_eq!(args.program, PathBuf::from("/usr/libexec/session"));
        assert_eq!(args.args, vec!["--interactive", "-x"]);
    }

    #[test]
    fn requires_a_program() {
        assert!(Args::try_parse_from(["kube-login-bridge", "--api-host", "10.0.0.1"]).is_err());
    }

    #[test]
    fn accepts_boolish_environment_flags() {
        let _env = ENV.lock();
        let parse = || {
            Args::try_parse_from(["kube-login-bridge", "--api-host", "10.0.0.1", "/bin/true"])
                .unwrap()
        };

        for (insecure, registry_only) in [("1", "yes"), ("true", "on")] {
            std::env::set_var("KUBERNETES_INSECURE", insecure);
            std::env::set_var("REGISTRY_ONLY", registry_only);
            let args = parse();
            assert!(args.insecure, "{insecure}");
            assert!(args.registry_only, "{registry_only}");
        }

        for (insecure, registry_only) in [("0", "no"), ("false", "off")] {
            std::env::set_var("KUBERNETES_INSECURE", insecure);
            std::env::set_var("REGISTRY_ONLY", registry_only);
            let args = parse();
            assert!(!args.insecure, "{insecure}");
            assert!(!args.registry_only, "{registry_only}");
        }

        std::env::remove_var("KUBERNETES_INSECURE");
        std::env::remove_var("REGISTRY_ONLY");
    }

    #[tokio::test]
    async fn input_stops_after_the_frame() {
        let path = std::env::temp_dir().join(format!("login-bridge-input-{}", std::process::id()));
        let mut file = std::fs::File::options()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();
        file.write_all(b"5\nhello session bytes").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();

        let mut input = unbuffered(file.as_fd()).unwrap();
        assert_eq!(frame::read_frame(&mut input).await.unwrap(), b"hello");
        drop(input);

        let mut rest = String::new();
        file.read_to_string(&mut rest).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(rest, " session bytes");
    }
}
