use anyhow::{Context, Result};
use kube_login_bridge_confirm::confirm;
use kube_login_bridge_core::{
    frame,
    message::{Authorize, ANY_CHALLENGE, NEGOTIATE_CHALLENGE},
    Credential, Error, Identity, LoginDescriptor, Message, Problem,
};
use kube_login_bridge_k8s_client::Api;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, instrument, warn};

/// A confirmed login, handed to the host and kept for session cleanup.
#[derive(Clone, Debug)]
pub struct Login {
    pub credential: Credential,
    pub identity: Identity,
}

#[derive(Debug)]
pub enum Outcome {
    /// The host received a login descriptor.
    LoggedIn(Login),

    /// The host received a terminal failure message or a renewed challenge.
    Refused,
}

/// A cookie identifying this process's authorization exchange.
pub fn session_cookie() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("session{}{}", std::process::id(), now)
}

/// Runs one challenge/response exchange with the host and reports its
/// outcome over `output`.
///
/// Errors are fatal: the channel or the API server could not be used. Where
/// the output is still writable, an `internal-error` problem has already been
/// sent.
#[instrument(skip_all, fields(%cookie))]
pub async fn login<R, W, A>(input: &mut R, output: &mut W, api: &A, cookie: &str) -> Result<Outcome>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    A: Api + Sync + ?Sized,
{
    send(output, &Message::challenge(cookie, ANY_CHALLENGE)).await?;

    let response = match read_response(input, cookie).await {
        Ok(response) => response,
        Err(error) => return Err(internal_error(output, error).await),
    };

    let credential = match Credential::parse_authorization(&response) {
        Ok(credential) => credential,
        Err(error) => {
            warn!(%error, "unusable authorization");
            send(
                output,
                &Message::problem(Problem::AuthenticationFailed, error.to_string()),
            )
            .await?;
            return Ok(Outcome::Refused);
        }
    };
    debug!(kind = credential.kind(), "received credential");

    let identity = match confirm(api, &credential).await {
        Ok(identity) => identity,
        Err(error) => return refuse(output, cookie, error).await,
    };

    let descriptor = LoginDescriptor::build(api.endpoint(), &credential, &identity);
    send(output, &Message::login(identity.username.clone(), descriptor)).await?;
    info!(user = %identity.username, "logged in");
    Ok(Outcome::LoggedIn(Login {
        credential,
        identity,
    }))
}

async fn read_response<R>(input: &mut R, cookie: &str) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let payload = frame::read_frame(input)
        .await
        .context("failed to read authorization response")?;
    let response = Authorize::response_to(cookie, &payload)?;
    Ok(response)
}

async fn refuse<W>(output: &mut W, cookie: &str, error: Error) -> Result<Outcome>
where
    W: AsyncWrite + Unpin,
{
    let msg = match &error {
        Error::Authentication(_) => {
            info!(%error, "credential rejected");
            Message::problem(Problem::AuthenticationFailed, error.to_string())
        }
        Error::Negotiation(_) => {
            info!(%error, "negotiation must be restarted");
            Message::challenge(cookie, NEGOTIATE_CHALLENGE)
        }
        Error::Incompatible(_) => {
            warn!(%error, "API server cannot confirm credentials");
            Message::problem(Problem::AuthenticationUnavailable, error.to_string())
        }
        Error::Transport(_) => return Err(internal_error(output, error.into()).await),
    };
    send(output, &msg).await?;
    Ok(Outcome::Refused)
}

/// Tells the host about a fatal error, if it can still be told anything.
pub(crate) async fn internal_error<W>(output: &mut W, error: anyhow::Error) -> anyhow::Error
where
    W: AsyncWrite + Unpin,
{
    let msg = Message::problem(Problem::InternalError, format!("{error:#}"));
    if let Err(send_error) = send(output, &msg).await {
        debug!(error = %send_error, "failed to report internal error");
    }
    error
}

async fn send<W>(output: &mut W, msg: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = msg.to_payload()?;
    frame::write_frame(output, &payload)
        .await
        .context("failed to write control message")?;
    Ok(())
}
