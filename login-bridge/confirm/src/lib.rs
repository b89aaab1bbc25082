//! Confirms credentials against a cluster API server.
//!
//! The API server offers no direct way to ask whether a credential is valid,
//! so validity is inferred from a fixed sequence of probes:
//!
//! 1. Discover the core API version using the credential.
//! 2. Fetch the extended user profile (OpenShift-style `users/~`). When it
//!    exists it both confirms the credential and names the user.
//! 3. Otherwise fall back to probing a generic resource, with one strategy
//!    per credential kind.
//!
//! The order matters: later steps assume the statuses observed by earlier
//! ones.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube_login_bridge_core::{
    credential::{Basic, Bearer, NEGOTIATE_PLACEHOLDER},
    AuthHeader, Credential, Error, Identity,
};
use kube_login_bridge_k8s_client::{Api, Response, StatusCode, CORE_API};
use serde::Deserialize;
use tracing::{debug, info, instrument};


/// The extended profile resource describing the requesting user.
pub const USER_PROFILE_PATH: &str = "users/~";

/// A resource every API server serves and that requires authentication to
/// list.
pub const PROBE_PATH: &str = "namespaces";

/// The username reported for bearer tokens, which carry no identity.
pub const UNKNOWN_USER: &str = "Unknown";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    metadata: ObjectMeta,
}

/// Confirms `credential` against the API server behind `api`.
///
/// For negotiate credentials every rejection is reported as
/// [`Error::Negotiation`] so the host can restart the interactive exchange.
pub async fn confirm<A>(api: &A, credential: &Credential) -> Result<Identity, Error>
where
    A: Api + Sync + ?Sized,
{
    let res = confirm_credential(api, credential).await;
    match (credential, res) {
        (Credential::Negotiate, Err(error)) => Err(error.into_negotiation()),
        (_, res) => res,
    }
}

#[instrument(level = "debug", skip_all, fields(kind = credential.kind()))]
async fn confirm_credential<A>(api: &A, credential: &Credential) -> Result<Identity, Error>
where
    A: Api + Sync + ?Sized,
{
    if let Credential::Bearer(bearer) = credential {
        if bearer.token().is_empty() {
            return Err(Error::authentication("empty bearer token"));
        }
    }

    let version = api.discover_version(credential.header()).await?;
    debug!(%version, "API version");

    if let Some(identity) = extended_profile(api, credential.header()).await? {
        info!(user = %identity.username, "confirmed with extended user profile");
        return Ok(identity);
    }

    let identity = match credential {
        Credential::Basic(basic) => confirm_basic(api, basic).await?,
        Credential::Bearer(bearer) => confirm_bearer(api, bearer).await?,
        Credential::Negotiate => confirm_negotiate(api).await?,
    };
    info!(user = %identity.username, "confirmed against plain cluster");
    Ok(identity)
}

/// Reads the extended user profile. Returns `None` when the API server does
/// not serve it and the deployment tolerates that.
async fn extended_profile<A>(api: &A, auth: &AuthHeader) -> Result<Option<Identity>, Error>
where
    A: Api + Sync + ?Sized,
{
    let endpoint = api.endpoint();
    let rsp = api
        .get(&endpoint.user_api_path, USER_PROFILE_PATH, auth)
        .await?;
    match rsp.status {
        StatusCode::OK => {
            let Profile {
                full_name,
                metadata,
            } = rsp
                .json()
                .map_err(|_| Error::authentication("identity payload invalid"))?;
            let name = metadata
                .name
                .filter(|name| !name.is_empty())
                .ok_or_else(|| Error::authentication("identity payload invalid"))?;
            Ok(Some(Identity::new(name, full_name, true)))
        }

        StatusCode::NOT_FOUND | StatusCode::FORBIDDEN if endpoint.require_extended_api => {
            Err(Error::incompatible(format!(
                "extended user API is required but unavailable: {}",
                rsp.status_text()
            )))
        }

        StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
            debug!(status = %rsp.status, "no extended user profile");
            Ok(None)
        }

        _ => Err(unexpected(&rsp)),
    }
}

/// Basic credentials are only accepted once the API server has been shown to
/// reject credentials at all; an absence of rejection is not proof.
async fn confirm_basic<A>(api: &A, basic: &Basic) -> Result<Identity, Error>
where
    A: Api + Sync + ?Sized,
{
    let accepted = || Identity::new(basic.username(), None, false);

    let anonymous = api.get(CORE_API, PROBE_PATH, &AuthHeader::none()).await?;
    match anonymous.status {
        StatusCode::OK => {
            debug!("API server allows anonymous access");
            return Ok(accepted());
        }

        StatusCode::UNAUTHORIZED => {
            let invalid = api
                .get(CORE_API, PROBE_PATH, &AuthHeader::basic("", ""))
                .await?;
            match invalid.status {
                StatusCode::FORBIDDEN => {
                    return Err(Error::incompatible(
                        "API server accepts invalid basic credentials",
                    ))
                }
                StatusCode::OK => {
                    debug!("API server accepts any basic credentials");
                    return Ok(accepted());
                }
                StatusCode::UNAUTHORIZED => {}
                _ => return Err(unexpected(&invalid)),
            }
        }

        StatusCode::FORBIDDEN => {}

        _ => return Err(unexpected(&anonymous)),
    }

    let rsp = api.get(CORE_API, PROBE_PATH, basic.header()).await?;
    match rsp.status {
        // Forbidden still means the credential authenticated.
        StatusCode::OK | StatusCode::FORBIDDEN => Ok(accepted()),
        StatusCode::UNAUTHORIZED => Err(Error::authentication("invalid username or password")),
        _ => Err(unexpected(&rsp)),
    }
}

async fn confirm_bearer<A>(api: &A, bearer: &Bearer) -> Result<Identity, Error>
where
    A: Api + Sync + ?Sized,
{
    let rsp = api.get(CORE_API, PROBE_PATH, bearer.header()).await?;
    match rsp.status {
        // Forbidden only means the token's RBAC doesn't permit the probe.
        StatusCode::OK | StatusCode::FORBIDDEN => Ok(Identity::new(UNKNOWN_USER, None, false)),
        _ => Err(Error::authentication(format!(
            "token rejected: {}",
            rsp.status_text()
        ))),
    }
}

async fn confirm_negotiate<A>(api: &A) -> Result<Identity, Error>
where
    A: Api + Sync + ?Sized,
{
    let rsp = api.get(CORE_API, PROBE_PATH, &AuthHeader::none()).await?;
    match rsp.status {
        StatusCode::OK => Ok(Identity::new(NEGOTIATE_PLACEHOLDER, None, false)),
        _ => Err(unexpected(&rsp)),
    }
}

fn unexpected(rsp: &Response) -> Error {
    Error::authentication(format!("unexpected API response: {}", rsp.status_text()))
}
