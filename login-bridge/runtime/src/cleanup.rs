use crate::Login;
use anyhow::{bail, Result};
use kube_login_bridge_core::{credential::Bearer, Credential};
use kube_login_bridge_k8s_client::{Api, Method};
use tracing::info;

/// Tears down server-side session state once the downstream process exits.
#[async_trait::async_trait]
pub trait Cleanup {
    async fn cleanup(&self) -> Result<()>;
}

/// Deletes the OAuth access token a session logged in with.
///
/// Only tokens confirmed through the extended user API are revoked; plain
/// clusters have no token resource to delete.
#[derive(Clone)]
pub struct TokenRevocation<A> {
    api: A,
    bearer: Bearer,
}

// === impl TokenRevocation ===

impl<A> TokenRevocation<A> {
    pub fn for_login(api: A, login: &Login) -> Option<Self> {
        match &login.credential {
            Credential::Bearer(bearer)
                if login.identity.extended_profile && !bearer.token().is_empty() =>
            {
                Some(Self {
                    api,
                    bearer: bearer.clone(),
                })
            }
            _ => None,
        }
    }
}

#[async_trait::async_trait]
impl<A> Cleanup for TokenRevocation<A>
where
    A: Api + Send + Sync,
{
    async fn cleanup(&self) -> Result<()> {
        let path = format!("oauthaccesstokens/{}", self.bearer.token());
        let rsp = self
            .api
            .request(
                Method::DELETE,
                &self.api.endpoint().user_api_path,
                &path,
                self.bearer.header(),
                None,
            )
            .await?;
        if !rsp.status.is_success() {
            bail!("failed to revoke access token: {}", rsp.status_text());
        }
        info!("revoked access token");
        Ok(())
    }
}

#[async_trait::async_trait]
impl<C> Cleanup for Option<C>
where
    C: Cleanup + Sync,
{
    async fn cleanup(&self) -> Result<()> {
        match self {
            Some(cleanup) => cleanup.cleanup().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube_login_bridge_core::{ClusterEndpoint, Identity};
    use kube_login_bridge_k8s_client::{Client, StatusCode};
    use parking_lot::Mutex;
    use std::{convert::Infallible, sync::Arc};

    type Seen = Arc<Mutex<Vec<(http::Method, String)>>>;

    fn client(delete: StatusCode) -> (Client, Seen) {
        let seen = Seen::default();
        let svc = {
            let seen = seen.clone();
            tower::service_fn(move |req: http::Request<kube::client::Body>| {
                seen.lock()
                    .push((req.method().clone(), req.uri().path().to_string()));
                let (status, body) = match req.uri().path() {
                    "/api" => (StatusCode::OK, r#"{"versions":["v1"]}"#),
                    _ => (delete, "{}"),
                };
                async move {
                    Ok::<_, Infallible>(
                        http::Response::builder()
                            .status(status)
                            .body(http_body_util::Full::new(bytes::Bytes::from_static(
                                body.as_bytes(),
                            )))
                            .unwrap(),
                    )
                }
            })
        };
        let client = Client::with_client(
            Arc::new(ClusterEndpoint::new("10.0.0.1", 443)),
            kube::Client::new(svc, "default"),
        );
        (client, seen)
    }

    fn logged_in(credential: Credential, extended_profile: bool) -> Login {
        Login {
            credential,
            identity: Identity::new("alice", None, extended_profile),
        }
    }

    #[tokio::test]
    async fn revokes_extended_profile_tokens() {
        let (api, seen) = client(StatusCode::OK);
        let login = logged_in(Credential::Bearer(Bearer::new("tok")), true);
        let revocation = TokenRevocation::for_login(api, &login).expect("token is revocable");

        revocation.cleanup().await.unwrap();
        assert_eq!(
            *seen.lock(),
            vec![
                (http::Method::GET, "/api".to_string()),
                (
                    http::Method::DELETE,
                    "/oapi/v1/oauthaccesstokens/tok".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn reports_failed_revocation() {
        let (api, _) = client(StatusCode::FORBIDDEN);
        let login = logged_in(Credential::Bearer(Bearer::new("tok")), true);
        let revocation = TokenRevocation::for_login(api, &login);
        assert!(revocation.cleanup().await.is_err());
    }

    #[tokio::test]
    async fn only_extended_profile_tokens_are_revocable() {
        let (api, _) = client(StatusCode::OK);
        for login in [
            logged_in(Credential::Bearer(Bearer::new("tok")), false),
            logged_in(Credential::Bearer(Bearer::new("")), true),
            logged_in(
                Credential::Basic(kube_login_bridge_core::credential::Basic::new("alice", "pw")),
                true,
            ),
            logged_in(Credential::Negotiate, true),
        ] {
            assert!(
                TokenRevocation::for_login(api.clone(), &login).is_none(),
                "{login:?}"
            );
        }
    }

    #[tokio::test]
    async fn nothing_to_clean_up() {
        let none: Option<TokenRevocation<Client>> = None;
        none.cleanup().await.unwrap();
    }
}
