use crate::{Api, AuthHeader, ClusterEndpoint, Error, Response};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use http::{header, Method, StatusCode};
use http_body_util::BodyExt;
use kube::config::{KubeConfigOptions, Kubeconfig, KubeconfigError};
use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

const DISCOVERY_PATH: &str = "/api";

/// An API client bound to a single cluster endpoint.
///
/// TLS trust is fixed when the client is built. The core API version is
/// discovered at most once and reused for the life of the client.
#[derive(Clone)]
pub struct Client {
    endpoint: Arc<ClusterEndpoint>,
    kube: kube::Client,
    version: Arc<OnceLock<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to describe cluster endpoint: {0}")]
    Describe(#[from] serde_json::Error),

    #[error("failed to load cluster configuration: {0}")]
    Load(#[from] KubeconfigError),

    #[error("failed to build API client: {0}")]
    Build(#[from] kube::Error),
}

#[derive(Deserialize)]
struct ApiVersions {
    #[serde(default)]
    versions: Vec<String>,
}

// === impl Client ===

impl Client {
    /// Builds a client that trusts only the endpoint's configured roots, or
    /// skips verification entirely when the endpoint is insecure.
    pub async fn new(endpoint: Arc<ClusterEndpoint>) -> Result<Self, ConfigError> {
        let kubeconfig = kubeconfig(&endpoint)?;
        let config =
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
        let kube = kube::Client::try_from(config)?;
        Ok(Self::with_client(endpoint, kube))
    }

    pub fn with_client(endpoint: Arc<ClusterEndpoint>, kube: kube::Client) -> Self {
        Self {
            endpoint,
            kube,
            version: Default::default(),
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: String,
        auth: &AuthHeader,
        body: Option<Vec<u8>>,
    ) -> Result<Response, Error> {
        let mut req = http::Request::builder()
            .method(method.clone())
            .uri(&uri)
            .header(header::ACCEPT, "application/json");
        if !auth.is_empty() {
            req = req.header(header::AUTHORIZATION, auth.as_str());
        }
        if body.is_some() {
            req = req.header(header::CONTENT_TYPE, "application/json");
        }
        let body = body.map(kube::client::Body::from).unwrap_or_else(kube::client::Body::empty);
        // The only caller-controlled inputs are the credential header and
        // the token embedded in revocation paths.
        let req = req
            .body(body)
            .map_err(|error| Error::authentication(format!("invalid request: {error}")))?;

        trace!(%method, %uri, ?auth, "sending request");
        let rsp = self.kube.send(req).await.map_err(Error::transport)?;
        let status = rsp.status();
        let body = rsp
            .into_body()
            .collect()
            .await
            .map_err(Error::transport)?
            .to_bytes();
        debug!(%method, %uri, %status, "API response");
        Ok(Response::new(status, body))
    }
}

#[async_trait::async_trait]
impl Api for Client {
    fn endpoint(&self) -> &ClusterEndpoint {
        &self.endpoint
    }

    async fn discover_version(&self, auth: &AuthHeader) -> Result<String, Error> {
        if let Some(version) = self.version.get() {
            return Ok(version.clone());
        }

        let rsp = self
            .send(Method::GET, DISCOVERY_PATH.to_string(), auth, None)
            .await?;
        if rsp.status != StatusCode::OK {
            return Err(Error::authentication(format!(
                "couldn't get API version: {}",
                rsp.status_text()
            )));
        }

        let ApiVersions { versions } = rsp.json().map_err(|error| {
            Error::authentication(format!("couldn't decode API versions: {error}"))
        })?;
        let version = versions
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::authentication("API server reported no versions"))?;

        debug!(%version, "discovered API version");
        Ok(self.version.get_or_init(|| version).clone())
    }

    async fn request(
        &self,
        method: Method,
        family: &str,
        path: &str,
        auth: &AuthHeader,
        body: Option<Vec<u8>>,
    ) -> Result<Response, Error> {
        let version = self.discover_version(auth).await?;
        let uri = format!("/{family}/{version}/{}", path.trim_start_matches('/'));
        self.send(method, uri, auth, body).await
    }
}

/// Describes the endpoint as a kubeconfig without user credentials; every
/// request carries its own authorization header instead.
fn kubeconfig(endpoint: &ClusterEndpoint) -> Result<Kubeconfig, serde_json::Error> {
    let mut cluster = serde_json::json!({
        "server": endpoint.server,
        "insecure-skip-tls-verify": endpoint.insecure_skip_verify,
    });
    if !endpoint.insecure_skip_verify {
        if let Some(pem) = endpoint.ca_bundle.as_ref() {
            cluster["certificate-authority-data"] = BASE64.encode(pem).into();
        } else if let Some(file) = endpoint.trust_file() {
            cluster["certificate-authority"] = file.to_string_lossy().into_owned().into();
        }
    }

    serde_json::from_value(serde_json::json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": "endpoint", "cluster": cluster }],
        "users": [{ "name": "anonymous", "user": {} }],
        "contexts": [{
            "name": "endpoint",
            "context": { "cluster": "endpoint", "user": "anonymous" },
        }],
        "current-context": "endpoint",
    }))
}
