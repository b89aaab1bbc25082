#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod client;
mod response;

pub use self::{
    client::{Client, ConfigError},
    response::Response,
};
pub use http::{Method, StatusCode};
pub use kube_login_bridge_core::{AuthHeader, ClusterEndpoint, Error};

/// The API family served by every Kubernetes API server.
pub const CORE_API: &str = "api";

/// Issues requests against a cluster API server.
///
/// Responses are returned regardless of their status code; callers decide
/// what each status means. Only failures to complete an exchange with the
/// server are errors.
#[async_trait::async_trait]
pub trait Api {
    fn endpoint(&self) -> &ClusterEndpoint;

    /// Returns the server's preferred core API version, fetching it with
    /// `auth` the first time it is needed.
    async fn discover_version(&self, auth: &AuthHeader) -> Result<String, Error>;

    /// Sends `method` to `/{family}/{version}/{path}`.
    async fn request(
        &self,
        method: Method,
        family: &str,
        path: &str,
        auth: &AuthHeader,
        body: Option<Vec<u8>>,
    ) -> Result<Response, Error>;

    async fn get(&self, family: &str, path: &str, auth: &AuthHeader) -> Result<Response, Error> {
        self.request(Method::GET, family, path, auth, None).await
    }
}
