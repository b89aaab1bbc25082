use std::path::PathBuf;

/// The user API family used when none is configured.
pub const DEFAULT_USER_API_PATH: &str = "oapi";

/// The CA bundle mounted into pods with a service account.
pub const IN_CLUSTER_CA_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Describes the cluster API server that credentials are confirmed against.
///
/// Built once at startup and shared by reference; never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterEndpoint {
    /// The API server URL, e.g. `https://10.0.0.1:443`.
    pub server: String,

    /// The API family that serves the extended user profile.
    pub user_api_path: String,

    /// Inline PEM-encoded trust roots.
    pub ca_bundle: Option<String>,

    /// A file holding PEM-encoded trust roots, used when no inline bundle is
    /// configured.
    pub ca_file: Option<PathBuf>,

    pub insecure_skip_verify: bool,

    /// Fail confirmation when the extended user profile API is absent.
    pub require_extended_api: bool,
}

impl ClusterEndpoint {
    /// Builds an endpoint from a host (which may already be a URL) and port.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            server: server_url(host, port),
            user_api_path: DEFAULT_USER_API_PATH.to_string(),
            ca_bundle: None,
            ca_file: None,
            insecure_skip_verify: false,
            require_extended_api: false,
        }
    }

    /// The CA file consulted when verification is enabled and no inline
    /// bundle is set.
    pub fn trust_file(&self) -> Option<PathBuf> {
        if self.insecure_skip_verify || self.ca_bundle.is_some() {
            return None;
        }
        Some(
            self.ca_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(IN_CLUSTER_CA_FILE)),
        )
    }
}

fn server_url(host: &str, port: u16) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("https://") || host.starts_with("http://") {
        return host.to_string();
    }

    if host.contains(':') && !host.starts_with('[') {
        return format!("https://[{host}]:{port}");
    }
    format!("https://{host}:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_server_urls() {
        assert_eq!(
            ClusterEndpoint::new("10.0.0.1", 443).server,
            "https://10.0.0.1:443"
        );
        assert_eq!(
            ClusterEndpoint::new("fd00::1", 6443).server,
            "https://[fd00::1]:6443"
        );
        assert_eq!(
            ClusterEndpoint::new("https://api.example.com:8443/", 443).server,
            "https://api.example.com:8443"
        );
    }

    #[test]
    fn trust_file_defaults_to_in_cluster_ca() {
        let mut endpoint = ClusterEndpoint::new("kubernetes.default.svc", 443);
        assert_eq!(endpoint.trust_file(), Some(PathBuf::from(IN_CLUSTER_CA_FILE)));

        endpoint.ca_file = Some(PathBuf::from("/etc/pki/kube.pem"));
        assert_eq!(endpoint.trust_file(), Some(PathBuf::from("/etc/pki/kube.pem")));

        endpoint.ca_bundle = Some("-----BEGIN CERTIFICATE-----".to_string());
        assert_eq!(endpoint.trust_file(), None);

        endpoint.ca_bundle = None;
        endpoint.insecure_skip_verify = true;
        assert_eq!(endpoint.trust_file(), None);
    }
}
