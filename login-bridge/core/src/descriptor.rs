//! The login descriptor handed to the host process once a credential is
//! confirmed.
//!
//! The document is shaped like a kubeconfig so that the host can hand it
//! directly to kube clients: one cluster, one context selecting it, and one
//! user carrying the resolved identity and the credential material.

use crate::{ClusterEndpoint, Credential, Identity};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;
use std::fmt;

pub const CLUSTER_NAME: &str = "login-cluster";
pub const CONTEXT_NAME: &str = "login-context";
pub const USER_NAME: &str = "login-user";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoginDescriptor {
    #[serde(rename = "apiVersion")]
    pub api_version: &'static str,
    pub kind: &'static str,
    pub clusters: Vec<NamedCluster>,
    pub contexts: Vec<NamedContext>,
    pub current_context: String,
    pub users: Vec<NamedUser>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: Cluster,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
    pub insecure_skip_tls_verify: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NamedContext {
    pub name: String,
    pub context: Context,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Context {
    pub cluster: String,
    pub user: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NamedUser {
    pub name: String,
    pub user: User,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    pub username: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub secret: Option<Secret>,
}

/// Credential material for subsequent API calls. A user carries a password
/// or a token, never both.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Secret {
    Password { password: String },
    Token { token: String },
}

// === impl LoginDescriptor ===

impl LoginDescriptor {
    pub fn build(endpoint: &ClusterEndpoint, credential: &Credential, identity: &Identity) -> Self {
        let secret = match credential {
            Credential::Basic(basic) => Some(Secret::Password {
                password: basic.password().to_string(),
            }),
            Credential::Bearer(bearer) => Some(Secret::Token {
                token: bearer.token().to_string(),
            }),
            Credential::Negotiate => None,
        };

        Self {
            api_version: "v1",
            kind: "Config",
            clusters: vec![NamedCluster {
                name: CLUSTER_NAME.to_string(),
                cluster: Cluster {
                    server: endpoint.server.clone(),
                    certificate_authority_data: endpoint
                        .ca_bundle
                        .as_ref()
                        .map(|pem| BASE64.encode(pem)),
                    insecure_skip_tls_verify: endpoint.insecure_skip_verify,
                },
            }],
            contexts: vec![NamedContext {
                name: CONTEXT_NAME.to_string(),
                context: Context {
                    cluster: CLUSTER_NAME.to_string(),
                    user: USER_NAME.to_string(),
                },
            }],
            current_context: CONTEXT_NAME.to_string(),
            users: vec![NamedUser {
                name: USER_NAME.to_string(),
                user: User {
                    username: identity.username.clone(),
                    display_name: identity.display_name.clone(),
                    secret,
                },
            }],
        }
    }

    /// The single user entry.
    pub fn user(&self) -> &User {
        &self.users[0].user
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { .. } => f.write_str("Password(<redacted>)"),
            Self::Token { .. } => f.write_str("Token(<redacted>)"),
        }
    }
}
