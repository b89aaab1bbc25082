pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a credential could not be confirmed.
///
/// Transport failures and credential rejections are never conflated: the
/// former are internal errors, the latter are safe to retry with different
/// credentials.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The API server could not be reached (DNS, TLS handshake, refused
    /// connection, broken response stream).
    #[error("failed to reach the API server: {0}")]
    Transport(#[source] BoxError),

    /// The credential was rejected, or the backend responded ambiguously.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A negotiate exchange did not resolve an identity; the host should
    /// retry the interactive exchange.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// The backend cannot be used to confirm credentials reliably.
    #[error("incompatible API server: {0}")]
    Incompatible(String),
}

impl Error {
    pub fn transport(error: impl Into<BoxError>) -> Self {
        Self::Transport(error.into())
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    pub fn incompatible(message: impl Into<String>) -> Self {
        Self::Incompatible(message.into())
    }

    /// Relabels a credential rejection as a negotiation failure. Other kinds
    /// are preserved.
    pub fn into_negotiation(self) -> Self {
        match self {
            Self::Authentication(message) => Self::Negotiation(message),
            error => error,
        }
    }
}
