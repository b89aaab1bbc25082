use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::fmt;

/// Username assigned to a negotiate credential until a downstream process
/// resolves the real identity.
pub const NEGOTIATE_PLACEHOLDER: &str = "Unauthenticated";

/// A credential presented by the host, as parsed from an authorization
/// response.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Basic(Basic),
    Bearer(Bearer),
    Negotiate,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Basic {
    username: String,
    password: String,
    header: AuthHeader,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Bearer {
    token: String,
    header: AuthHeader,
}

/// The value of an HTTP `Authorization` header.
///
/// An empty header means the request is sent without one.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthHeader(String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unsupported authorization type: {0}")]
    UnsupportedType(String),

    #[error("invalid basic credential encoding")]
    BadEncoding,
}

// === impl Credential ===

impl Credential {
    /// Parses an authorization of the given `kind` carrying `data`.
    pub fn parse(kind: &str, data: &str) -> Result<Self, ParseError> {
        if kind.eq_ignore_ascii_case("basic") {
            let decoded = BASE64
                .decode(data.trim())
                .map_err(|_| ParseError::BadEncoding)?;
            let decoded = String::from_utf8(decoded).map_err(|_| ParseError::BadEncoding)?;
            let (username, password) = match decoded.split_once(':') {
                Some((user, pass)) => (user.to_string(), pass.to_string()),
                None => (decoded, String::new()),
            };
            return Ok(Self::Basic(Basic::new(username, password)));
        }

        if kind.eq_ignore_ascii_case("bearer") {
            return Ok(Self::Bearer(Bearer::new(data.to_string())));
        }

        if kind.eq_ignore_ascii_case("negotiate") {
            return Ok(Self::Negotiate);
        }

        Err(ParseError::UnsupportedType(kind.to_string()))
    }

    /// Parses an HTTP-style authorization value, e.g. `Basic YWxpY2U6czNjcmV0`.
    pub fn parse_authorization(authorization: &str) -> Result<Self, ParseError> {
        let authorization = authorization.trim_start();
        let (kind, data) = authorization
            .split_once(' ')
            .unwrap_or((authorization, ""));
        Self::parse(kind, data)
    }

    /// The header sent to the API server on behalf of this credential.
    pub fn header(&self) -> &AuthHeader {
        static NONE: AuthHeader = AuthHeader(String::new());
        match self {
            Self::Basic(basic) => &basic.header,
            Self::Bearer(bearer) => &bearer.header,
            Self::Negotiate => &NONE,
        }
    }

    /// The username known before confirmation.
    pub fn username(&self) -> &str {
        match self {
            Self::Basic(basic) => &basic.username,
            Self::Bearer(_) => "",
            Self::Negotiate => NEGOTIATE_PLACEHOLDER,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Basic(_) => "basic",
            Self::Bearer(_) => "bearer",
            Self::Negotiate => "negotiate",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic(basic) => f
                .debug_struct("Basic")
                .field("username", &basic.username)
                .finish_non_exhaustive(),
            Self::Bearer(_) => f.debug_struct("Bearer").finish_non_exhaustive(),
            Self::Negotiate => f.write_str("Negotiate"),
        }
    }
}

// === impl Basic ===

impl Basic {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let username = username.into();
        let password = password.into();
        let header = AuthHeader::basic(&username, &password);
        Self {
            username,
            password,
            header,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn header(&self) -> &AuthHeader {
        &self.header
    }
}

// === impl Bearer ===

impl Bearer {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        let header = AuthHeader(format!("Bearer {token}"));
        Self { token, header }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn header(&self) -> &AuthHeader {
        &self.header
    }
}

// === impl AuthHeader ===

impl AuthHeader {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn basic(username: &str, password: &str) -> Self {
        Self(format!(
            "Basic {}",
            BASE64.encode(format!("{username}:{password}"))
        ))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.split_once(' ') {
            Some((scheme, _)) => write!(f, "AuthHeader({scheme} <redacted>)"),
            None if self.0.is_empty() => f.write_str("AuthHeader(none)"),
            None => f.write_str("AuthHeader(<redacted>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic() {
        let data = BASE64.encode("alice:s3cret");
        match Credential::parse("basic", &data).unwrap() {
            Credential::Basic(basic) => {
                assert_eq!(basic.username(), "alice");
                assert_eq!(basic.password(), "s3cret");
                assert_eq!(basic.header().as_str(), format!("Basic {data}"));
            }
            cred => panic!("unexpected credential: {cred:?}"),
        }
    }

    #[test]
    fn basic_splits_on_first_colon() {
        let data = BASE64.encode("bob:pa:ss");
        let Credential::Basic(basic) = Credential::parse("BASIC", &data).unwrap() else {
            panic!("expected basic credential");
        };
        assert_eq!(basic.username(), "bob");
        assert_eq!(basic.password(), "pa:ss");
    }

    #[test]
    fn basic_without_colon_has_empty_password() {
        let data = BASE64.encode("carol");
        let Credential::Basic(basic) = Credential::parse("Basic", &data).unwrap() else {
            panic!("expected basic credential");
        };
        assert_eq!(basic.username(), "carol");
        assert_eq!(basic.password(), "");
    }

    #[test]
    fn basic_rejects_bad_encoding() {
        assert_eq!(
            Credential::parse("basic", "!!not base64!!"),
            Err(ParseError::BadEncoding)
        );
        let data = BASE64.encode([0xff, 0xfe, b':', b'x']);
        assert_eq!(
            Credential::parse("basic", &data),
            Err(ParseError::BadEncoding)
        );
    }

    #[test]
    fn parses_bearer_verbatim() {
        let Credential::Bearer(bearer) = Credential::parse("Bearer", "abc.def").unwrap() else {
            panic!("expected bearer credential");
        };
        assert_eq!(bearer.token(), "abc.def");
        assert_eq!(bearer.header().as_str(), "Bearer abc.def");

        let Credential::Bearer(empty) = Credential::parse("bearer", "").unwrap() else {
            panic!("expected bearer credential");
        };
        assert_eq!(empty.token(), "");
    }

    #[test]
    fn parses_negotiate() {
        let cred = Credential::parse("Negotiate", "ignored").unwrap();
        assert_eq!(cred, Credential::Negotiate);
        assert_eq!(cred.username(), NEGOTIATE_PLACEHOLDER);
        assert!(cred.header().is_empty());
    }

    #[test]
    fn rejects_unknown_type() {
        assert_eq!(
            Credential::parse("bogus", "x"),
            Err(ParseError::UnsupportedType("bogus".to_string()))
        );
    }

    #[test]
    fn parses_authorization_values() {
        let value = format!("Basic {}", BASE64.encode("alice:s3cret"));
        assert_eq!(Credential::parse_authorization(&value).unwrap().username(), "alice");
        assert_eq!(
            Credential::parse_authorization("negotiate").unwrap(),
            Credential::Negotiate
        );
        assert_eq!(
            Credential::parse_authorization("tls-cert /run/cert"),
            Err(ParseError::UnsupportedType("tls-cert".to_string()))
        );
    }

    #[test]
    fn debug_redacts_secrets() {
        let cred = Credential::Basic(Basic::new("alice", "s3cret"));
        let out = format!("{cred:?} {:?}", cred.header());
        assert!(!out.contains("s3cret"));
        assert!(out.contains("alice"));
    }
}
