//! Control messages exchanged with the host over the framed channel.

use crate::LoginDescriptor;
use serde::{Deserialize, Serialize};

/// The protocol version announced in `init` messages.
pub const VERSION: u32 = 1;

/// The challenge sent to ask the host for any authorization header.
pub const ANY_CHALLENGE: &str = "*";

/// The challenge sent to ask the host to restart a negotiate exchange.
pub const NEGOTIATE_CHALLENGE: &str = "negotiate";

/// Ends the channel name that starts every payload. Control messages use the
/// empty channel.
const CHANNEL_TERMINATOR: u8 = b'\n';

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Message {
    Authorize(Authorize),
    Init(Init),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorize {
    pub cookie: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Init {
    pub version: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<Problem>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(rename = "login-data", skip_serializing_if = "Option::is_none")]
    pub login_data: Option<LoginDescriptor>,
}

/// The problem codes understood by the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Problem {
    AuthenticationFailed,
    AuthenticationUnavailable,
    InternalError,
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid control message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected an authorize message")]
    UnexpectedCommand,

    #[error("authorize message has cookie {0:?}")]
    CookieMismatch(String),

    #[error("authorize message carries no response")]
    MissingResponse,
}

#[derive(Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
enum Received {
    Authorize(Authorize),
    #[serde(other)]
    Other,
}

// === impl Message ===

impl Message {
    pub fn challenge(cookie: impl Into<String>, challenge: impl Into<String>) -> Self {
        Self::Authorize(Authorize {
            cookie: cookie.into(),
            challenge: Some(challenge.into()),
            response: None,
        })
    }

    pub fn problem(problem: Problem, message: impl Into<String>) -> Self {
        Self::Init(Init {
            version: VERSION,
            problem: Some(problem),
            message: Some(message.into()),
            user: None,
            login_data: None,
        })
    }

    pub fn login(user: impl Into<String>, login_data: LoginDescriptor) -> Self {
        Self::Init(Init {
            version: VERSION,
            problem: None,
            message: None,
            user: Some(user.into()),
            login_data: Some(login_data),
        })
    }

    /// Encodes the message as a control-channel payload: the empty channel
    /// name and its `\n` terminator, then the JSON body.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut payload = vec![CHANNEL_TERMINATOR];
        serde_json::to_writer(&mut payload, self)?;
        Ok(payload)
    }
}

// === impl Authorize ===

impl Authorize {
    /// Decodes the host's reply to a challenge identified by `cookie`,
    /// returning the authorization response it carries.
    pub fn response_to(cookie: &str, payload: &[u8]) -> Result<String, ProtocolError> {
        let msg = match serde_json::from_slice::<Received>(payload)? {
            Received::Authorize(msg) => msg,
            Received::Other => return Err(ProtocolError::UnexpectedCommand),
        };

        if msg.cookie != cookie {
            return Err(ProtocolError::CookieMismatch(msg.cookie));
        }
        msg.response.ok_or(ProtocolError::MissingResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_challenge() {
        let msg = Message::challenge("session1", ANY_CHALLENGE);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "command": "authorize", "cookie": "session1", "challenge": "*" })
        );
    }

    #[test]
    fn encodes_problem() {
        let msg = Message::problem(Problem::AuthenticationFailed, "bad password");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "command": "init",
                "version": 1,
                "problem": "authentication-failed",
                "message": "bad password",
            })
        );
    }

    #[test]
    fn payloads_use_the_control_channel() {
        let payload = Message::challenge("session1", ANY_CHALLENGE)
            .to_payload()
            .unwrap();
        assert_eq!(
            payload,
            b"\n{\"command\":\"authorize\",\"cookie\":\"session1\",\"challenge\":\"*\"}"
        );

        let payload = Message::problem(Problem::InternalError, "x")
            .to_payload()
            .unwrap();
        assert_eq!(payload[0], b'\n');
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&payload).unwrap(),
            json!({ "command": "init", "version": 1, "problem": "internal-error", "message": "x" })
        );
    }

    #[test]
    fn decodes_response() {
        let payload = br#"
{"command":"authorize","cookie":"session1","response":"Basic YWxpY2U6czNjcmV0"}"#;
        assert_eq!(
            Authorize::response_to("session1", payload).unwrap(),
            "Basic YWxpY2U6czNjcmV0"
        );
        assert_eq!(
            Authorize::response_to("session1", &payload[1..]).unwrap(),
            "Basic YWxpY2U6czNjcmV0"
        );
    }

    #[test]
    fn rejects_unexpected_replies() {
        assert!(matches!(
            Authorize::response_to("a", br#"{"command":"init","version":1}"#),
            Err(ProtocolError::UnexpectedCommand)
        ));
        assert!(matches!(
            Authorize::response_to("a", br#"{"command":"authorize","cookie":"b","response":"x"}"#),
            Err(ProtocolError::CookieMismatch(c)) if c == "b"
        ));
        assert!(matches!(
            Authorize::response_to("a", br#"{"command":"authorize","cookie":"a"}"#),
            Err(ProtocolError::MissingResponse)
        ));
        assert!(matches!(
            Authorize::response_to("a", b"not json"),
            Err(ProtocolError::Json(_))
        ));
    }
}
