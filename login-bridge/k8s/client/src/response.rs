use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;

/// A fully buffered API response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// The status line text, e.g. `404 Not Found`.
    pub fn status_text(&self) -> String {
        self.status.to_string()
    }
}
