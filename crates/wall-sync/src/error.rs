use std::fmt;

use reqwest::StatusCode;
use tokio_tungstenite::tungstenite;

#[derive(Debug)]
pub enum SyncError {
    Http(reqwest::Error),
    WebSocket(tungstenite::Error),
    Status(StatusCode),
    Malformed(String),
    Timeout(&'static str),
    Config(String),
}

/// Recovery class of a [`SyncError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retried on the next poll or after backoff.
    Transport,
    /// The offending unit is discarded.
    MalformedPayload,
    /// Setup failure; surfaced to the caller.
    Config,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Http(e) if e.is_decode() => ErrorKind::MalformedPayload,
            SyncError::Http(_)
            | SyncError::WebSocket(_)
            | SyncError::Status(_)
            | SyncError::Timeout(_) => ErrorKind::Transport,
            SyncError::Malformed(_) => ErrorKind::MalformedPayload,
            SyncError::Config(_) => ErrorKind::Config,
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Http(e) => write!(f, "HTTP error: {e}"),
            SyncError::WebSocket(e) => write!(f, "WebSocket error: {e}"),
            SyncError::Status(code) => write!(f, "unexpected status: {code}"),
            SyncError::Malformed(msg) => write!(f, "malformed payload: {msg}"),
            SyncError::Timeout(what) => write!(f, "{what} timed out"),
            SyncError::Config(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Http(e) => Some(e),
            SyncError::WebSocket(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Http(e)
    }
}

/// A rejected upgrade carries the HTTP status of the refusal.
impl From<tungstenite::Error> for SyncError {
    fn from(e: tungstenite::Error) -> Self {
        match e {
            tungstenite::Error::Http(response) => SyncError::Status(response.status()),
            other => SyncError::WebSocket(other),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Malformed(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            SyncError::Status(StatusCode::BAD_GATEWAY).kind(),
            ErrorKind::Transport
        );
        assert_eq!(SyncError::Timeout("poll").kind(), ErrorKind::Transport);
        assert_eq!(
            SyncError::Malformed("x".into()).kind(),
            ErrorKind::MalformedPayload
        );
        assert_eq!(SyncError::Config("x".into()).kind(), ErrorKind::Config);
    }

    #[test]
    fn test_websocket_errors_are_transport() {
        let closed: SyncError = tungstenite::Error::ConnectionClosed.into();
        assert!(matches!(closed, SyncError::WebSocket(_)));
        assert_eq!(closed.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_json_error_is_malformed() {
        let err: SyncError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::MalformedPayload);
        assert!(err.to_string().starts_with("malformed payload"));
    }
}
