/// AMQP reply code for `ACCESS_REFUSED`.
pub const ACCESS_REFUSED: u16 = 403;
/// AMQP reply code for `NOT_FOUND`.
pub const NOT_FOUND: u16 = 404;

/// Coarse classification of a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    Forbidden,
    NotFound,
    Connection,
    Other,
}

/// Error raised by a transport implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("access refused: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("session closed: {0}")]
    SessionClosed(String),
    #[error("broker replied {code}: {text}")]
    Broker { code: u16, text: String },
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Classify a broker reply (e.g. from a channel shutdown).
    pub fn from_reply_code(code: u16, text: impl Into<String>) -> Self {
        let text = text.into();
        match code {
            ACCESS_REFUSED => TransportError::Forbidden(text),
            NOT_FOUND => TransportError::NotFound(text),
            _ => TransportError::Broker { code, text },
        }
    }

    pub fn kind(&self) -> TransportErrorKind {
        match self {
            TransportError::Forbidden(_) => TransportErrorKind::Forbidden,
            TransportError::NotFound(_) => TransportErrorKind::NotFound,
            TransportError::ConnectionFailed(_) | TransportError::SessionClosed(_) => {
                TransportErrorKind::Connection
            }
            TransportError::Broker { .. } | TransportError::Other(_) => TransportErrorKind::Other,
        }
    }
}
