use std::time::Duration;

/// An error produced while fetching an IP or checking the exit list.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The remote service rejected the caller (HTTP 401 or 403).
    #[error("authentication rejected: {0}")]
    Authentication(#[source] reqwest::Error),
    /// The service could not be reached or answered unexpectedly.
    #[error("communication failure: {0}")]
    Communication(#[from] CommunicationError),
}

impl Error {
    /// Returns `true` if a later attempt may succeed without reconfiguration.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Communication(_))
    }
}

/// Underlying cause of a [`Error::Communication`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CommunicationError {
    /// HTTP transport, proxy or status error.
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    /// Response body is not valid UTF-8.
    #[error("response body is not UTF-8: {0}")]
    Body(#[source] std::string::FromUtf8Error),
    /// DNS protocol error.
    #[error("dns: {0}")]
    Dns(#[from] hickory_client::proto::ProtoError),
    /// No DNS answer within the allotted time.
    #[error("dns lookup timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Communication(CommunicationError::Http(err))
    }
}
