/// Errors from the remote data service layer.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote service returned a non-2xx status code.
    #[error("Remote API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Machine-readable error code, when the service sent one.
        code: Option<String>,
        /// Human-readable message, or the raw body when unparseable.
        message: String,
    },

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Email not confirmed")]
    EmailNotConfirmed,

    #[error("Not authenticated")]
    NotAuthenticated,

    /// A response body did not have the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The access token could not be decoded.
    #[error("Invalid access token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// The service could not be reached.
    #[error("Remote service unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    /// Whether the failure is a transport problem rather than a rejection.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Request(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Unavailable(_) => true,
            _ => false,
        }
    }

    /// Whether retrying the same call later may succeed: transport failures,
    /// rate limiting, and server-side (5xx) errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => self.is_network(),
        }
    }
}
