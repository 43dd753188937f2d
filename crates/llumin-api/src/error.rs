use thiserror::Error;

/// Top-level error type for the `llumin-api` crate.
///
/// Covers every failure mode across both API surfaces: token acquisition,
/// REST transport, response-shape violations, and the realtime hub channel.
/// `llumin-core` absorbs these at the bridge boundary.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token acquisition rejected or a call was made with an invalid token.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The hub rejected the connection credentials.
    #[error("Hub rejected credentials")]
    Unauthorized,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── REST API ────────────────────────────────────────────────────
    /// Non-success HTTP status from an API endpoint.
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// Response had an unexpected shape (e.g. a list endpoint returned
    /// something other than an array). The raw body is kept for debugging.
    #[error("Contract violation: expected {expected}")]
    ContractViolation { expected: &'static str, body: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Hub channel ─────────────────────────────────────────────────
    /// Hub connection attempt failed.
    #[error("Hub connection failed: {0}")]
    HubConnect(String),

    /// The channel has been closed by explicit teardown.
    #[error("Hub channel closed")]
    ChannelClosed,
}

impl Error {
    /// Returns `true` if this error indicates credentials were rejected
    /// and re-acquiring the token might resolve it.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Unauthorized)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::HubConnect(_) => true,
            _ => false,
        }
    }
}
