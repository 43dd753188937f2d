//! Bearer-token acquisition with single-flight coalescing.
//!
//! The machine interface issues opaque bearer tokens from `api/GetToken`,
//! valid for a fixed one-hour window. Every outbound call (REST and hub)
//! goes through [`TokenManager::ensure_valid`] first. Concurrent callers
//! queue on the internal mutex: the first one performs the refresh while
//! the rest wait and then find a valid token, so at most one acquisition
//! request is ever in flight.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;

/// Fixed validity window applied from the moment of acquisition.
pub const TOKEN_VALIDITY: Duration = Duration::from_secs(3600);

#[derive(Debug, Default)]
struct TokenState {
    token: Option<String>,
    expires_at: Option<Instant>,
}

impl TokenState {
    /// The current token, if one exists and has not expired.
    fn valid_token(&self, now: Instant) -> Option<&str> {
        match (&self.token, self.expires_at) {
            (Some(token), Some(expires_at)) if now < expires_at => Some(token),
            _ => None,
        }
    }
}

/// Owns the bearer token and its expiry for one set of credentials.
///
/// Shared between the REST client and the hub channel via `Arc`. All
/// mutation happens while holding the internal mutex, which doubles as
/// the single-flight guard for refresh requests.
pub struct TokenManager {
    http: reqwest::Client,
    token_url: Url,
    username: String,
    password: SecretString,
    state: Mutex<TokenState>,
}

impl TokenManager {
    /// Create a token manager for the given endpoint and credentials.
    ///
    /// `base_url` must end with a trailing slash so relative joins keep
    /// the full path (`llumin-core` normalizes this).
    pub fn new(
        base_url: &Url,
        username: impl Into<String>,
        password: SecretString,
        http: reqwest::Client,
    ) -> Result<Self, Error> {
        let token_url = base_url.join("api/GetToken").map_err(Error::InvalidUrl)?;
        Ok(Self {
            http,
            token_url,
            username: username.into(),
            password,
            state: Mutex::new(TokenState::default()),
        })
    }

    /// Ensure a valid (non-expired) token exists and return it.
    ///
    /// Callable concurrently from many tasks; only one underlying
    /// acquisition request is issued. Waiters share the outcome: they
    /// acquire the mutex after the refresh finishes, re-check expiry,
    /// and return the fresh token without a second request.
    ///
    /// On failure the expiry stays in the past, so the next call
    /// attempts the refresh again.
    pub async fn ensure_valid(&self) -> Result<String, Error> {
        let mut state = self.state.lock().await;

        if let Some(token) = state.valid_token(Instant::now()) {
            return Ok(token.to_owned());
        }

        debug!("access token missing or expired, requesting a new one");
        let token = self.request_token().await.inspect_err(|e| {
            warn!(error = %e, "token acquisition failed");
        })?;

        state.token = Some(token.clone());
        state.expires_at = Some(Instant::now() + TOKEN_VALIDITY);
        debug!("access token refreshed");
        Ok(token)
    }

    /// Force the next [`ensure_valid`](Self::ensure_valid) to re-acquire.
    ///
    /// Used by the hub channel after an unauthorized error so the stale
    /// token is never reused.
    pub async fn invalidate(&self) {
        self.state.lock().await.expires_at = None;
        debug!("access token invalidated");
    }

    /// `POST api/GetToken` -- the response body is the opaque token itself.
    async fn request_token(&self) -> Result<String, Error> {
        let body = json!({
            "username": self.username,
            "password": self.password.expose_secret(),
        });

        let resp = self
            .http
            .post(self.token_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("token request failed (HTTP {status}): {body}"),
            });
        }

        // Some deployments return the token as a bare string, others as a
        // JSON-encoded string. Strip the quotes either way.
        let raw = resp.text().await.map_err(Error::Transport)?;
        let token = raw.trim().trim_matches('"').to_owned();
        if token.is_empty() {
            return Err(Error::Authentication {
                message: "token endpoint returned an empty body".into(),
            });
        }
        Ok(token)
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("token_url", &self.token_url.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
