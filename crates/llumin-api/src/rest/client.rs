// Machine-interface REST client
//
// Wraps `reqwest::Client` with token attachment and response validation.
// Every request goes through the TokenManager first, then carries the
// `LLuminAuth` and `LLuminService` headers. List endpoints must return
// array-shaped JSON; anything else is a contract violation.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::token::TokenManager;
use crate::transport::{AUTH_HEADER, SERVICE_HEADER, TransportConfig};

/// Authenticated HTTP client for the machine-interface REST API.
///
/// One method per remote operation (see `servers.rs`, `tags.rs`,
/// `assets.rs`). No retry logic beyond the token-refresh path: a failed
/// call is reported to the caller, who decides what to do.
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    service_name: String,
    tokens: Arc<TokenManager>,
}

impl RestClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` must end with a trailing slash so relative joins keep
    /// the full path.
    pub fn new(
        base_url: Url,
        service_name: impl Into<String>,
        tokens: Arc<TokenManager>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, service_name, tokens))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// Use this to share one connection pool between the client and the
    /// token manager.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        service_name: impl Into<String>,
        tokens: Arc<TokenManager>,
    ) -> Self {
        Self {
            http,
            base_url,
            service_name: service_name.into(),
            tokens,
        }
    }

    /// The endpoint base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The configured service name.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Build a full URL for an API path, e.g. `api/MachineInterface/GetTags`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        self.base_url.join(path).map_err(Error::InvalidUrl)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Attach auth headers and send, mapping 401 to an authentication error.
    async fn send_authed(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, Error> {
        let token = self.tokens.ensure_valid().await?;

        let resp = builder
            .header(AUTH_HEADER, token)
            .header(SERVICE_HEADER, &self.service_name)
            .send()
            .await
            .map_err(Error::Transport)?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "token rejected by the server".into(),
            });
        }
        Ok(resp)
    }

    /// GET an endpoint whose response must be a JSON array.
    pub(crate) async fn get_array<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, Error> {
        debug!("GET {}", url);
        let resp = self.send_authed(self.http.get(url)).await?;
        parse_array(resp).await
    }

    /// POST a JSON body and deserialize a single-object response.
    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        debug!("POST {}", url);
        let resp = self.send_authed(self.http.post(url).json(body)).await?;
        parse_object(resp).await
    }

    /// POST a JSON body, ignoring the response payload.
    pub(crate) async fn post_unit(&self, url: Url, body: &impl Serialize) -> Result<(), Error> {
        debug!("POST {}", url);
        let resp = self.send_authed(self.http.post(url).json(body)).await?;
        check_status(resp).await
    }

    /// PUT a JSON body, ignoring the response payload.
    pub(crate) async fn put_unit(&self, url: Url, body: &impl Serialize) -> Result<(), Error> {
        debug!("PUT {}", url);
        let resp = self.send_authed(self.http.put(url).json(body)).await?;
        check_status(resp).await
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url.as_str())
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}

// ── Response parsing ─────────────────────────────────────────────────

async fn check_status(resp: reqwest::Response) -> Result<(), Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        body,
    })
}

async fn read_success_body(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;
    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

/// Parse a response that the API contract requires to be array-shaped.
///
/// A non-array body is a [`Error::ContractViolation`] -- callers substitute
/// an empty collection at the boundary so iteration never fails downstream.
async fn parse_array<T: DeserializeOwned>(resp: reqwest::Response) -> Result<Vec<T>, Error> {
    let body = read_success_body(resp).await?;

    let value: serde_json::Value =
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.clone(),
        })?;

    let serde_json::Value::Array(items) = value else {
        return Err(Error::ContractViolation {
            expected: "array-shaped response",
            body,
        });
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })
        })
        .collect()
}

async fn parse_object<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let body = read_success_body(resp).await?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}
