// Bridge configuration
//
// Credentials and endpoint settings, immutable after construction. The
// host process builds one of these at startup and hands it to `Bridge`.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use llumin_api::hub::ReconnectConfig;

/// Service name the machine interface expects unless overridden.
pub const DEFAULT_SERVICE_NAME: &str = "LLuminMachineInterface";

/// TLS verification mode (core-level mirror of the api crate's TlsMode).
#[derive(Debug, Clone, Default)]
pub enum TlsVerification {
    #[default]
    SystemDefaults,
    CustomCa(PathBuf),
    DangerAcceptInvalid,
}

/// Connection settings for one LLumin endpoint.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// REST base URL, e.g. `https://llumin.example.com/`.
    pub base_url: Url,
    pub username: String,
    pub password: SecretString,
    /// Sent as the `LLuminService` header on every call.
    pub service_name: String,
    /// The interface server whose tags this bridge feeds.
    pub server_id: i64,
    pub timeout: Duration,
    pub tls: TlsVerification,
    /// Hub endpoint override, mainly for tests. Defaults to
    /// `{base_url}/signalr` with the scheme mapped to ws(s).
    pub hub_url: Option<Url>,
    pub reconnect: ReconnectConfig,
}

impl BridgeConfig {
    /// Build a config with defaults for everything but the credentials.
    pub fn new(base_url: Url, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            base_url,
            username: username.into(),
            password,
            service_name: DEFAULT_SERVICE_NAME.into(),
            server_id: 1,
            timeout: Duration::from_secs(30),
            tls: TlsVerification::default(),
            hub_url: None,
            reconnect: ReconnectConfig::default(),
        }
    }

    /// The base URL with a guaranteed trailing slash, so relative joins
    /// (`api/GetToken`, `signalr`) keep the full path.
    pub fn normalized_url(&self) -> Url {
        let mut url = self.base_url.clone();
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url
    }
}
