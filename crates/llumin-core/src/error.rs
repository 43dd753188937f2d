use thiserror::Error;

/// Error type for the bridge layer.
///
/// Most bridge operations absorb failures and return degraded results
/// instead of errors (see `bridge.rs`); this type covers the few
/// construction and connection paths that are genuinely fallible.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Propagated from the API crate.
    #[error("API error: {0}")]
    Api(#[from] llumin_api::Error),

    /// Invalid bridge configuration.
    #[error("invalid {field}: {reason}")]
    Config {
        field: &'static str,
        reason: String,
    },
}
