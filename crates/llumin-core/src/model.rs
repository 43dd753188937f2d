// Domain model
//
// Clean local shapes for the wire records in `llumin_api::models`, plus
// the sample and outcome types that make up the bridge's input/output
// boundary. Conversions live in `convert.rs`.

use chrono::{DateTime, Utc};

/// A measurement sample delivered by the host pipeline.
///
/// Equality is field-wise value equality of (value, quality, timestamp);
/// the dedup logic in [`crate::cache::TagCache`] relies on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub value: serde_json::Value,
    pub quality: String,
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    pub fn new(
        value: serde_json::Value,
        quality: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            value,
            quality: quality.into(),
            timestamp,
        }
    }
}

/// A measurement point registered with the remote system.
///
/// `id` is remote-assigned and immutable after registration.
#[derive(Debug, Clone)]
pub struct Tag {
    pub id: i64,
    pub server_id: i64,
    /// The local topic name the host pipeline uses for this point.
    pub topic: String,
    pub asset_code: String,
    pub data_type: String,
}

/// An interface server in the remote inventory.
#[derive(Debug, Clone)]
pub struct RemoteServer {
    pub id: i64,
    pub name: String,
    pub connection_url: Option<String>,
    pub protocol: Option<String>,
    pub connection_data: Option<String>,
    pub is_inactive: bool,
}

/// An asset record from the asset register.
#[derive(Debug, Clone)]
pub struct Asset {
    pub code: String,
    pub description: Option<String>,
    pub parent_code: Option<String>,
    pub division_id: Option<String>,
    pub equipment_id: Option<String>,
    pub is_inactive: bool,
}

/// Outcome of processing one sample through the bridge.
///
/// Failures never surface as errors to the host -- a sample that could
/// not be delivered simply reports why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Handed to the hub for transmission (fire-and-forget).
    Sent,
    /// Identical to the last pushed sample for this topic; suppressed.
    Suppressed,
    /// The hub is paused by the server; the sample was dropped.
    DroppedPaused,
    /// The hub could not accept the sample synchronously.
    DroppedDisconnected,
    /// Remote registration yielded no id; the tag was not cached and
    /// registration is retried on the next observation of the topic.
    RegistrationFailed,
}
