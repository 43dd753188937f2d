//! Wire framing for the classic hub protocol.
//!
//! Client invocations go out as `{"H": hub, "M": method, "A": [args], "I": seq}`.
//! Server frames carry zero or more invocations under `"M"`; an empty
//! object `{}` is a keepalive. Only the control methods the machine
//! interface actually sends (`echo`, `pause`, `resume`, `tagsLoaded`) are
//! given structured handling -- anything else is logged and skipped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A client-to-server hub invocation.
#[derive(Debug, Serialize)]
pub struct ClientInvocation<'a> {
    #[serde(rename = "H")]
    pub hub: &'a str,
    #[serde(rename = "M")]
    pub method: &'a str,
    #[serde(rename = "A")]
    pub args: Vec<serde_json::Value>,
    #[serde(rename = "I")]
    pub id: u64,
}

/// A server-to-client hub invocation.
#[derive(Debug, Deserialize)]
pub struct ServerInvocation {
    #[serde(rename = "H", default)]
    pub hub: String,
    #[serde(rename = "M", default)]
    pub method: String,
    #[serde(rename = "A", default)]
    pub args: Vec<serde_json::Value>,
}

/// A raw inbound frame. Keepalives deserialize to an empty message list.
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "M", default)]
    pub messages: Vec<ServerInvocation>,
}

/// Parse an inbound text frame, logging and skipping malformed payloads.
pub fn parse_frame(text: &str) -> Option<InboundFrame> {
    match serde_json::from_str(text) {
        Ok(frame) => Some(frame),
        Err(e) => {
            debug!(error = %e, "failed to parse hub frame");
            None
        }
    }
}

/// Control messages the server sends over the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Diagnostic echo of a previously sent message.
    Echo,
    /// Stop transmitting value updates until resumed.
    Pause,
    /// Resume value-update transmission.
    Resume,
    /// The server reloaded its tag list; consumers should refetch.
    TagsLoaded,
}

impl ControlMessage {
    /// Map a server invocation's method name to a control message.
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "echo" => Some(Self::Echo),
            "pause" => Some(Self::Pause),
            "resume" => Some(Self::Resume),
            "tagsLoaded" => Some(Self::TagsLoaded),
            _ => None,
        }
    }
}

/// Payload of the outbound `UpdateTagValue` invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagValueUpdate {
    pub id: i64,
    pub date_updated: DateTime<Utc>,
    pub value: serde_json::Value,
    pub quality: String,
}
