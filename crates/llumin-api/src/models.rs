// Wire types for the machine-interface REST API.
//
// The API uses PascalCase field names throughout. Optional fields use
// `#[serde(default)]` because the server omits fields inconsistently
// across versions; unknown fields land in `extra` so nothing is dropped.

use serde::{Deserialize, Serialize};

// ── Servers ──────────────────────────────────────────────────────────

/// One interface server from `GetServers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerRecord {
    pub server_id: i64,
    pub server_name: String,
    #[serde(default)]
    pub connection_url: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub connection_data: Option<String>,
    #[serde(default)]
    pub is_inactive: bool,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Request body for `AddServer`. The remote system assigns the id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewServer {
    pub server_name: String,
    pub connection_url: String,
    pub protocol: String,
    pub connection_data: String,
    pub is_inactive: bool,
}

/// Request body for `UpdateServer`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerUpdate {
    pub server_id: i64,
    pub server_name: String,
    pub connection_url: String,
    pub protocol: String,
    pub connection_data: String,
    pub is_inactive: bool,
}

/// Identity assigned by the remote system on a successful Add call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssignedId {
    pub id: i64,
}

// ── Tags ─────────────────────────────────────────────────────────────

/// One monitored tag from `GetTags`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagRecord {
    pub id: i64,
    pub server_id: i64,
    pub tag_name: String,
    #[serde(default)]
    pub asset_code: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Request body for `AddTag`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewTag {
    pub server_id: i64,
    pub tag_name: String,
    pub asset_code: String,
    pub data_type: String,
}

// ── Assets ───────────────────────────────────────────────────────────

/// One asset record from `Asset/Search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssetRecord {
    pub asset_code: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_asset_code: Option<String>,
    #[serde(default)]
    pub division_id: Option<String>,
    #[serde(default)]
    pub equipment_id: Option<String>,
    #[serde(default)]
    pub is_inactive: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
