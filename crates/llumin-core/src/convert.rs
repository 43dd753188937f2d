// Wire -> domain conversions

use llumin_api::models::{AssetRecord, ServerRecord, ServerUpdate, TagRecord};

use crate::model::{Asset, RemoteServer, Tag};

impl From<ServerRecord> for RemoteServer {
    fn from(record: ServerRecord) -> Self {
        Self {
            id: record.server_id,
            name: record.server_name,
            connection_url: record.connection_url,
            protocol: record.protocol,
            connection_data: record.connection_data,
            is_inactive: record.is_inactive,
        }
    }
}

impl From<&RemoteServer> for ServerUpdate {
    fn from(server: &RemoteServer) -> Self {
        Self {
            server_id: server.id,
            server_name: server.name.clone(),
            connection_url: server.connection_url.clone().unwrap_or_default(),
            protocol: server.protocol.clone().unwrap_or_default(),
            connection_data: server.connection_data.clone().unwrap_or_default(),
            is_inactive: server.is_inactive,
        }
    }
}

impl From<TagRecord> for Tag {
    fn from(record: TagRecord) -> Self {
        Self {
            id: record.id,
            server_id: record.server_id,
            topic: record.tag_name,
            asset_code: record.asset_code.unwrap_or_default(),
            data_type: record.data_type.unwrap_or_default(),
        }
    }
}

impl From<AssetRecord> for Asset {
    fn from(record: AssetRecord) -> Self {
        Self {
            code: record.asset_code,
            description: record.description,
            parent_code: record.parent_asset_code,
            division_id: record.division_id,
            equipment_id: record.equipment_id,
            is_inactive: record.is_inactive,
        }
    }
}
