// Tag endpoints
//
// Tags are the monitored measurement points. Registration assigns the
// remote id; removal is an explicit administrative operation.

use serde_json::json;
use tracing::debug;

use crate::error::Error;
use crate::models::{AssignedId, NewTag, TagRecord};
use crate::rest::client::RestClient;

impl RestClient {
    /// List all tags registered for monitoring.
    ///
    /// `GET api/MachineInterface/GetTags`
    pub async fn list_tags(&self) -> Result<Vec<TagRecord>, Error> {
        let url = self.api_url("api/MachineInterface/GetTags")?;
        debug!("listing monitored tags");
        self.get_array(url).await
    }

    /// Register a new tag; returns the remote-assigned id.
    ///
    /// `POST api/MachineInterface/AddTag`
    pub async fn add_tag(&self, tag: &NewTag) -> Result<i64, Error> {
        let url = self.api_url("api/MachineInterface/AddTag")?;
        debug!(name = %tag.tag_name, server_id = tag.server_id, "adding tag");
        let assigned: AssignedId = self.post_json(url, tag).await?;
        Ok(assigned.id)
    }

    /// Remove a tag from monitoring by id.
    ///
    /// `POST api/MachineInterface/RemoveTag`
    pub async fn remove_tag(&self, id: i64) -> Result<(), Error> {
        let url = self.api_url("api/MachineInterface/RemoveTag")?;
        debug!(id, "removing tag");
        self.post_unit(url, &json!({ "Id": id })).await
    }
}
