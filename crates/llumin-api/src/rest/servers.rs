// Interface-server endpoints
//
// CRUD for the remote inventory of interface servers. Identity is
// assigned by the remote system on Add and unknown until the call returns.

use serde_json::json;
use tracing::debug;

use crate::error::Error;
use crate::models::{AssignedId, NewServer, ServerRecord, ServerUpdate};
use crate::rest::client::RestClient;

impl RestClient {
    /// List all registered interface servers.
    ///
    /// `GET api/MachineInterface/GetServers`
    pub async fn list_servers(&self) -> Result<Vec<ServerRecord>, Error> {
        let url = self.api_url("api/MachineInterface/GetServers")?;
        debug!("listing interface servers");
        self.get_array(url).await
    }

    /// Register a new interface server; returns the remote-assigned id.
    ///
    /// `POST api/MachineInterface/AddServer`
    pub async fn add_server(&self, server: &NewServer) -> Result<i64, Error> {
        let url = self.api_url("api/MachineInterface/AddServer")?;
        debug!(name = %server.server_name, "adding interface server");
        let assigned: AssignedId = self.post_json(url, server).await?;
        Ok(assigned.id)
    }

    /// Update an existing interface server.
    ///
    /// `PUT api/MachineInterface/UpdateServer`
    pub async fn update_server(&self, server: &ServerUpdate) -> Result<(), Error> {
        let url = self.api_url("api/MachineInterface/UpdateServer")?;
        debug!(id = server.server_id, "updating interface server");
        self.put_unit(url, server).await
    }

    /// Delete an interface server by id.
    ///
    /// `POST api/MachineInterface/DeleteServer`
    pub async fn delete_server(&self, server_id: i64) -> Result<(), Error> {
        let url = self.api_url("api/MachineInterface/DeleteServer")?;
        debug!(id = server_id, "deleting interface server");
        self.post_unit(url, &json!({ "ServerId": server_id })).await
    }
}
