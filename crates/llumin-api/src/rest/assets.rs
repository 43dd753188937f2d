// Asset search endpoint
//
// Assets live outside the machine-interface namespace (`api/Asset/...`)
// but share the same auth headers.

use tracing::debug;

use crate::error::Error;
use crate::models::AssetRecord;
use crate::rest::client::RestClient;

impl RestClient {
    /// Search the asset register by text.
    ///
    /// `GET api/Asset/Search?text=&exactMatch=&pageSize=`
    pub async fn search_assets(
        &self,
        text: &str,
        exact_match: bool,
        page_size: u32,
    ) -> Result<Vec<AssetRecord>, Error> {
        let mut url = self.api_url("api/Asset/Search")?;
        url.query_pairs_mut()
            .append_pair("text", text)
            .append_pair("exactMatch", if exact_match { "true" } else { "false" })
            .append_pair("pageSize", &page_size.to_string());

        debug!(text, "searching assets");
        self.get_array(url).await
    }
}
