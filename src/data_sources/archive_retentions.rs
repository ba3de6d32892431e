//! `coralogix_archive_retentions` data source.

use std::sync::Arc;

use async_trait::async_trait;

use crate::clients::ClientSet;
use crate::resource::{Clients, DataSource};
use crate::resources::archive_retentions::{
    archive_retentions_schema, flatten_retentions, get_retentions, ArchiveRetentionsModel,
};
use crate::schema::Schema;
use crate::transcode::Result;

/// Reads the account's archive retention tiers.
#[derive(Default)]
pub struct ArchiveRetentionsDataSource {
    clients: Clients,
}

#[async_trait]
impl DataSource for ArchiveRetentionsDataSource {
    type Model = ArchiveRetentionsModel;

    fn type_name(&self) -> &'static str {
        "coralogix_archive_retentions"
    }

    fn schema(&self) -> Schema {
        archive_retentions_schema().into_lookup(&[])
    }

    fn configure(&mut self, clients: Arc<ClientSet>) {
        self.clients.set(clients);
    }

    async fn read(&self, _config: ArchiveRetentionsModel) -> Result<ArchiveRetentionsModel> {
        Ok(flatten_retentions(get_retentions(self.clients.get()?).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::DynDataSource;
    use crate::resources::archive_retentions::{DEFAULT_RETENTION_NAME, RETENTIONS_ID};
    use crate::testing::FakeCoralogix;
    use serde_json::json;

    #[tokio::test]
    async fn test_reads_all_tiers() {
        let fake = FakeCoralogix::new();
        fake.state().retentions[2].name = "long".to_string();
        let mut data_source = ArchiveRetentionsDataSource::default();
        DynDataSource::configure(&mut data_source, fake.client_set());

        assert!(DynDataSource::validate(&data_source, &json!({})).is_empty());
        let read = DynDataSource::read(&data_source, json!({})).await.unwrap();
        assert_eq!(read["id"], RETENTIONS_ID);
        assert_eq!(read["retentions"].as_array().unwrap().len(), 4);
        assert_eq!(read["retentions"][0]["name"], DEFAULT_RETENTION_NAME);
        assert_eq!(read["retentions"][2]["name"], "long");
        assert_eq!(read["retentions"][2]["editable"], true);
    }
}
