//! `coralogix_webhook` data source.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::clients::{webhooks as rpc, ClientSet};
use crate::data_sources::{by_name, lookup, Lookup};
use crate::error::ProviderError;
use crate::resource::{Clients, DataSource};
use crate::resources::webhook::{get_webhook, webhook_schema, WebhookModel};
use crate::schema::Schema;
use crate::sdk::webhooks::ListAllOutgoingWebhooksRequest;
use crate::transcode::Result;

/// Looks a webhook up by ID or by name.
#[derive(Default)]
pub struct WebhookDataSource {
    clients: Clients,
}

async fn webhook_id_by_name(clients: &ClientSet, name: &str) -> Result<String> {
    let request = ListAllOutgoingWebhooksRequest {};
    debug!(name, "Looking up webhook by name");
    let response = clients
        .webhooks
        .list(request.clone())
        .await
        .map_err(|status| ProviderError::rpc(rpc::LIST_ALL_OUTGOING_WEBHOOKS, &request, status))?;
    by_name(
        "webhooks",
        name,
        response.deployed.into_iter().map(|summary| (summary.name, summary.id)),
    )
}

#[async_trait]
impl DataSource for WebhookDataSource {
    type Model = WebhookModel;

    fn type_name(&self) -> &'static str {
        "coralogix_webhook"
    }

    fn schema(&self) -> Schema {
        webhook_schema().into_lookup(&["id", "name"])
    }

    fn configure(&mut self, clients: Arc<ClientSet>) {
        self.clients.set(clients);
    }

    async fn read(&self, config: WebhookModel) -> Result<WebhookModel> {
        let clients = self.clients.get()?;
        let id = match lookup(&config.id, &config.name)? {
            Lookup::Id(id) => id.to_string(),
            Lookup::Name(name) => webhook_id_by_name(clients, name).await?,
        };
        get_webhook(clients, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{DynDataSource, DynResource};
    use crate::resources::webhook::custom_config;
    use crate::resources::WebhookResource;
    use crate::testing::FakeCoralogix;
    use serde_json::{json, Value};

    async fn create(fake: &Arc<FakeCoralogix>, name: &str) -> Value {
        let mut resource = WebhookResource::default();
        DynResource::configure(&mut resource, fake.client_set());
        let plan = resource.plan(None, custom_config(name)).unwrap();
        DynResource::create(&resource, plan.planned_state).await.unwrap()
    }

    fn data_source(fake: &Arc<FakeCoralogix>) -> WebhookDataSource {
        let mut data_source = WebhookDataSource::default();
        DynDataSource::configure(&mut data_source, fake.client_set());
        data_source
    }

    #[tokio::test]
    async fn test_read_by_id_and_name() {
        let fake = FakeCoralogix::new();
        let created = create(&fake, "pager").await;
        create(&fake, "other").await;
        let data_source = data_source(&fake);

        let by_id = DynDataSource::read(&data_source, json!({ "id": created["id"] })).await.unwrap();
        assert_eq!(by_id, created);

        let by_name = DynDataSource::read(&data_source, json!({ "name": "pager" })).await.unwrap();
        assert_eq!(by_name, created);
    }

    #[tokio::test]
    async fn test_ambiguous_name_fails() {
        let fake = FakeCoralogix::new();
        create(&fake, "pager").await;
        create(&fake, "pager").await;
        let data_source = data_source(&fake);

        let err = DynDataSource::read(&data_source, json!({ "name": "pager" })).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        let err = DynDataSource::read(&data_source, json!({ "name": "nobody" })).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_schema_wants_id_or_name() {
        let data_source = WebhookDataSource::default();
        let both = DynDataSource::validate(&data_source, &json!({ "id": "a", "name": "b" }));
        assert!(both.iter().any(|d| d.summary == "Conflicting arguments"));
        assert!(DynDataSource::validate(&data_source, &json!({ "name": "b" })).is_empty());
    }
}
