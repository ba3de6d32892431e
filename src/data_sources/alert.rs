//! `coralogix_alert` data source.

use std::sync::Arc;

use async_trait::async_trait;

use crate::clients::ClientSet;
use crate::resource::{Clients, DataSource};
use crate::resources::alert::{alert_schema, get_alert, AlertModel};
use crate::schema::Schema;
use crate::transcode::{required, Result};

/// Looks an alert up by ID.
#[derive(Default)]
pub struct AlertDataSource {
    clients: Clients,
}

#[async_trait]
impl DataSource for AlertDataSource {
    type Model = AlertModel;

    fn type_name(&self) -> &'static str {
        "coralogix_alert"
    }

    fn schema(&self) -> Schema {
        alert_schema().into_lookup(&["id"])
    }

    fn configure(&mut self, clients: Arc<ClientSet>) {
        self.clients.set(clients);
    }

    async fn read(&self, config: AlertModel) -> Result<AlertModel> {
        get_alert(self.clients.get()?, required("id", &config.id)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{DynDataSource, DynResource};
    use crate::resources::alert::threshold_config;
    use crate::resources::AlertResource;
    use crate::testing::FakeCoralogix;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_by_id() {
        let fake = FakeCoralogix::new();
        let mut resource = AlertResource::default();
        DynResource::configure(&mut resource, fake.client_set());
        let plan = resource.plan(None, threshold_config()).unwrap();
        let created = DynResource::create(&resource, plan.planned_state).await.unwrap();

        let mut data_source = AlertDataSource::default();
        DynDataSource::configure(&mut data_source, fake.client_set());
        let read = DynDataSource::read(&data_source, json!({ "id": created["id"] })).await.unwrap();
        assert_eq!(read, created);
    }

    #[tokio::test]
    async fn test_missing_alert_fails() {
        let fake = FakeCoralogix::new();
        let mut data_source = AlertDataSource::default();
        DynDataSource::configure(&mut data_source, fake.client_set());
        let err = DynDataSource::read(&data_source, json!({ "id": "alert-404" })).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_schema_requires_id() {
        let data_source = AlertDataSource::default();
        let diagnostics = DynDataSource::validate(&data_source, &json!({}));
        assert!(diagnostics
            .iter()
            .any(|d| d.summary == "Missing required attribute 'id'" && d.is_error()));
        assert!(DynDataSource::validate(&data_source, &json!({ "id": "alert-1" })).is_empty());
    }
}
