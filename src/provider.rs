//! The Coralogix provider: a registry of resource and data source handlers.
//!
//! Every request builds a fresh handler from its factory and hands it the
//! client set created by `Configure`, so handlers carry no state between
//! requests.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::clients::ClientSet;
use crate::config::{provider_schema, ProviderConfig, ProviderConfigModel};
use crate::data_sources::{
    AlertDataSource, ArchiveRetentionsDataSource, CustomRoleDataSource, ViewDataSource, WebhookDataSource,
};
use crate::error::ProviderError;
use crate::resource::{
    data_source_factory, resource_factory, DataSourceFactory, DynDataSource, DynResource, ResourceFactory,
};
use crate::resources::{
    AlertResource, ArchiveMetricsResource, ArchiveRetentionsResource, CustomRoleResource, GroupAttachmentResource,
    ViewResource, WebhookResource,
};
use crate::schema::{has_errors, Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult, ReadResult};
use crate::validation::validate;

const RESOURCES: &[ResourceFactory] = &[
    resource_factory::<AlertResource>,
    resource_factory::<ArchiveMetricsResource>,
    resource_factory::<ArchiveRetentionsResource>,
    resource_factory::<CustomRoleResource>,
    resource_factory::<GroupAttachmentResource>,
    resource_factory::<ViewResource>,
    resource_factory::<WebhookResource>,
];

const DATA_SOURCES: &[DataSourceFactory] = &[
    data_source_factory::<AlertDataSource>,
    data_source_factory::<ArchiveRetentionsDataSource>,
    data_source_factory::<CustomRoleDataSource>,
    data_source_factory::<ViewDataSource>,
    data_source_factory::<WebhookDataSource>,
];

/// The Coralogix provider.
pub struct CoralogixProvider {
    resources: BTreeMap<&'static str, ResourceFactory>,
    data_sources: BTreeMap<&'static str, DataSourceFactory>,
    clients: RwLock<Option<Arc<ClientSet>>>,
}

impl Default for CoralogixProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CoralogixProvider {
    /// An unconfigured provider. Calls needing the API fail until `Configure`.
    pub fn new() -> Self {
        Self {
            resources: RESOURCES.iter().map(|f| (f().type_name(), *f)).collect(),
            data_sources: DATA_SOURCES.iter().map(|f| (f().type_name(), *f)).collect(),
            clients: RwLock::new(None),
        }
    }

    /// A provider already configured with `clients`.
    pub fn with_clients(clients: Arc<ClientSet>) -> Self {
        let provider = Self::new();
        Self {
            clients: RwLock::new(Some(clients)),
            ..provider
        }
    }

    async fn resource(&self, resource_type: &str) -> Result<Box<dyn DynResource>, ProviderError> {
        let factory = self
            .resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))?;
        let mut resource = factory();
        if let Some(clients) = self.clients.read().await.clone() {
            resource.configure(clients);
        }
        Ok(resource)
    }

    async fn data_source(&self, data_source_type: &str) -> Result<Box<dyn DynDataSource>, ProviderError> {
        let factory = self
            .data_sources
            .get(data_source_type)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))?;
        let mut data_source = factory();
        if let Some(clients) = self.clients.read().await.clone() {
            data_source.configure(clients);
        }
        Ok(data_source)
    }
}

#[async_trait::async_trait]
impl ProviderService for CoralogixProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(provider_schema());
        let schema = self
            .resources
            .iter()
            .fold(schema, |schema, (name, factory)| schema.with_resource(*name, factory().schema()));
        self.data_sources
            .iter()
            .fold(schema, |schema, (name, factory)| schema.with_data_source(*name, factory().schema()))
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&provider_schema(), &config);
        let set = |name: &str| config.get(name).is_some_and(|v| !v.is_null());
        if set("env") && set("domain") {
            diagnostics.push(
                Diagnostic::error("Conflicting arguments")
                    .with_detail("only one of env or domain may be set")
                    .with_attribute("domain"),
            );
        }
        Ok(diagnostics)
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = self.validate_provider_config(config.clone()).await?;
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let model: ProviderConfigModel = if config.is_null() {
            ProviderConfigModel::default()
        } else {
            serde_json::from_value(config)?
        };
        let config = ProviderConfig::resolve(&model)?;
        let clients = ClientSet::connect(&config)?;
        *self.clients.write().await = Some(Arc::new(clients));
        info!(domain = %config.domain, "Provider configured");
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.clients.write().await.take();
        debug!("Provider stopped");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.resource(resource_type).await?.validate(&config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.resource(resource_type)
            .await?
            .plan(prior_state, proposed_state)
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.resource(resource_type).await?.create(planned_state).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<ReadResult, ProviderError> {
        self.resource(resource_type).await?.read(current_state).await
    }

    async fn update(&self, resource_type: &str, prior_state: Value, planned_state: Value) -> Result<Value, ProviderError> {
        self.resource(resource_type)
            .await?
            .update(prior_state, planned_state)
            .await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.resource(resource_type).await?.delete(current_state).await
    }

    async fn import_resource(&self, resource_type: &str, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
        let state = self.resource(resource_type).await?.import(id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.data_source(data_source_type).await?.validate(&config))
    }

    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        self.data_source(data_source_type).await?.read(config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCoralogix;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok, block_on};

    #[test]
    fn test_registry() {
        let provider = CoralogixProvider::new();
        let metadata = provider.metadata();
        assert_eq!(
            metadata.resources,
            vec![
                "coralogix_alert",
                "coralogix_archive_metrics",
                "coralogix_archive_retentions",
                "coralogix_custom_role",
                "coralogix_group_attachment",
                "coralogix_view",
                "coralogix_webhook",
            ]
        );
        assert_eq!(metadata.data_sources.len(), 5);

        let schema = provider.schema();
        assert!(schema.provider.block.attributes["api_key"].flags.sensitive);
    }

    #[test]
    fn test_validate_provider_config() {
        let provider = CoralogixProvider::new();
        let ok = assert_ok!(block_on(
            provider.validate_provider_config(json!({ "api_key": "k", "env": "EU1" }))
        ));
        assert!(!has_errors(&ok));

        let unknown_env = assert_ok!(block_on(provider.validate_provider_config(json!({ "env": "MARS" }))));
        assert!(has_errors(&unknown_env));

        let conflict = assert_ok!(block_on(
            provider.validate_provider_config(json!({ "env": "EU1", "domain": "coralogix.com" }))
        ));
        assert!(conflict.iter().any(|d| d.summary == "Conflicting arguments"));
    }

    #[tokio::test]
    async fn test_configure() {
        let provider = CoralogixProvider::new();
        let diagnostics = provider
            .configure(json!({ "api_key": "key", "domain": "coralogix.com" }))
            .await
            .unwrap();
        assert!(diagnostics.is_empty());
        assert!(provider.clients.read().await.is_some());

        provider.stop().await.unwrap();
        assert!(provider.clients.read().await.is_none());
    }

    #[tokio::test]
    async fn test_configure_reports_conflicts() {
        let provider = CoralogixProvider::new();
        let diagnostics = provider
            .configure(json!({ "api_key": "key", "env": "EU1", "domain": "coralogix.com" }))
            .await
            .unwrap();
        assert!(has_errors(&diagnostics));
        assert!(provider.clients.read().await.is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let provider = CoralogixProvider::new();
        let err = provider
            .create("coralogix_custom_role", json!({ "name": "r", "parent_role": "Standard User" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_types() {
        let fake = FakeCoralogix::new();
        let provider = CoralogixProvider::with_clients(fake.client_set());
        assert_err!(provider.read("coralogix_dashboard", json!({ "id": "1" })).await);
        let err = provider
            .read_data_source("coralogix_dashboard", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(ref name) if name == "coralogix_dashboard"));
    }

    #[tokio::test]
    async fn test_import() {
        let fake = FakeCoralogix::new();
        fake.add_group(12, &["u1"]);
        let provider = CoralogixProvider::with_clients(fake.client_set());
        let imported = provider.import_resource("coralogix_webhook", "abc").await.unwrap();
        assert_eq!(imported, vec![ImportedResource::new("coralogix_webhook", json!({ "id": "abc" }))]);

        let imported = provider
            .import_resource("coralogix_group_attachment", "12")
            .await
            .unwrap();
        assert_eq!(imported[0].state["group_id"], 12);
        assert_eq!(imported[0].state["user_ids"], json!(["u1"]));
        assert_err!(provider.import_resource("coralogix_group_attachment", "team").await);
    }

    #[tokio::test]
    async fn test_data_source_not_found() {
        let fake = FakeCoralogix::new();
        let provider = CoralogixProvider::with_clients(fake.client_set());
        let err = provider
            .read_data_source("coralogix_custom_role", json!({ "name": "nobody" }))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
