//! Typed resource and data source handlers.
//!
//! Each entity implements [`Resource`] (or [`DataSource`]) over its own model
//! type. The provider only sees the JSON-based [`DynResource`] and
//! [`DynDataSource`] traits, which every typed handler gets through a blanket
//! implementation: it decodes the host's JSON into the model, calls the
//! handler and encodes the result back.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::clients::ClientSet;
use crate::error::ProviderError;
use crate::plan::plan_resource;
use crate::schema::{has_errors, Diagnostic, Schema};
use crate::transcode::keep_configured_empties;
use crate::types::{PlanResult, ReadResult};
use crate::validation::validate;

/// A model type that can travel between the host and a handler.
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Model for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Holds the client set once the provider is configured.
#[derive(Default, Clone)]
pub struct Clients(Option<Arc<ClientSet>>);

impl Clients {
    /// Store the configured clients.
    pub fn set(&mut self, clients: Arc<ClientSet>) {
        self.0 = Some(clients);
    }

    /// The configured clients, or a configuration error before `Configure`.
    pub fn get(&self) -> Result<&ClientSet, ProviderError> {
        self.0.as_deref().ok_or_else(|| {
            ProviderError::Configuration("the provider has not been configured".to_string())
        })
    }
}

/// A managed Coralogix entity.
#[async_trait]
pub trait Resource: Default + Send + Sync + 'static {
    /// The resource's model.
    type Model: Model;

    /// The resource type name, e.g. `coralogix_alert`.
    fn type_name(&self) -> &'static str;

    /// The resource schema.
    fn schema(&self) -> Schema;

    /// Hand the resource its clients.
    fn configure(&mut self, clients: Arc<ClientSet>);

    /// Cross-field checks beyond what the schema expresses.
    fn validate_config(&self, config: &Self::Model) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Adjust the planned model before computed values are filled in.
    fn modify_plan(&self, planned: Self::Model, prior: Option<&Self::Model>) -> Self::Model {
        let _ = prior;
        planned
    }

    /// Create the remote object and return the resulting state.
    async fn create(&self, plan: Self::Model) -> Result<Self::Model, ProviderError>;

    /// Refresh state. `None` means the remote object no longer exists.
    async fn read(&self, state: Self::Model) -> Result<Option<Self::Model>, ProviderError>;

    /// Apply the plan to an existing object and return the resulting state.
    async fn update(&self, plan: Self::Model, state: Self::Model) -> Result<Self::Model, ProviderError>;

    /// Delete the remote object.
    async fn delete(&self, state: Self::Model) -> Result<(), ProviderError>;

    /// Build the initial state for an import. A Read follows.
    async fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        Ok(json!({ "id": id }))
    }
}

/// A read-only lookup.
#[async_trait]
pub trait DataSource: Default + Send + Sync + 'static {
    /// The data source's model.
    type Model: Model;

    /// The data source type name, e.g. `coralogix_alert`.
    fn type_name(&self) -> &'static str;

    /// The data source schema.
    fn schema(&self) -> Schema;

    /// Hand the data source its clients.
    fn configure(&mut self, clients: Arc<ClientSet>);

    /// Cross-field checks beyond what the schema expresses.
    fn validate_config(&self, config: &Self::Model) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Look the object up. Not finding it is an error.
    async fn read(&self, config: Self::Model) -> Result<Self::Model, ProviderError>;
}

/// A resource with its model erased to JSON.
#[async_trait]
pub trait DynResource: Send + Sync {
    /// The resource type name.
    fn type_name(&self) -> &'static str;
    /// The resource schema.
    fn schema(&self) -> Schema;
    /// Hand the resource its clients.
    fn configure(&mut self, clients: Arc<ClientSet>);
    /// Validate a configuration document.
    fn validate(&self, config: &Value) -> Vec<Diagnostic>;
    /// Plan a change from `prior` to `proposed`.
    fn plan(&self, prior: Option<Value>, proposed: Value) -> Result<PlanResult, ProviderError>;
    /// Create from a planned state.
    async fn create(&self, planned: Value) -> Result<Value, ProviderError>;
    /// Refresh a state document.
    async fn read(&self, state: Value) -> Result<ReadResult, ProviderError>;
    /// Update from prior to planned state.
    async fn update(&self, prior: Value, planned: Value) -> Result<Value, ProviderError>;
    /// Delete the object described by `state`.
    async fn delete(&self, state: Value) -> Result<(), ProviderError>;
    /// Build the initial state for an import.
    async fn import(&self, id: &str) -> Result<Value, ProviderError>;
}

/// A data source with its model erased to JSON.
#[async_trait]
pub trait DynDataSource: Send + Sync {
    /// The data source type name.
    fn type_name(&self) -> &'static str;
    /// The data source schema.
    fn schema(&self) -> Schema;
    /// Hand the data source its clients.
    fn configure(&mut self, clients: Arc<ClientSet>);
    /// Validate a configuration document.
    fn validate(&self, config: &Value) -> Vec<Diagnostic>;
    /// Look the object up.
    async fn read(&self, config: Value) -> Result<Value, ProviderError>;
}

/// Builds an unconfigured resource handler.
pub type ResourceFactory = fn() -> Box<dyn DynResource>;

/// Builds an unconfigured data source handler.
pub type DataSourceFactory = fn() -> Box<dyn DynDataSource>;

/// Factory for any [`Resource`].
pub fn resource_factory<R: Resource>() -> Box<dyn DynResource> {
    Box::new(R::default())
}

/// Factory for any [`DataSource`].
pub fn data_source_factory<D: DataSource>() -> Box<dyn DynDataSource> {
    Box::new(D::default())
}

fn decode<M: Model>(type_name: &str, value: Value) -> Result<M, ProviderError> {
    serde_json::from_value(value).map_err(|e| {
        ProviderError::InvalidRequest(format!("{}: cannot decode document: {}", type_name, e))
    })
}

fn encode<M: Model>(model: &M) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(model)?)
}

fn validate_model<M: Model>(
    type_name: &str,
    schema: &Schema,
    config: &Value,
    check: impl FnOnce(&M) -> Vec<Diagnostic>,
) -> Vec<Diagnostic> {
    let mut diagnostics = validate(schema, config);
    if has_errors(&diagnostics) {
        return diagnostics;
    }
    match decode::<M>(type_name, config.clone()) {
        Ok(model) => diagnostics.extend(check(&model)),
        Err(e) => diagnostics.push(e.to_diagnostic()),
    }
    diagnostics
}

#[async_trait]
impl<R: Resource> DynResource for R {
    fn type_name(&self) -> &'static str {
        Resource::type_name(self)
    }

    fn schema(&self) -> Schema {
        Resource::schema(self)
    }

    fn configure(&mut self, clients: Arc<ClientSet>) {
        Resource::configure(self, clients)
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let type_name = Resource::type_name(self);
        validate_model::<R::Model>(type_name, &Resource::schema(self), config, |model| {
            self.validate_config(model)
        })
    }

    fn plan(&self, prior: Option<Value>, proposed: Value) -> Result<PlanResult, ProviderError> {
        let type_name = Resource::type_name(self);
        let schema = Resource::schema(self);
        let prior = prior.filter(|p| !p.is_null());
        if proposed.is_null() {
            return Ok(plan_resource(&schema, prior.as_ref(), Value::Null));
        }

        let prior_model = prior
            .clone()
            .map(|p| decode::<R::Model>(type_name, p))
            .transpose()?;
        let planned = self.modify_plan(decode(type_name, proposed)?, prior_model.as_ref());
        Ok(plan_resource(&schema, prior.as_ref(), encode(&planned)?))
    }

    async fn create(&self, planned: Value) -> Result<Value, ProviderError> {
        let type_name = Resource::type_name(self);
        let state = Resource::create(self, decode(type_name, planned.clone())?).await?;
        let mut state = encode(&state)?;
        keep_configured_empties(&mut state, &planned);
        Ok(state)
    }

    async fn read(&self, state: Value) -> Result<ReadResult, ProviderError> {
        let type_name = Resource::type_name(self);
        let id = state
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match Resource::read(self, decode(type_name, state.clone())?).await? {
            Some(refreshed) => {
                let mut refreshed = encode(&refreshed)?;
                keep_configured_empties(&mut refreshed, &state);
                Ok(ReadResult::found(refreshed))
            },
            None => {
                warn!(resource_type = type_name, id = %id, "Resource not found, removing from state");
                Ok(ReadResult::removed(
                    Diagnostic::warning(format!("{} {} is in state, but no longer exists in Coralogix", type_name, id))
                        .with_detail(format!("{} will be recreated when you apply", id)),
                ))
            },
        }
    }

    async fn update(&self, prior: Value, planned: Value) -> Result<Value, ProviderError> {
        let type_name = Resource::type_name(self);
        let state = Resource::update(self, decode(type_name, planned.clone())?, decode(type_name, prior)?).await?;
        let mut state = encode(&state)?;
        keep_configured_empties(&mut state, &planned);
        Ok(state)
    }

    async fn delete(&self, state: Value) -> Result<(), ProviderError> {
        let type_name = Resource::type_name(self);
        Resource::delete(self, decode(type_name, state)?).await
    }

    async fn import(&self, id: &str) -> Result<Value, ProviderError> {
        debug!(resource_type = Resource::type_name(self), id, "Importing resource");
        self.import_state(id).await
    }
}

#[async_trait]
impl<D: DataSource> DynDataSource for D {
    fn type_name(&self) -> &'static str {
        DataSource::type_name(self)
    }

    fn schema(&self) -> Schema {
        DataSource::schema(self)
    }

    fn configure(&mut self, clients: Arc<ClientSet>) {
        DataSource::configure(self, clients)
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let type_name = DataSource::type_name(self);
        validate_model::<D::Model>(type_name, &DataSource::schema(self), config, |model| {
            self.validate_config(model)
        })
    }

    async fn read(&self, config: Value) -> Result<Value, ProviderError> {
        let type_name = DataSource::type_name(self);
        let state = DataSource::read(self, decode(type_name, config)?).await?;
        encode(&state)
    }
}
