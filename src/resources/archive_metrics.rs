//! `coralogix_archive_metrics`: the account's metrics archive configuration.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clients::{metrics_archive as rpc, ClientSet};
use crate::error::ProviderError;
use crate::resource::{Clients, Resource};
use crate::schema::{Attribute, Block, NestedBlock, Schema, Validator};
use crate::sdk::metrics_archive::{
    tenant_config::StorageConfig, ConfigureTenantRequest, GetTenantConfigRequest, IbmConfig, RetentionPolicy,
    S3Config, TenantConfig, UpdateTenantRequest,
};
use crate::transcode::{narrow, optional, required, response_field, select_variant, Result};
use crate::types::TfValue;

/// Singleton ID of the resource.
pub const ARCHIVE_METRICS_ID: &str = "archive-metrics";

/// Metrics archive configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveMetricsModel {
    /// Always `archive-metrics`.
    pub id: TfValue<String>,
    /// Object key prefix inside the bucket.
    pub prefix: TfValue<String>,
    /// Whether archiving is paused.
    pub disabled: TfValue<bool>,
    /// Days kept per resolution.
    pub retention_policy: Option<RetentionPolicyModel>,
    /// AWS S3 storage.
    pub s3: Option<S3Model>,
    /// IBM Cloud Object Storage.
    pub ibm: Option<IbmModel>,
}

/// Retention per metric resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicyModel {
    /// Days raw samples are kept.
    pub raw_resolution: TfValue<i64>,
    /// Days five-minute rollups are kept.
    pub five_minutes_resolution: TfValue<i64>,
    /// Days one-hour rollups are kept.
    pub one_hour_resolution: TfValue<i64>,
}

/// AWS S3 bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Model {
    /// Bucket name.
    pub bucket: TfValue<String>,
    /// Bucket region.
    pub region: TfValue<String>,
}

/// IBM Cloud Object Storage bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IbmModel {
    /// Storage endpoint URL.
    pub endpoint: TfValue<String>,
    /// CRN of the bucket.
    pub crn: TfValue<String>,
}

enum Storage<'a> {
    S3(&'a S3Model),
    Ibm(&'a IbmModel),
}

/// The API stores an omitted resolution as 0 days.
fn days() -> Attribute {
    Attribute::optional_int64()
        .with_default(serde_json::json!(0))
        .with_validator(Validator::Between { min: 0.0, max: 5000.0 })
        .with_description("Retention in days. Defaults to 0.")
}

/// Schema of `coralogix_archive_metrics`.
pub fn archive_metrics_schema() -> Schema {
    Schema::v0()
        .with_description("Coralogix metrics archive configuration.")
        .with_attribute("id", Attribute::id())
        .with_attribute("prefix", Attribute::optional_string())
        .with_attribute(
            "disabled",
            Attribute::optional_bool().with_default(serde_json::json!(false)),
        )
        .with_block(
            "retention_policy",
            NestedBlock::single(
                Block::new()
                    .with_attribute("raw_resolution", days())
                    .with_attribute("five_minutes_resolution", days())
                    .with_attribute("one_hour_resolution", days()),
            ),
        )
        .with_block(
            "s3",
            NestedBlock::single(
                Block::new()
                    .with_attribute("bucket", Attribute::required_string().with_validator(Validator::NotEmpty))
                    .with_attribute("region", Attribute::required_string().with_validator(Validator::NotEmpty)),
            ),
        )
        .with_block(
            "ibm",
            NestedBlock::single(
                Block::new()
                    .with_attribute("endpoint", Attribute::required_string().with_validator(Validator::NotEmpty))
                    .with_attribute("crn", Attribute::required_string().with_validator(Validator::NotEmpty)),
            ),
        )
        .with_exactly_one_of(["s3", "ibm"])
}

fn expand_days(path: &str, value: &TfValue<i64>) -> Result<u32> {
    narrow(path, value.value_or_default())
}

/// Build the SDK tenant configuration from the model.
pub fn expand_tenant_config(model: &ArchiveMetricsModel) -> Result<TenantConfig> {
    let storage = select_variant(
        "storage",
        vec![
            ("s3", model.s3.as_ref().map(Storage::S3)),
            ("ibm", model.ibm.as_ref().map(Storage::Ibm)),
        ],
    )?;
    let storage_config = match storage {
        Storage::S3(s3) => StorageConfig::S3(S3Config {
            bucket: required("s3.bucket", &s3.bucket)?,
            region: required("s3.region", &s3.region)?,
        }),
        Storage::Ibm(ibm) => StorageConfig::Ibm(IbmConfig {
            endpoint: required("ibm.endpoint", &ibm.endpoint)?,
            crn: required("ibm.crn", &ibm.crn)?,
        }),
    };
    let retention_policy = model
        .retention_policy
        .as_ref()
        .map(|policy| -> Result<RetentionPolicy> {
            Ok(RetentionPolicy {
                raw_resolution: expand_days("retention_policy.raw_resolution", &policy.raw_resolution)?,
                five_minutes_resolution: expand_days(
                    "retention_policy.five_minutes_resolution",
                    &policy.five_minutes_resolution,
                )?,
                one_hour_resolution: expand_days("retention_policy.one_hour_resolution", &policy.one_hour_resolution)?,
            })
        })
        .transpose()?;

    Ok(TenantConfig {
        retention_policy,
        storage_config: Some(storage_config),
        prefix: optional(&model.prefix).unwrap_or_default(),
        disabled: model.disabled.value_or_default(),
    })
}

/// Build the model from the SDK tenant configuration.
pub fn flatten_tenant_config(config: TenantConfig) -> ArchiveMetricsModel {
    let (s3, ibm) = match config.storage_config {
        Some(StorageConfig::S3(s3)) => (
            Some(S3Model {
                bucket: TfValue::Known(s3.bucket),
                region: TfValue::Known(s3.region),
            }),
            None,
        ),
        Some(StorageConfig::Ibm(ibm)) => (
            None,
            Some(IbmModel {
                endpoint: TfValue::Known(ibm.endpoint),
                crn: TfValue::Known(ibm.crn),
            }),
        ),
        None => (None, None),
    };
    ArchiveMetricsModel {
        id: TfValue::known(ARCHIVE_METRICS_ID),
        prefix: if config.prefix.is_empty() {
            TfValue::Null
        } else {
            TfValue::Known(config.prefix)
        },
        disabled: TfValue::Known(config.disabled),
        retention_policy: config.retention_policy.map(|policy| RetentionPolicyModel {
            raw_resolution: TfValue::Known(i64::from(policy.raw_resolution)),
            five_minutes_resolution: TfValue::Known(i64::from(policy.five_minutes_resolution)),
            one_hour_resolution: TfValue::Known(i64::from(policy.one_hour_resolution)),
        }),
        s3,
        ibm,
    }
}

/// Fetch the metrics archive configuration.
pub async fn get_archive_metrics(clients: &ClientSet) -> Result<ArchiveMetricsModel> {
    let request = GetTenantConfigRequest {};
    debug!("Reading metrics archive configuration");
    let response = clients
        .metrics_archive
        .get(request.clone())
        .await
        .map_err(|status| ProviderError::rpc(rpc::GET_TENANT_CONFIG, &request, status))?;
    Ok(flatten_tenant_config(response_field(
        rpc::GET_TENANT_CONFIG,
        "tenant_config",
        response.tenant_config,
    )?))
}

/// Handler for `coralogix_archive_metrics`.
#[derive(Default)]
pub struct ArchiveMetricsResource {
    clients: Clients,
}

#[async_trait]
impl Resource for ArchiveMetricsResource {
    type Model = ArchiveMetricsModel;

    fn type_name(&self) -> &'static str {
        "coralogix_archive_metrics"
    }

    fn schema(&self) -> Schema {
        archive_metrics_schema()
    }

    fn configure(&mut self, clients: Arc<ClientSet>) {
        self.clients.set(clients);
    }

    async fn create(&self, plan: ArchiveMetricsModel) -> Result<ArchiveMetricsModel> {
        let clients = self.clients.get()?;
        let request = ConfigureTenantRequest {
            tenant_config: Some(expand_tenant_config(&plan)?),
        };
        debug!(request = ?request, "Configuring metrics archive");
        clients
            .metrics_archive
            .configure(request.clone())
            .await
            .map_err(|status| ProviderError::rpc(rpc::CONFIGURE_TENANT, &request, status))?;
        info!("Metrics archive configured");
        get_archive_metrics(clients).await
    }

    async fn read(&self, _state: ArchiveMetricsModel) -> Result<Option<ArchiveMetricsModel>> {
        crate::resources::found(get_archive_metrics(self.clients.get()?).await)
    }

    async fn update(&self, plan: ArchiveMetricsModel, _state: ArchiveMetricsModel) -> Result<ArchiveMetricsModel> {
        let clients = self.clients.get()?;
        let request = UpdateTenantRequest {
            tenant_config: Some(expand_tenant_config(&plan)?),
        };
        debug!(request = ?request, "Updating metrics archive");
        clients
            .metrics_archive
            .update(request.clone())
            .await
            .map_err(|status| ProviderError::rpc(rpc::UPDATE_TENANT, &request, status))?;
        info!("Metrics archive updated");
        get_archive_metrics(clients).await
    }

    async fn delete(&self, _state: ArchiveMetricsModel) -> Result<()> {
        warn!("The metrics archive cannot be unconfigured; removing it from state only");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::DynResource;
    use crate::testing::FakeCoralogix;
    use serde_json::{json, Value};

    fn s3_config() -> Value {
        json!({
            "prefix": "cx",
            "retention_policy": {
                "raw_resolution": 30,
                "five_minutes_resolution": 90,
                "one_hour_resolution": 365,
            },
            "s3": { "bucket": "metrics-archive", "region": "eu-west-1" },
        })
    }

    fn resource(fake: &Arc<FakeCoralogix>) -> ArchiveMetricsResource {
        let mut resource = ArchiveMetricsResource::default();
        Resource::configure(&mut resource, fake.client_set());
        resource
    }

    #[test]
    fn test_schema_requires_one_storage() {
        let resource = ArchiveMetricsResource::default();
        let mut config = s3_config();
        config["ibm"] = json!({ "endpoint": "https://s3.ibm", "crn": "crn:v1" });
        let diagnostics = resource.validate(&config);
        assert!(diagnostics.iter().any(|d| d.is_error()));

        assert!(resource.validate(&s3_config()).is_empty());
    }

    #[test]
    fn test_expand_rejects_negative_retention() {
        let mut model: ArchiveMetricsModel = serde_json::from_value(s3_config()).unwrap();
        if let Some(policy) = model.retention_policy.as_mut() {
            policy.raw_resolution = TfValue::Known(-1);
        }
        assert!(expand_tenant_config(&model).is_err());
    }

    #[tokio::test]
    async fn test_create_update_and_forget() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);

        let plan = resource.plan(None, s3_config()).unwrap();
        let state = DynResource::create(&resource, plan.planned_state).await.unwrap();
        assert_eq!(state["id"], ARCHIVE_METRICS_ID);
        assert_eq!(state["s3"]["bucket"], "metrics-archive");
        assert_eq!(state["disabled"], false);
        assert_eq!(state["ibm"], Value::Null);

        let replan = resource.plan(Some(state.clone()), s3_config()).unwrap();
        assert!(replan.changes.is_empty());

        let ibm = json!({
            "retention_policy": { "raw_resolution": 30 },
            "ibm": { "endpoint": "https://s3.ibm", "crn": "crn:v1" },
        });
        let plan = resource.plan(Some(state.clone()), ibm).unwrap();
        let updated = DynResource::update(&resource, state, plan.planned_state)
            .await
            .unwrap();
        assert_eq!(updated["ibm"]["crn"], "crn:v1");
        assert_eq!(updated["s3"], Value::Null);
        assert_eq!(updated["prefix"], Value::Null);

        DynResource::delete(&resource, updated).await.unwrap();
        assert!(fake.state().tenant.is_some());
    }

    #[tokio::test]
    async fn test_partial_retention_policy_converges() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let config = json!({
            "retention_policy": { "raw_resolution": 30 },
            "s3": { "bucket": "metrics-archive", "region": "eu-west-1" },
        });

        let plan = resource.plan(None, config.clone()).unwrap();
        assert_eq!(plan.planned_state["retention_policy"]["one_hour_resolution"], 0);
        let state = DynResource::create(&resource, plan.planned_state).await.unwrap();
        assert_eq!(state["retention_policy"]["raw_resolution"], 30);
        assert_eq!(state["retention_policy"]["five_minutes_resolution"], 0);

        let read = DynResource::read(&resource, state.clone()).await.unwrap();
        assert_eq!(read.state, Some(state.clone()));
        let replan = resource.plan(Some(state), config).unwrap();
        assert!(replan.changes.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_archive_is_removed_on_read() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let read = DynResource::read(&resource, json!({ "id": ARCHIVE_METRICS_ID }))
            .await
            .unwrap();
        assert!(read.state.is_none());
    }
}
