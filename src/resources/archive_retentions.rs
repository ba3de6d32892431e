//! `coralogix_archive_retentions`: names of the account's four archive
//! retention tiers.
//!
//! The tiers always exist; the resource only names them. The first tier is
//! always called `Default` and cannot be renamed.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clients::{archive_retentions as rpc, ClientSet};
use crate::error::ProviderError;
use crate::resource::{Clients, Resource};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::sdk::archive_retentions::{GetRetentionsRequest, Retention, RetentionUpdateElement, UpdateRetentionsRequest};
use crate::transcode::Result;
use crate::types::{null_as_default, TfValue};

/// Singleton ID of the resource.
pub const RETENTIONS_ID: &str = "archive-retentions";

/// Number of retention tiers every account has.
pub const RETENTION_COUNT: usize = 4;

/// Name of the first, fixed tier.
pub const DEFAULT_RETENTION_NAME: &str = "Default";

/// The account's archive retentions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveRetentionsModel {
    /// Always `archive-retentions`.
    pub id: TfValue<String>,
    /// Retention tiers in API order. The first is the default tier.
    #[serde(deserialize_with = "null_as_default")]
    pub retentions: Vec<RetentionModel>,
}

/// One archive retention tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionModel {
    /// Tier ID assigned by Coralogix.
    pub id: TfValue<String>,
    /// Tier name.
    pub name: TfValue<String>,
    /// Position of the tier, starting at 1.
    pub order: TfValue<i64>,
    /// Whether the tier may be renamed.
    pub editable: TfValue<bool>,
}

/// Schema of `coralogix_archive_retentions`.
pub fn archive_retentions_schema() -> Schema {
    let retention = Block::new()
        .with_attribute("id", Attribute::computed_string().with_use_state_for_unknown())
        .with_attribute(
            "name",
            Attribute::optional_computed_string()
                .with_description("Tier name. The first tier is always named Default."),
        )
        .with_attribute("order", Attribute::computed_int64().with_use_state_for_unknown())
        .with_attribute("editable", Attribute::computed_bool().with_use_state_for_unknown());

    Schema::v0()
        .with_description("Names of the Coralogix logs archive retention tiers.")
        .with_attribute("id", Attribute::id())
        .with_block(
            "retentions",
            NestedBlock::list(retention)
                .with_min_items(RETENTION_COUNT as u32)
                .with_max_items(RETENTION_COUNT as u32),
        )
}

fn flatten_retention(retention: Retention) -> RetentionModel {
    RetentionModel {
        id: TfValue::Known(retention.id),
        name: if retention.name.is_empty() {
            TfValue::Null
        } else {
            TfValue::Known(retention.name)
        },
        order: TfValue::Known(i64::from(retention.order)),
        editable: TfValue::Known(retention.editable),
    }
}

/// Build the model from the tiers the API returns, in tier order.
pub fn flatten_retentions(mut retentions: Vec<Retention>) -> ArchiveRetentionsModel {
    retentions.sort_by_key(|r| r.order);
    ArchiveRetentionsModel {
        id: TfValue::known(RETENTIONS_ID),
        retentions: retentions.into_iter().map(flatten_retention).collect(),
    }
}

/// Fetch the account's retention tiers.
pub async fn get_retentions(clients: &ClientSet) -> Result<Vec<Retention>> {
    let request = GetRetentionsRequest {};
    debug!("Reading archive retentions");
    let response = clients
        .archive_retentions
        .get(request.clone())
        .await
        .map_err(|status| ProviderError::rpc(rpc::GET_RETENTIONS, &request, status))?;
    let mut retentions = response.retentions;
    retentions.sort_by_key(|r| r.order);
    Ok(retentions)
}

/// Pair each editable remote tier with the name planned at the same position.
fn update_elements(current: &[Retention], names: &[String]) -> Result<Vec<RetentionUpdateElement>> {
    if current.len() != names.len() {
        return Err(ProviderError::Validation(format!(
            "retentions: the account has {} retention tiers, got {}",
            current.len(),
            names.len()
        )));
    }
    Ok(current
        .iter()
        .zip(names)
        .filter(|(retention, _)| retention.editable)
        .map(|(retention, name)| RetentionUpdateElement {
            id: retention.id.clone(),
            name: name.clone(),
        })
        .collect())
}

async fn rename(clients: &ClientSet, names: &[String]) -> Result<ArchiveRetentionsModel> {
    let current = get_retentions(clients).await?;
    let request = UpdateRetentionsRequest {
        retention_update_elements: update_elements(&current, names)?,
    };
    debug!(request = ?request, "Updating archive retentions");
    let response = clients
        .archive_retentions
        .update(request.clone())
        .await
        .map_err(|status| ProviderError::rpc(rpc::UPDATE_RETENTIONS, &request, status))?;
    info!("Archive retentions updated");
    Ok(flatten_retentions(response.retentions))
}

fn planned_names(model: &ArchiveRetentionsModel) -> Vec<String> {
    model
        .retentions
        .iter()
        .enumerate()
        .map(|(i, r)| {
            if i == 0 {
                DEFAULT_RETENTION_NAME.to_string()
            } else {
                r.name.value_or_default()
            }
        })
        .collect()
}

/// Handler for `coralogix_archive_retentions`.
#[derive(Default)]
pub struct ArchiveRetentionsResource {
    clients: Clients,
}

#[async_trait]
impl Resource for ArchiveRetentionsResource {
    type Model = ArchiveRetentionsModel;

    fn type_name(&self) -> &'static str {
        "coralogix_archive_retentions"
    }

    fn schema(&self) -> Schema {
        archive_retentions_schema()
    }

    fn configure(&mut self, clients: Arc<ClientSet>) {
        self.clients.set(clients);
    }

    fn validate_config(&self, config: &ArchiveRetentionsModel) -> Vec<Diagnostic> {
        match config.retentions.first().and_then(|r| r.name.as_known()) {
            Some(name) if name != DEFAULT_RETENTION_NAME => vec![Diagnostic::warning(
                "The first retention tier cannot be renamed",
            )
            .with_detail(format!(
                "\"{}\" will be ignored; the first tier is always named {}",
                name, DEFAULT_RETENTION_NAME
            ))
            .with_attribute("retentions.0.name")],
            _ => Vec::new(),
        }
    }

    fn modify_plan(
        &self,
        mut planned: ArchiveRetentionsModel,
        _prior: Option<&ArchiveRetentionsModel>,
    ) -> ArchiveRetentionsModel {
        if let Some(first) = planned.retentions.first_mut() {
            first.name = TfValue::known(DEFAULT_RETENTION_NAME);
        }
        planned
    }

    async fn create(&self, plan: ArchiveRetentionsModel) -> Result<ArchiveRetentionsModel> {
        rename(self.clients.get()?, &planned_names(&plan)).await
    }

    async fn read(&self, _state: ArchiveRetentionsModel) -> Result<Option<ArchiveRetentionsModel>> {
        let retentions = get_retentions(self.clients.get()?).await?;
        Ok(Some(flatten_retentions(retentions)))
    }

    async fn update(
        &self,
        plan: ArchiveRetentionsModel,
        _state: ArchiveRetentionsModel,
    ) -> Result<ArchiveRetentionsModel> {
        rename(self.clients.get()?, &planned_names(&plan)).await
    }

    async fn delete(&self, state: ArchiveRetentionsModel) -> Result<()> {
        let names: Vec<String> = (0..state.retentions.len())
            .map(|i| if i == 0 { DEFAULT_RETENTION_NAME.to_string() } else { String::new() })
            .collect();
        warn!("Archive retentions cannot be deleted, clearing their names instead");
        rename(self.clients.get()?, &names).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::DynResource;
    use crate::testing::FakeCoralogix;
    use serde_json::{json, Value};

    fn config(names: [Option<&str>; 4]) -> Value {
        json!({
            "retentions": names.iter().map(|n| json!({ "name": n })).collect::<Vec<_>>(),
        })
    }

    fn resource(fake: &Arc<FakeCoralogix>) -> ArchiveRetentionsResource {
        let mut resource = ArchiveRetentionsResource::default();
        Resource::configure(&mut resource, fake.client_set());
        resource
    }

    #[test]
    fn test_schema_requires_four_tiers() {
        let resource = ArchiveRetentionsResource::default();
        let diagnostics = resource.validate(&json!({ "retentions": [{ "name": "a" }] }));
        assert!(diagnostics.iter().any(|d| d.summary.contains("at least 4")));
    }

    #[test]
    fn test_renaming_first_tier_warns() {
        let resource = ArchiveRetentionsResource::default();
        let diagnostics = resource.validate(&config([Some("Mine"), None, None, None]));
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_error());
    }

    #[test]
    fn test_update_elements_skip_fixed_tier() {
        let current: Vec<Retention> = (0..4)
            .map(|i| Retention {
                id: format!("r{}", i),
                order: i + 1,
                name: String::new(),
                editable: i != 0,
            })
            .collect();
        let names = vec!["Default".to_string(), "short".to_string(), String::new(), "long".to_string()];

        let elements = update_elements(&current, &names).unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].id, "r1");
        assert_eq!(elements[0].name, "short");
        assert_eq!(elements[2].name, "long");

        assert!(update_elements(&current, &names[..2]).is_err());
    }

    #[tokio::test]
    async fn test_create_names_tiers_by_position() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let plan = resource
            .plan(None, config([None, Some("short"), Some("medium"), None]))
            .unwrap();
        assert_eq!(plan.planned_state["retentions"][0]["name"], DEFAULT_RETENTION_NAME);

        let state = DynResource::create(&resource, plan.planned_state).await.unwrap();
        assert_eq!(state["id"], RETENTIONS_ID);
        assert_eq!(state["retentions"][1]["name"], "short");
        assert_eq!(state["retentions"][1]["id"], "retention-1");
        assert_eq!(state["retentions"][3]["name"], Value::Null);

        let replan = resource
            .plan(Some(state), config([None, Some("short"), Some("medium"), None]))
            .unwrap();
        assert!(replan.changes.is_empty());
    }

    #[tokio::test]
    async fn test_delete_clears_names() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let plan = resource
            .plan(None, config([None, Some("a"), Some("b"), Some("c")]))
            .unwrap();
        let state = DynResource::create(&resource, plan.planned_state).await.unwrap();

        DynResource::delete(&resource, state).await.unwrap();
        let names: Vec<String> = fake.state().retentions.iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["Default", "", "", ""]);
    }
}
