//! `coralogix_custom_role`: custom roles derived from a system role.
//!
//! Updates send only the fields that changed. The parent role cannot be
//! changed once the role exists.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clients::{roles as rpc, ClientSet};
use crate::error::ProviderError;
use crate::resource::{Clients, Resource};
use crate::resources::found;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema, Validator};
use crate::sdk::roles::{
    update_role_request::Permissions, CreateRoleRequest, CustomRole, DeleteRoleRequest, GetCustomRoleRequest,
    UpdateRoleRequest,
};
use crate::transcode::{expand_set, flatten_set, optional, parse_id, required, response_field, Result};
use crate::types::TfValue;

/// Custom role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomRoleModel {
    /// Role ID as a string.
    pub id: TfValue<String>,
    /// Role name.
    pub name: TfValue<String>,
    /// Free-text description.
    pub description: TfValue<String>,
    /// Name of the system role this role extends.
    pub parent_role: TfValue<String>,
    /// Permissions granted on top of the parent role.
    pub permissions: TfValue<BTreeSet<String>>,
    /// Team the role belongs to.
    pub team_id: TfValue<i64>,
}

/// Schema of `coralogix_custom_role`.
pub fn custom_role_schema() -> Schema {
    Schema::v0()
        .with_description("Coralogix custom role.")
        .with_attribute("id", Attribute::id())
        .with_attribute("name", Attribute::required_string().with_validator(Validator::NotEmpty))
        .with_attribute("description", Attribute::required_string())
        .with_attribute(
            "parent_role",
            Attribute::required_string()
                .with_validator(Validator::NotEmpty)
                .with_description("System role the custom role extends. Cannot be changed."),
        )
        .with_attribute(
            "permissions",
            Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::required())
                .with_description("Permissions granted on top of the parent role."),
        )
        .with_attribute(
            "team_id",
            Attribute::computed_int64().with_use_state_for_unknown(),
        )
}

/// Build the model of a role returned by the API.
pub fn flatten_role(role: CustomRole) -> CustomRoleModel {
    CustomRoleModel {
        id: TfValue::Known(role.role_id.to_string()),
        name: TfValue::Known(role.name),
        description: TfValue::Known(role.description),
        parent_role: TfValue::Known(role.parent_role_name),
        permissions: flatten_set(role.permissions),
        team_id: TfValue::Known(i64::from(role.team_id)),
    }
}

/// Fetch a custom role by ID.
pub async fn get_role(clients: &ClientSet, role_id: u32) -> Result<CustomRoleModel> {
    let request = GetCustomRoleRequest { role_id };
    debug!(role_id, "Reading custom role");
    let response = clients
        .roles
        .get(request.clone())
        .await
        .map_err(|status| ProviderError::rpc(rpc::GET_CUSTOM_ROLE, &request, status))?;
    Ok(flatten_role(response_field(rpc::GET_CUSTOM_ROLE, "role", response.role)?))
}

/// Build an update carrying only what changed between `state` and `plan`.
fn update_request(role_id: u32, plan: &CustomRoleModel, state: &CustomRoleModel) -> Result<UpdateRoleRequest> {
    if plan.parent_role.is_known() && plan.parent_role != state.parent_role {
        return Err(ProviderError::Validation(format!(
            "parent_role: cannot change the parent role of an existing custom role from \"{}\" to \"{}\"; \
             create a new role instead",
            state.parent_role.value_or_default(),
            plan.parent_role.value_or_default()
        )));
    }

    let changed = |planned: &TfValue<String>, prior: &TfValue<String>| {
        if planned != prior {
            optional(planned)
        } else {
            None
        }
    };
    let new_permissions = (plan.permissions != state.permissions).then(|| Permissions {
        permissions: expand_set(&plan.permissions),
    });

    Ok(UpdateRoleRequest {
        role_id,
        new_name: changed(&plan.name, &state.name),
        new_description: changed(&plan.description, &state.description),
        new_permissions,
    })
}

/// Handler for `coralogix_custom_role`.
#[derive(Default)]
pub struct CustomRoleResource {
    clients: Clients,
}

#[async_trait]
impl Resource for CustomRoleResource {
    type Model = CustomRoleModel;

    fn type_name(&self) -> &'static str {
        "coralogix_custom_role"
    }

    fn schema(&self) -> Schema {
        custom_role_schema()
    }

    fn configure(&mut self, clients: Arc<ClientSet>) {
        self.clients.set(clients);
    }

    async fn create(&self, plan: CustomRoleModel) -> Result<CustomRoleModel> {
        let clients = self.clients.get()?;
        let request = CreateRoleRequest {
            name: required("name", &plan.name)?,
            description: required("description", &plan.description)?,
            parent_role_name: required("parent_role", &plan.parent_role)?,
            permissions: expand_set(&plan.permissions),
        };
        debug!(request = ?request, "Creating custom role");
        let response = clients
            .roles
            .create(request.clone())
            .await
            .map_err(|status| ProviderError::rpc(rpc::CREATE_ROLE, &request, status))?;
        info!(role_id = response.id, "Custom role created");
        get_role(clients, response.id).await
    }

    async fn read(&self, state: CustomRoleModel) -> Result<Option<CustomRoleModel>> {
        let role_id = parse_id("id", &required("id", &state.id)?)?;
        found(get_role(self.clients.get()?, role_id).await)
    }

    async fn update(&self, plan: CustomRoleModel, state: CustomRoleModel) -> Result<CustomRoleModel> {
        let role_id = parse_id("id", &required("id", &state.id)?)?;
        let request = update_request(role_id, &plan, &state)?;
        let clients = self.clients.get()?;
        debug!(request = ?request, "Updating custom role");
        clients
            .roles
            .update(request.clone())
            .await
            .map_err(|status| ProviderError::rpc(rpc::UPDATE_ROLE, &request, status))?;
        info!(role_id, "Custom role updated");
        get_role(clients, role_id).await
    }

    async fn delete(&self, state: CustomRoleModel) -> Result<()> {
        let role_id = parse_id("id", &required("id", &state.id)?)?;
        let request = DeleteRoleRequest { role_id };
        self.clients
            .get()?
            .roles
            .delete(request.clone())
            .await
            .map_err(|status| ProviderError::rpc(rpc::DELETE_ROLE, &request, status))?;
        info!(role_id, "Custom role deleted");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn role_config(name: &str, parent: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "description": "read only access",
        "parent_role": parent,
        "permissions": ["alerts:ReadConfig", "logs.data:Read"],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::DynResource;
    use crate::testing::FakeCoralogix;
    use serde_json::json;

    fn resource(fake: &Arc<FakeCoralogix>) -> CustomRoleResource {
        let mut resource = CustomRoleResource::default();
        Resource::configure(&mut resource, fake.client_set());
        resource
    }

    fn model(value: serde_json::Value) -> CustomRoleModel {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_update_request_sends_only_changes() {
        let state = model(json!({
            "id": "7",
            "name": "viewer",
            "description": "read only access",
            "parent_role": "Standard User",
            "permissions": ["alerts:ReadConfig"],
        }));
        let mut plan = state.clone();
        plan.description = TfValue::known("read everything");

        let request = update_request(7, &plan, &state).unwrap();
        assert_eq!(request.role_id, 7);
        assert_eq!(request.new_name, None);
        assert_eq!(request.new_description.as_deref(), Some("read everything"));
        assert!(request.new_permissions.is_none());

        plan.permissions = TfValue::Known(BTreeSet::from(["logs.data:Read".to_string()]));
        let request = update_request(7, &plan, &state).unwrap();
        assert_eq!(request.new_permissions.unwrap().permissions, vec!["logs.data:Read"]);
    }

    #[tokio::test]
    async fn test_parent_change_fails_before_calling_the_api() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let plan = resource.plan(None, role_config("viewer", "Standard User")).unwrap();
        let created = DynResource::create(&resource, plan.planned_state).await.unwrap();
        let calls_before = fake.calls().len();

        let plan = resource
            .plan(Some(created.clone()), role_config("viewer", "Admin"))
            .unwrap();
        let err = DynResource::update(&resource, created, plan.planned_state)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.to_string().contains("parent_role"));
        assert_eq!(fake.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_crud() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let plan = resource.plan(None, role_config("viewer", "Standard User")).unwrap();
        let created = DynResource::create(&resource, plan.planned_state).await.unwrap();
        assert_eq!(created["id"], "1");
        assert_eq!(created["team_id"], 1);
        assert_eq!(created["permissions"], json!(["alerts:ReadConfig", "logs.data:Read"]));

        let plan = resource
            .plan(Some(created.clone()), role_config("reader", "Standard User"))
            .unwrap();
        let updated = DynResource::update(&resource, created, plan.planned_state)
            .await
            .unwrap();
        assert_eq!(updated["name"], "reader");
        assert_eq!(fake.state().roles[&1].name, "reader");

        DynResource::delete(&resource, updated.clone()).await.unwrap();
        let read = DynResource::read(&resource, updated).await.unwrap();
        assert!(read.state.is_none());
    }

    #[tokio::test]
    async fn test_empty_permissions_round_trip() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let mut config = role_config("auditor", "Standard User");
        config["permissions"] = json!([]);

        let plan = resource.plan(None, config.clone()).unwrap();
        let created = DynResource::create(&resource, plan.planned_state).await.unwrap();
        assert_eq!(created["permissions"], json!([]));

        let read = DynResource::read(&resource, created).await.unwrap().state.unwrap();
        assert_eq!(read["permissions"], json!([]));
        let replan = resource.plan(Some(read), config).unwrap();
        assert!(replan.changes.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_id() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let err = DynResource::read(&resource, json!({"id": "abc"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }
}
