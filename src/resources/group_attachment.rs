//! `coralogix_group_attachment`: a set of users kept attached to a team group.
//!
//! The resource owns only the users it lists. Members added to the group
//! out-of-band are neither reported nor removed.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::clients::{groups as rpc, ClientSet};
use crate::error::ProviderError;
use crate::resource::{Clients, Resource};
use crate::resources::found;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema, Validator};
use crate::sdk::groups::{
    AddUsersToTeamGroupRequest, GetGroupUsersRequest, RemoveUsersFromTeamGroupRequest, TeamGroupId, UserId,
};
use crate::transcode::{narrow, parse_id, required, Result};
use crate::types::TfValue;

/// Users attached to one team group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupAttachmentModel {
    /// The group id as a string.
    pub id: TfValue<String>,
    /// The team group the users belong to.
    pub group_id: TfValue<i64>,
    /// Users owned by this resource that are still in the group.
    pub user_ids: TfValue<BTreeSet<String>>,
}

/// Schema of `coralogix_group_attachment`.
pub fn group_attachment_schema() -> Schema {
    Schema::v0()
        .with_description("Attaches users to a Coralogix team group.")
        .with_attribute("id", Attribute::id())
        .with_attribute(
            "group_id",
            Attribute::required_int64()
                .with_force_new()
                .with_validator(Validator::Between { min: 1.0, max: u32::MAX as f64 }),
        )
        .with_attribute(
            "user_ids",
            Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::required())
                .with_validator(Validator::NotEmpty)
                .with_description("Users this resource keeps in the group."),
        )
}

/// Current members of a team group.
pub async fn group_members(clients: &ClientSet, group_id: u32) -> Result<BTreeSet<String>> {
    let request = GetGroupUsersRequest {
        group_id: Some(TeamGroupId { id: group_id }),
    };
    debug!(group_id, "Reading team group members");
    let response = clients
        .groups
        .get_users(request.clone())
        .await
        .map_err(|status| ProviderError::rpc(rpc::GET_GROUP_USERS, &request, status))?;
    Ok(response
        .users
        .into_iter()
        .filter_map(|user| user.user_id.map(|u| u.id))
        .collect())
}

fn user_ids(users: &BTreeSet<String>) -> Vec<UserId> {
    users.iter().map(|id| UserId { id: id.clone() }).collect()
}

async fn add_users(clients: &ClientSet, group_id: u32, users: &BTreeSet<String>) -> Result<()> {
    if users.is_empty() {
        return Ok(());
    }
    let request = AddUsersToTeamGroupRequest {
        group_id: Some(TeamGroupId { id: group_id }),
        user_ids: user_ids(users),
    };
    clients
        .groups
        .add_users(request.clone())
        .await
        .map_err(|status| ProviderError::rpc(rpc::ADD_USERS_TO_TEAM_GROUP, &request, status))?;
    info!(group_id, count = users.len(), "Users added to team group");
    Ok(())
}

async fn remove_users(clients: &ClientSet, group_id: u32, users: &BTreeSet<String>) -> Result<()> {
    if users.is_empty() {
        return Ok(());
    }
    let request = RemoveUsersFromTeamGroupRequest {
        group_id: Some(TeamGroupId { id: group_id }),
        user_ids: user_ids(users),
    };
    clients
        .groups
        .remove_users(request.clone())
        .await
        .map_err(|status| ProviderError::rpc(rpc::REMOVE_USERS_FROM_TEAM_GROUP, &request, status))?;
    info!(group_id, count = users.len(), "Users removed from team group");
    Ok(())
}

fn group_id(model: &GroupAttachmentModel) -> Result<u32> {
    narrow("group_id", required("group_id", &model.group_id)?)
}

fn attachment(group_id: u32, user_ids: BTreeSet<String>) -> GroupAttachmentModel {
    GroupAttachmentModel {
        id: TfValue::Known(group_id.to_string()),
        group_id: TfValue::Known(i64::from(group_id)),
        user_ids: TfValue::Known(user_ids),
    }
}

/// Handler for `coralogix_group_attachment`.
#[derive(Default)]
pub struct GroupAttachmentResource {
    clients: Clients,
}

#[async_trait]
impl Resource for GroupAttachmentResource {
    type Model = GroupAttachmentModel;

    fn type_name(&self) -> &'static str {
        "coralogix_group_attachment"
    }

    fn schema(&self) -> Schema {
        group_attachment_schema()
    }

    fn configure(&mut self, clients: Arc<ClientSet>) {
        self.clients.set(clients);
    }

    async fn create(&self, plan: GroupAttachmentModel) -> Result<GroupAttachmentModel> {
        let clients = self.clients.get()?;
        let group_id = group_id(&plan)?;
        let desired = plan.user_ids.value_or_default();
        let members = group_members(clients, group_id).await?;

        let missing: BTreeSet<String> = desired.difference(&members).cloned().collect();
        add_users(clients, group_id, &missing).await?;
        Ok(attachment(group_id, desired))
    }

    async fn read(&self, state: GroupAttachmentModel) -> Result<Option<GroupAttachmentModel>> {
        let group_id = group_id(&state)?;
        let Some(members) = found(group_members(self.clients.get()?, group_id).await)? else {
            return Ok(None);
        };
        // Owned users removed out-of-band drop out; an empty set stays known.
        let owned = state.user_ids.value_or_default();
        Ok(Some(attachment(group_id, owned.intersection(&members).cloned().collect())))
    }

    async fn update(&self, plan: GroupAttachmentModel, state: GroupAttachmentModel) -> Result<GroupAttachmentModel> {
        let clients = self.clients.get()?;
        let group_id = group_id(&state)?;
        let desired = plan.user_ids.value_or_default();
        let owned = state.user_ids.value_or_default();
        let members = group_members(clients, group_id).await?;

        let dropped: BTreeSet<String> = owned
            .difference(&desired)
            .filter(|user| members.contains(*user))
            .cloned()
            .collect();
        let missing: BTreeSet<String> = desired.difference(&members).cloned().collect();
        remove_users(clients, group_id, &dropped).await?;
        add_users(clients, group_id, &missing).await?;
        Ok(attachment(group_id, desired))
    }

    async fn delete(&self, state: GroupAttachmentModel) -> Result<()> {
        let clients = self.clients.get()?;
        let group_id = group_id(&state)?;
        let owned = state.user_ids.value_or_default();
        let members = match found(group_members(clients, group_id).await)? {
            Some(members) => members,
            None => return Ok(()),
        };
        let attached: BTreeSet<String> = owned.intersection(&members).cloned().collect();
        remove_users(clients, group_id, &attached).await
    }

    /// An import adopts every current member of the group.
    async fn import_state(&self, id: &str) -> Result<Value> {
        let group_id: u32 = parse_id("id", id)?;
        let members = group_members(self.clients.get()?, group_id).await?;
        Ok(serde_json::to_value(attachment(group_id, members))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::DynResource;
    use crate::testing::FakeCoralogix;
    use serde_json::json;

    fn resource(fake: &Arc<FakeCoralogix>) -> GroupAttachmentResource {
        let mut resource = GroupAttachmentResource::default();
        Resource::configure(&mut resource, fake.client_set());
        resource
    }

    fn users(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    async fn attach(resource: &GroupAttachmentResource, ids: &[&str]) -> Value {
        let plan = resource
            .plan(None, json!({ "group_id": 5, "user_ids": ids }))
            .unwrap();
        DynResource::create(resource, plan.planned_state).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_adds_missing_users() {
        let fake = FakeCoralogix::new();
        fake.add_group(5, &["u1", "u2"]);
        let resource = resource(&fake);

        let state = attach(&resource, &["u2", "u3"]).await;

        assert_eq!(state["id"], "5");
        assert_eq!(state["user_ids"], json!(["u2", "u3"]));
        assert_eq!(fake.group_members(5), users(&["u1", "u2", "u3"]));
    }

    #[tokio::test]
    async fn test_read_reports_only_owned_users() {
        let fake = FakeCoralogix::new();
        fake.add_group(5, &[]);
        let resource = resource(&fake);
        let state = attach(&resource, &["u1", "u2"]).await;

        fake.state().groups.insert(5, users(&["u2", "u9"]));

        let read = DynResource::read(&resource, state).await.unwrap();
        assert_eq!(read.state.unwrap()["user_ids"], json!(["u2"]));
    }

    #[tokio::test]
    async fn test_update_moves_only_owned_users() {
        let fake = FakeCoralogix::new();
        fake.add_group(5, &["admin"]);
        let resource = resource(&fake);
        let state = attach(&resource, &["u1", "u2"]).await;

        let plan = resource
            .plan(Some(state.clone()), json!({ "group_id": 5, "user_ids": ["u2", "u3"] }))
            .unwrap();
        assert!(!plan.requires_replace);
        let updated = DynResource::update(&resource, state, plan.planned_state)
            .await
            .unwrap();

        assert_eq!(updated["user_ids"], json!(["u2", "u3"]));
        assert_eq!(fake.group_members(5), users(&["admin", "u2", "u3"]));
    }

    #[tokio::test]
    async fn test_delete_keeps_out_of_band_members() {
        let fake = FakeCoralogix::new();
        fake.add_group(5, &["admin"]);
        let resource = resource(&fake);
        let state = attach(&resource, &["u1"]).await;
        fake.state().groups.entry(5).or_default().insert("u7".to_string());

        DynResource::delete(&resource, state).await.unwrap();
        assert_eq!(fake.group_members(5), users(&["admin", "u7"]));
    }

    #[tokio::test]
    async fn test_changing_group_replaces() {
        let fake = FakeCoralogix::new();
        fake.add_group(5, &[]);
        let resource = resource(&fake);
        let state = attach(&resource, &["u1"]).await;

        let plan = resource
            .plan(Some(state), json!({ "group_id": 6, "user_ids": ["u1"] }))
            .unwrap();
        assert!(plan.requires_replace);
    }

    #[tokio::test]
    async fn test_missing_group_is_removed_from_state() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let read = DynResource::read(&resource, json!({ "id": "5", "group_id": 5, "user_ids": ["u1"] }))
            .await
            .unwrap();
        assert!(read.state.is_none());
    }

    #[tokio::test]
    async fn test_import_adopts_current_members() {
        let fake = FakeCoralogix::new();
        fake.add_group(8, &["u1", "u2"]);
        let resource = resource(&fake);

        let imported = resource.import("8").await.unwrap();
        assert_eq!(imported["group_id"], 8);
        assert_eq!(imported["user_ids"], json!(["u1", "u2"]));
        let read = DynResource::read(&resource, imported).await.unwrap();
        assert_eq!(read.state.unwrap()["user_ids"], json!(["u1", "u2"]));

        assert!(resource.import("group").await.is_err());
        assert!(resource.import("9").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_read_keeps_empty_owned_set() {
        let fake = FakeCoralogix::new();
        fake.add_group(5, &["admin"]);
        let resource = resource(&fake);
        let state = attach(&resource, &["u1"]).await;

        fake.state().groups.insert(5, users(&["admin"]));

        let first = DynResource::read(&resource, state).await.unwrap().state.unwrap();
        assert_eq!(first["user_ids"], json!([]));
        let second = DynResource::read(&resource, first).await.unwrap().state.unwrap();
        assert_eq!(second["user_ids"], json!([]));

        let plan = resource
            .plan(Some(second.clone()), json!({ "group_id": 5, "user_ids": ["u1"] }))
            .unwrap();
        assert!(!plan.changes.is_empty());
        let updated = DynResource::update(&resource, second, plan.planned_state)
            .await
            .unwrap();

        assert_eq!(updated["user_ids"], json!(["u1"]));
        assert_eq!(fake.group_members(5), users(&["admin", "u1"]));
    }

    #[tokio::test]
    async fn test_update_then_read_reports_desired_users() {
        let fake = FakeCoralogix::new();
        fake.add_group(5, &["admin", "u4"]);
        let resource = resource(&fake);
        let state = attach(&resource, &["u1", "u2"]).await;

        let plan = resource
            .plan(Some(state.clone()), json!({ "group_id": 5, "user_ids": ["u2", "u4"] }))
            .unwrap();
        let updated = DynResource::update(&resource, state, plan.planned_state)
            .await
            .unwrap();
        let read = DynResource::read(&resource, updated).await.unwrap().state.unwrap();

        assert_eq!(read["user_ids"], json!(["u2", "u4"]));
        assert_eq!(fake.group_members(5), users(&["admin", "u2", "u4"]));
    }
}
