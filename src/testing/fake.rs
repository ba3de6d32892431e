//! An in-memory Coralogix backend.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tonic::Status;

use crate::clients::{
    alerts, archive_retentions, groups, metrics_archive, roles, views, webhooks, AlertsApi,
    ArchiveRetentionsApi, ClientSet, GroupsApi, MetricsArchiveApi, RolesApi, ViewsApi, WebhooksApi,
};
use crate::sdk::alerts::{
    AlertDef, CreateAlertDefRequest, CreateAlertDefResponse, DeleteAlertDefRequest,
    DeleteAlertDefResponse, GetAlertDefRequest, GetAlertDefResponse, ListAlertDefsRequest,
    ListAlertDefsResponse, ReplaceAlertDefRequest, ReplaceAlertDefResponse,
};
use crate::sdk::archive_retentions::{
    GetRetentionsRequest, GetRetentionsResponse, Retention, UpdateRetentionsRequest,
    UpdateRetentionsResponse,
};
use crate::sdk::groups::{
    AddUsersToTeamGroupRequest, AddUsersToTeamGroupResponse, GetGroupUsersRequest,
    GetGroupUsersResponse, RemoveUsersFromTeamGroupRequest, RemoveUsersFromTeamGroupResponse,
    TeamGroupId, User, UserId,
};
use crate::sdk::metrics_archive::{
    ConfigureTenantRequest, ConfigureTenantResponse, GetTenantConfigRequest,
    GetTenantConfigResponse, TenantConfig, UpdateTenantRequest, UpdateTenantResponse,
};
use crate::sdk::roles::{
    CreateRoleRequest, CreateRoleResponse, CustomRole, DeleteRoleRequest, DeleteRoleResponse,
    GetCustomRoleRequest, GetCustomRoleResponse, ListCustomRolesRequest, ListCustomRolesResponse,
    UpdateRoleRequest, UpdateRoleResponse,
};
use crate::sdk::views::{
    CreateViewRequest, CreateViewResponse, DeleteViewRequest, DeleteViewResponse, GetViewRequest,
    GetViewResponse, ListViewsRequest, ListViewsResponse, ReplaceViewRequest, ReplaceViewResponse,
    View,
};
use crate::sdk::webhooks::{
    CreateOutgoingWebhookRequest, CreateOutgoingWebhookResponse, DeleteOutgoingWebhookRequest,
    DeleteOutgoingWebhookResponse, GetOutgoingWebhookRequest, GetOutgoingWebhookResponse,
    ListAllOutgoingWebhooksRequest, ListAllOutgoingWebhooksResponse, OutgoingWebhook,
    OutgoingWebhookSummary, UpdateOutgoingWebhookRequest, UpdateOutgoingWebhookResponse,
};

/// Everything the fake backend stores. Tests may read and edit it directly
/// to simulate out-of-band changes.
#[derive(Debug, Default)]
pub struct FakeState {
    /// Alert definitions by ID.
    pub alerts: BTreeMap<String, AlertDef>,
    /// Outgoing webhooks by ID.
    pub webhooks: BTreeMap<String, OutgoingWebhook>,
    /// Custom roles by ID.
    pub roles: BTreeMap<u32, CustomRole>,
    /// Team group members by group ID.
    pub groups: BTreeMap<u32, BTreeSet<String>>,
    /// The account's four archive retention tiers.
    pub retentions: Vec<Retention>,
    /// The metrics archive configuration, once configured.
    pub tenant: Option<TenantConfig>,
    /// Saved views by ID.
    pub views: BTreeMap<i32, View>,
    /// RPCs served so far, in order.
    pub calls: Vec<&'static str>,
    next_id: u32,
}

impl FakeState {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// An in-memory backend implementing every service trait.
///
/// Unknown IDs answer with `Status::not_found`, like the real API.
#[derive(Debug, Default)]
pub struct FakeCoralogix {
    state: Mutex<FakeState>,
}

impl FakeCoralogix {
    /// A fresh backend holding only the default retention tiers.
    pub fn new() -> Arc<Self> {
        let retentions = (0..4)
            .map(|i| Retention {
                id: format!("retention-{}", i),
                order: i + 1,
                name: if i == 0 { "Default".to_string() } else { String::new() },
                editable: i != 0,
            })
            .collect();
        Arc::new(Self {
            state: Mutex::new(FakeState {
                retentions,
                ..Default::default()
            }),
        })
    }

    /// A client set whose every service is served by this backend.
    pub fn client_set(self: &Arc<Self>) -> Arc<ClientSet> {
        Arc::new(ClientSet {
            alerts: self.clone(),
            webhooks: self.clone(),
            roles: self.clone(),
            groups: self.clone(),
            archive_retentions: self.clone(),
            metrics_archive: self.clone(),
            views: self.clone(),
        })
    }

    /// Lock the stored state.
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// RPCs served so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    /// Create a team group with the given members.
    pub fn add_group(&self, group_id: u32, members: &[&str]) {
        self.state()
            .groups
            .insert(group_id, members.iter().map(|m| m.to_string()).collect());
    }

    /// Current members of a team group.
    pub fn group_members(&self, group_id: u32) -> BTreeSet<String> {
        self.state().groups.get(&group_id).cloned().unwrap_or_default()
    }

    fn serve(&self, rpc: &'static str) -> MutexGuard<'_, FakeState> {
        let mut state = self.state();
        state.calls.push(rpc);
        state
    }
}

fn not_found(kind: &str, id: impl std::fmt::Display) -> Status {
    Status::not_found(format!("{} {} not found", kind, id))
}

fn group_id(id: Option<TeamGroupId>) -> Result<u32, Status> {
    id.map(|g| g.id)
        .ok_or_else(|| Status::invalid_argument("group_id is required"))
}

#[async_trait]
impl AlertsApi for FakeCoralogix {
    async fn create(&self, request: CreateAlertDefRequest) -> Result<CreateAlertDefResponse, Status> {
        let mut state = self.serve(alerts::CREATE_ALERT_DEF);
        let alert_def = AlertDef {
            id: format!("alert-{}", state.next_id()),
            alert_def_properties: request.alert_def_properties,
        };
        state.alerts.insert(alert_def.id.clone(), alert_def.clone());
        Ok(CreateAlertDefResponse {
            alert_def: Some(alert_def),
        })
    }

    async fn get(&self, request: GetAlertDefRequest) -> Result<GetAlertDefResponse, Status> {
        let state = self.serve(alerts::GET_ALERT_DEF);
        let alert_def = state
            .alerts
            .get(&request.id)
            .cloned()
            .ok_or_else(|| not_found("alert", &request.id))?;
        Ok(GetAlertDefResponse {
            alert_def: Some(alert_def),
        })
    }

    async fn replace(&self, request: ReplaceAlertDefRequest) -> Result<ReplaceAlertDefResponse, Status> {
        let mut state = self.serve(alerts::REPLACE_ALERT_DEF);
        let alert_def = request
            .alert_def
            .ok_or_else(|| Status::invalid_argument("alert_def is required"))?;
        let stored = state
            .alerts
            .get_mut(&alert_def.id)
            .ok_or_else(|| not_found("alert", &alert_def.id))?;
        *stored = alert_def.clone();
        Ok(ReplaceAlertDefResponse {
            alert_def: Some(alert_def),
        })
    }

    async fn delete(&self, request: DeleteAlertDefRequest) -> Result<DeleteAlertDefResponse, Status> {
        let mut state = self.serve(alerts::DELETE_ALERT_DEF);
        state
            .alerts
            .remove(&request.id)
            .ok_or_else(|| not_found("alert", &request.id))?;
        Ok(DeleteAlertDefResponse {})
    }

    async fn list(&self, _request: ListAlertDefsRequest) -> Result<ListAlertDefsResponse, Status> {
        let state = self.serve(alerts::LIST_ALERT_DEFS);
        Ok(ListAlertDefsResponse {
            alert_defs: state.alerts.values().cloned().collect(),
        })
    }
}

#[async_trait]
impl WebhooksApi for FakeCoralogix {
    async fn create(
        &self,
        request: CreateOutgoingWebhookRequest,
    ) -> Result<CreateOutgoingWebhookResponse, Status> {
        let mut state = self.serve(webhooks::CREATE_OUTGOING_WEBHOOK);
        let external_id = state.next_id();
        let id = format!("webhook-{}", external_id);
        state.webhooks.insert(
            id.clone(),
            OutgoingWebhook {
                id: id.clone(),
                external_id,
                data: request.data,
            },
        );
        Ok(CreateOutgoingWebhookResponse { id })
    }

    async fn get(&self, request: GetOutgoingWebhookRequest) -> Result<GetOutgoingWebhookResponse, Status> {
        let state = self.serve(webhooks::GET_OUTGOING_WEBHOOK);
        let webhook = state
            .webhooks
            .get(&request.id)
            .cloned()
            .ok_or_else(|| not_found("webhook", &request.id))?;
        Ok(GetOutgoingWebhookResponse {
            webhook: Some(webhook),
        })
    }

    async fn update(
        &self,
        request: UpdateOutgoingWebhookRequest,
    ) -> Result<UpdateOutgoingWebhookResponse, Status> {
        let mut state = self.serve(webhooks::UPDATE_OUTGOING_WEBHOOK);
        let stored = state
            .webhooks
            .get_mut(&request.id)
            .ok_or_else(|| not_found("webhook", &request.id))?;
        stored.data = request.data;
        Ok(UpdateOutgoingWebhookResponse {})
    }

    async fn delete(
        &self,
        request: DeleteOutgoingWebhookRequest,
    ) -> Result<DeleteOutgoingWebhookResponse, Status> {
        let mut state = self.serve(webhooks::DELETE_OUTGOING_WEBHOOK);
        state
            .webhooks
            .remove(&request.id)
            .ok_or_else(|| not_found("webhook", &request.id))?;
        Ok(DeleteOutgoingWebhookResponse {})
    }

    async fn list(
        &self,
        _request: ListAllOutgoingWebhooksRequest,
    ) -> Result<ListAllOutgoingWebhooksResponse, Status> {
        let state = self.serve(webhooks::LIST_ALL_OUTGOING_WEBHOOKS);
        let deployed = state
            .webhooks
            .values()
            .map(|w| OutgoingWebhookSummary {
                id: w.id.clone(),
                name: w.data.as_ref().map(|d| d.name.clone()).unwrap_or_default(),
                r#type: w.data.as_ref().map(|d| d.r#type).unwrap_or_default(),
            })
            .collect();
        Ok(ListAllOutgoingWebhooksResponse { deployed })
    }
}

#[async_trait]
impl RolesApi for FakeCoralogix {
    async fn create(&self, request: CreateRoleRequest) -> Result<CreateRoleResponse, Status> {
        let mut state = self.serve(roles::CREATE_ROLE);
        let role_id = state.next_id();
        state.roles.insert(
            role_id,
            CustomRole {
                role_id,
                name: request.name,
                description: request.description,
                parent_role_name: request.parent_role_name,
                permissions: request.permissions,
                team_id: 1,
            },
        );
        Ok(CreateRoleResponse { id: role_id })
    }

    async fn get(&self, request: GetCustomRoleRequest) -> Result<GetCustomRoleResponse, Status> {
        let state = self.serve(roles::GET_CUSTOM_ROLE);
        let role = state
            .roles
            .get(&request.role_id)
            .cloned()
            .ok_or_else(|| not_found("role", request.role_id))?;
        Ok(GetCustomRoleResponse { role: Some(role) })
    }

    async fn update(&self, request: UpdateRoleRequest) -> Result<UpdateRoleResponse, Status> {
        let mut state = self.serve(roles::UPDATE_ROLE);
        let role = state
            .roles
            .get_mut(&request.role_id)
            .ok_or_else(|| not_found("role", request.role_id))?;
        if let Some(name) = request.new_name {
            role.name = name;
        }
        if let Some(description) = request.new_description {
            role.description = description;
        }
        if let Some(permissions) = request.new_permissions {
            role.permissions = permissions.permissions;
        }
        Ok(UpdateRoleResponse {})
    }

    async fn delete(&self, request: DeleteRoleRequest) -> Result<DeleteRoleResponse, Status> {
        let mut state = self.serve(roles::DELETE_ROLE);
        state
            .roles
            .remove(&request.role_id)
            .ok_or_else(|| not_found("role", request.role_id))?;
        Ok(DeleteRoleResponse {})
    }

    async fn list(&self, _request: ListCustomRolesRequest) -> Result<ListCustomRolesResponse, Status> {
        let state = self.serve(roles::LIST_CUSTOM_ROLES);
        Ok(ListCustomRolesResponse {
            roles: state.roles.values().cloned().collect(),
        })
    }
}

#[async_trait]
impl GroupsApi for FakeCoralogix {
    async fn get_users(&self, request: GetGroupUsersRequest) -> Result<GetGroupUsersResponse, Status> {
        let state = self.serve(groups::GET_GROUP_USERS);
        let id = group_id(request.group_id)?;
        let members = state.groups.get(&id).ok_or_else(|| not_found("group", id))?;
        let users = members
            .iter()
            .map(|m| User {
                user_id: Some(UserId { id: m.clone() }),
                username: format!("{}@example.com", m),
            })
            .collect();
        Ok(GetGroupUsersResponse { users })
    }

    async fn add_users(
        &self,
        request: AddUsersToTeamGroupRequest,
    ) -> Result<AddUsersToTeamGroupResponse, Status> {
        let mut state = self.serve(groups::ADD_USERS_TO_TEAM_GROUP);
        let id = group_id(request.group_id)?;
        let members = state.groups.get_mut(&id).ok_or_else(|| not_found("group", id))?;
        members.extend(request.user_ids.into_iter().map(|u| u.id));
        Ok(AddUsersToTeamGroupResponse {})
    }

    async fn remove_users(
        &self,
        request: RemoveUsersFromTeamGroupRequest,
    ) -> Result<RemoveUsersFromTeamGroupResponse, Status> {
        let mut state = self.serve(groups::REMOVE_USERS_FROM_TEAM_GROUP);
        let id = group_id(request.group_id)?;
        let members = state.groups.get_mut(&id).ok_or_else(|| not_found("group", id))?;
        for user in request.user_ids {
            members.remove(&user.id);
        }
        Ok(RemoveUsersFromTeamGroupResponse {})
    }
}

#[async_trait]
impl ArchiveRetentionsApi for FakeCoralogix {
    async fn get(&self, _request: GetRetentionsRequest) -> Result<GetRetentionsResponse, Status> {
        let state = self.serve(archive_retentions::GET_RETENTIONS);
        Ok(GetRetentionsResponse {
            retentions: state.retentions.clone(),
        })
    }

    async fn update(&self, request: UpdateRetentionsRequest) -> Result<UpdateRetentionsResponse, Status> {
        let mut state = self.serve(archive_retentions::UPDATE_RETENTIONS);
        for element in request.retention_update_elements {
            let retention = state
                .retentions
                .iter_mut()
                .find(|r| r.id == element.id)
                .ok_or_else(|| Status::invalid_argument(format!("unknown retention {}", element.id)))?;
            retention.name = element.name;
        }
        Ok(UpdateRetentionsResponse {
            retentions: state.retentions.clone(),
        })
    }
}

#[async_trait]
impl MetricsArchiveApi for FakeCoralogix {
    async fn get(&self, _request: GetTenantConfigRequest) -> Result<GetTenantConfigResponse, Status> {
        let state = self.serve(metrics_archive::GET_TENANT_CONFIG);
        let tenant_config = state
            .tenant
            .clone()
            .ok_or_else(|| Status::not_found("metrics archive is not configured"))?;
        Ok(GetTenantConfigResponse {
            tenant_config: Some(tenant_config),
        })
    }

    async fn configure(&self, request: ConfigureTenantRequest) -> Result<ConfigureTenantResponse, Status> {
        let mut state = self.serve(metrics_archive::CONFIGURE_TENANT);
        state.tenant = request.tenant_config;
        Ok(ConfigureTenantResponse {})
    }

    async fn update(&self, request: UpdateTenantRequest) -> Result<UpdateTenantResponse, Status> {
        let mut state = self.serve(metrics_archive::UPDATE_TENANT);
        if state.tenant.is_none() {
            return Err(Status::failed_precondition("metrics archive is not configured"));
        }
        state.tenant = request.tenant_config;
        Ok(UpdateTenantResponse {})
    }
}

#[async_trait]
impl ViewsApi for FakeCoralogix {
    async fn create(&self, request: CreateViewRequest) -> Result<CreateViewResponse, Status> {
        let mut state = self.serve(views::CREATE_VIEW);
        let id = state.next_id() as i32;
        let view = View {
            id,
            name: request.name,
            search_query: request.search_query,
            time_selection: request.time_selection,
            filters: request.filters,
            folder_id: request.folder_id,
        };
        state.views.insert(id, view.clone());
        Ok(CreateViewResponse { view: Some(view) })
    }

    async fn get(&self, request: GetViewRequest) -> Result<GetViewResponse, Status> {
        let state = self.serve(views::GET_VIEW);
        let view = state
            .views
            .get(&request.id)
            .cloned()
            .ok_or_else(|| not_found("view", request.id))?;
        Ok(GetViewResponse { view: Some(view) })
    }

    async fn replace(&self, request: ReplaceViewRequest) -> Result<ReplaceViewResponse, Status> {
        let mut state = self.serve(views::REPLACE_VIEW);
        let view = request
            .view
            .ok_or_else(|| Status::invalid_argument("view is required"))?;
        let stored = state
            .views
            .get_mut(&view.id)
            .ok_or_else(|| not_found("view", view.id))?;
        *stored = view.clone();
        Ok(ReplaceViewResponse { view: Some(view) })
    }

    async fn delete(&self, request: DeleteViewRequest) -> Result<DeleteViewResponse, Status> {
        let mut state = self.serve(views::DELETE_VIEW);
        state
            .views
            .remove(&request.id)
            .ok_or_else(|| not_found("view", request.id))?;
        Ok(DeleteViewResponse {})
    }

    async fn list(&self, _request: ListViewsRequest) -> Result<ListViewsResponse, Status> {
        let state = self.serve(views::LIST_VIEWS);
        Ok(ListViewsResponse {
            views: state.views.values().cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let fake = FakeCoralogix::new();
        let clients = fake.client_set();

        let status = clients
            .alerts
            .get(GetAlertDefRequest { id: "nope".into() })
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);

        let status = clients
            .groups
            .get_users(GetGroupUsersRequest {
                group_id: Some(TeamGroupId { id: 9 }),
            })
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);
        assert_eq!(fake.calls(), vec![alerts::GET_ALERT_DEF, groups::GET_GROUP_USERS]);
    }

    #[tokio::test]
    async fn test_default_retentions() {
        let fake = FakeCoralogix::new();
        let response = fake
            .client_set()
            .archive_retentions
            .get(GetRetentionsRequest {})
            .await
            .unwrap();
        assert_eq!(response.retentions.len(), 4);
        assert_eq!(response.retentions[0].name, "Default");
        assert!(!response.retentions[0].editable);
    }
}
