//! Custom role management service.

use async_trait::async_trait;
use tonic::Status;

use super::{unary, AuthChannel};
use crate::sdk::roles::role_management_service_client::RoleManagementServiceClient;
use crate::sdk::roles::{
    CreateRoleRequest, CreateRoleResponse, DeleteRoleRequest, DeleteRoleResponse,
    GetCustomRoleRequest, GetCustomRoleResponse, ListCustomRolesRequest, ListCustomRolesResponse,
    UpdateRoleRequest, UpdateRoleResponse,
};

/// Full method path of `CreateRole`.
pub const CREATE_ROLE: &str = "/coralogix.roles.v2.RoleManagementService/CreateRole";
/// Full method path of `GetCustomRole`.
pub const GET_CUSTOM_ROLE: &str = "/coralogix.roles.v2.RoleManagementService/GetCustomRole";
/// Full method path of `UpdateRole`.
pub const UPDATE_ROLE: &str = "/coralogix.roles.v2.RoleManagementService/UpdateRole";
/// Full method path of `DeleteRole`.
pub const DELETE_ROLE: &str = "/coralogix.roles.v2.RoleManagementService/DeleteRole";
/// Full method path of `ListCustomRoles`.
pub const LIST_CUSTOM_ROLES: &str = "/coralogix.roles.v2.RoleManagementService/ListCustomRoles";

/// Operations on custom roles.
#[async_trait]
pub trait RolesApi: Send + Sync {
    /// Call `CreateRole`.
    async fn create(&self, request: CreateRoleRequest) -> Result<CreateRoleResponse, Status>;
    /// Call `GetCustomRole`.
    async fn get(&self, request: GetCustomRoleRequest) -> Result<GetCustomRoleResponse, Status>;
    /// Call `UpdateRole`.
    async fn update(&self, request: UpdateRoleRequest) -> Result<UpdateRoleResponse, Status>;
    /// Call `DeleteRole`.
    async fn delete(&self, request: DeleteRoleRequest) -> Result<DeleteRoleResponse, Status>;
    /// Call `ListCustomRoles`.
    async fn list(&self, request: ListCustomRolesRequest) -> Result<ListCustomRolesResponse, Status>;
}

/// [`RolesApi`] over gRPC.
pub struct GrpcRoles {
    client: RoleManagementServiceClient<AuthChannel>,
}

impl GrpcRoles {
    /// A client over the authenticated channel.
    pub fn new(channel: AuthChannel) -> Self {
        Self {
            client: RoleManagementServiceClient::new(channel),
        }
    }
}

#[async_trait]
impl RolesApi for GrpcRoles {
    async fn create(&self, request: CreateRoleRequest) -> Result<CreateRoleResponse, Status> {
        unary!(self.client, create_role, request)
    }

    async fn get(&self, request: GetCustomRoleRequest) -> Result<GetCustomRoleResponse, Status> {
        unary!(self.client, get_custom_role, request)
    }

    async fn update(&self, request: UpdateRoleRequest) -> Result<UpdateRoleResponse, Status> {
        unary!(self.client, update_role, request)
    }

    async fn delete(&self, request: DeleteRoleRequest) -> Result<DeleteRoleResponse, Status> {
        unary!(self.client, delete_role, request)
    }

    async fn list(&self, request: ListCustomRolesRequest) -> Result<ListCustomRolesResponse, Status> {
        unary!(self.client, list_custom_roles, request)
    }
}
