//! Team group membership service.

use async_trait::async_trait;
use tonic::Status;

use super::{unary, AuthChannel};
use crate::sdk::groups::team_permissions_mgmt_service_client::TeamPermissionsMgmtServiceClient;
use crate::sdk::groups::{
    AddUsersToTeamGroupRequest, AddUsersToTeamGroupResponse, GetGroupUsersRequest,
    GetGroupUsersResponse, RemoveUsersFromTeamGroupRequest, RemoveUsersFromTeamGroupResponse,
};

/// Full method path of `GetGroupUsers`.
pub const GET_GROUP_USERS: &str = "/coralogix.permissions.v1.TeamPermissionsMgmtService/GetGroupUsers";
/// Full method path of `AddUsersToTeamGroup`.
pub const ADD_USERS_TO_TEAM_GROUP: &str =
    "/coralogix.permissions.v1.TeamPermissionsMgmtService/AddUsersToTeamGroup";
/// Full method path of `RemoveUsersFromTeamGroup`.
pub const REMOVE_USERS_FROM_TEAM_GROUP: &str =
    "/coralogix.permissions.v1.TeamPermissionsMgmtService/RemoveUsersFromTeamGroup";

/// Operations on team group membership.
#[async_trait]
pub trait GroupsApi: Send + Sync {
    /// Call `GetGroupUsers`.
    async fn get_users(&self, request: GetGroupUsersRequest) -> Result<GetGroupUsersResponse, Status>;
    /// Call `AddUsersToTeamGroup`.
    async fn add_users(
        &self,
        request: AddUsersToTeamGroupRequest,
    ) -> Result<AddUsersToTeamGroupResponse, Status>;
    /// Call `RemoveUsersFromTeamGroup`.
    async fn remove_users(
        &self,
        request: RemoveUsersFromTeamGroupRequest,
    ) -> Result<RemoveUsersFromTeamGroupResponse, Status>;
}

/// [`GroupsApi`] over gRPC.
pub struct GrpcGroups {
    client: TeamPermissionsMgmtServiceClient<AuthChannel>,
}

impl GrpcGroups {
    /// A client over the authenticated channel.
    pub fn new(channel: AuthChannel) -> Self {
        Self {
            client: TeamPermissionsMgmtServiceClient::new(channel),
        }
    }
}

#[async_trait]
impl GroupsApi for GrpcGroups {
    async fn get_users(&self, request: GetGroupUsersRequest) -> Result<GetGroupUsersResponse, Status> {
        unary!(self.client, get_group_users, request)
    }

    async fn add_users(
        &self,
        request: AddUsersToTeamGroupRequest,
    ) -> Result<AddUsersToTeamGroupResponse, Status> {
        unary!(self.client, add_users_to_team_group, request)
    }

    async fn remove_users(
        &self,
        request: RemoveUsersFromTeamGroupRequest,
    ) -> Result<RemoveUsersFromTeamGroupResponse, Status> {
        unary!(self.client, remove_users_from_team_group, request)
    }
}
