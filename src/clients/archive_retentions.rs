//! Logs archive retentions service.

use async_trait::async_trait;
use tonic::Status;

use super::{unary, AuthChannel};
use crate::sdk::archive_retentions::archive_retentions_service_client::ArchiveRetentionsServiceClient;
use crate::sdk::archive_retentions::{
    GetRetentionsRequest, GetRetentionsResponse, UpdateRetentionsRequest, UpdateRetentionsResponse,
};

/// Full method path of `GetRetentions`.
pub const GET_RETENTIONS: &str = "/coralogix.archive.retentions.v1.ArchiveRetentionsService/GetRetentions";
/// Full method path of `UpdateRetentions`.
pub const UPDATE_RETENTIONS: &str =
    "/coralogix.archive.retentions.v1.ArchiveRetentionsService/UpdateRetentions";

/// Operations on the account's archive retentions.
#[async_trait]
pub trait ArchiveRetentionsApi: Send + Sync {
    /// Call `GetRetentions`.
    async fn get(&self, request: GetRetentionsRequest) -> Result<GetRetentionsResponse, Status>;
    /// Call `UpdateRetentions`.
    async fn update(&self, request: UpdateRetentionsRequest) -> Result<UpdateRetentionsResponse, Status>;
}

/// [`ArchiveRetentionsApi`] over gRPC.
pub struct GrpcArchiveRetentions {
    client: ArchiveRetentionsServiceClient<AuthChannel>,
}

impl GrpcArchiveRetentions {
    /// A client over the authenticated channel.
    pub fn new(channel: AuthChannel) -> Self {
        Self {
            client: ArchiveRetentionsServiceClient::new(channel),
        }
    }
}

#[async_trait]
impl ArchiveRetentionsApi for GrpcArchiveRetentions {
    async fn get(&self, request: GetRetentionsRequest) -> Result<GetRetentionsResponse, Status> {
        unary!(self.client, get_retentions, request)
    }

    async fn update(&self, request: UpdateRetentionsRequest) -> Result<UpdateRetentionsResponse, Status> {
        unary!(self.client, update_retentions, request)
    }
}
