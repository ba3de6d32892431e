//! Outgoing webhooks service.

use async_trait::async_trait;
use tonic::Status;

use super::{unary, AuthChannel};
use crate::sdk::webhooks::outgoing_webhooks_service_client::OutgoingWebhooksServiceClient;
use crate::sdk::webhooks::{
    CreateOutgoingWebhookRequest, CreateOutgoingWebhookResponse, DeleteOutgoingWebhookRequest,
    DeleteOutgoingWebhookResponse, GetOutgoingWebhookRequest, GetOutgoingWebhookResponse,
    ListAllOutgoingWebhooksRequest, ListAllOutgoingWebhooksResponse, UpdateOutgoingWebhookRequest,
    UpdateOutgoingWebhookResponse,
};

/// Full method path of `CreateOutgoingWebhook`.
pub const CREATE_OUTGOING_WEBHOOK: &str =
    "/coralogix.webhooks.v1.OutgoingWebhooksService/CreateOutgoingWebhook";
/// Full method path of `GetOutgoingWebhook`.
pub const GET_OUTGOING_WEBHOOK: &str =
    "/coralogix.webhooks.v1.OutgoingWebhooksService/GetOutgoingWebhook";
/// Full method path of `UpdateOutgoingWebhook`.
pub const UPDATE_OUTGOING_WEBHOOK: &str =
    "/coralogix.webhooks.v1.OutgoingWebhooksService/UpdateOutgoingWebhook";
/// Full method path of `DeleteOutgoingWebhook`.
pub const DELETE_OUTGOING_WEBHOOK: &str =
    "/coralogix.webhooks.v1.OutgoingWebhooksService/DeleteOutgoingWebhook";
/// Full method path of `ListAllOutgoingWebhooks`.
pub const LIST_ALL_OUTGOING_WEBHOOKS: &str =
    "/coralogix.webhooks.v1.OutgoingWebhooksService/ListAllOutgoingWebhooks";

/// Operations on outgoing webhooks.
#[async_trait]
pub trait WebhooksApi: Send + Sync {
    /// Call `CreateOutgoingWebhook`.
    async fn create(
        &self,
        request: CreateOutgoingWebhookRequest,
    ) -> Result<CreateOutgoingWebhookResponse, Status>;
    /// Call `GetOutgoingWebhook`.
    async fn get(&self, request: GetOutgoingWebhookRequest) -> Result<GetOutgoingWebhookResponse, Status>;
    /// Call `UpdateOutgoingWebhook`.
    async fn update(
        &self,
        request: UpdateOutgoingWebhookRequest,
    ) -> Result<UpdateOutgoingWebhookResponse, Status>;
    /// Call `DeleteOutgoingWebhook`.
    async fn delete(
        &self,
        request: DeleteOutgoingWebhookRequest,
    ) -> Result<DeleteOutgoingWebhookResponse, Status>;
    /// Call `ListAllOutgoingWebhooks`.
    async fn list(
        &self,
        request: ListAllOutgoingWebhooksRequest,
    ) -> Result<ListAllOutgoingWebhooksResponse, Status>;
}

/// [`WebhooksApi`] over gRPC.
pub struct GrpcWebhooks {
    client: OutgoingWebhooksServiceClient<AuthChannel>,
}

impl GrpcWebhooks {
    /// A client over the authenticated channel.
    pub fn new(channel: AuthChannel) -> Self {
        Self {
            client: OutgoingWebhooksServiceClient::new(channel),
        }
    }
}

#[async_trait]
impl WebhooksApi for GrpcWebhooks {
    async fn create(
        &self,
        request: CreateOutgoingWebhookRequest,
    ) -> Result<CreateOutgoingWebhookResponse, Status> {
        unary!(self.client, create_outgoing_webhook, request)
    }

    async fn get(&self, request: GetOutgoingWebhookRequest) -> Result<GetOutgoingWebhookResponse, Status> {
        unary!(self.client, get_outgoing_webhook, request)
    }

    async fn update(
        &self,
        request: UpdateOutgoingWebhookRequest,
    ) -> Result<UpdateOutgoingWebhookResponse, Status> {
        unary!(self.client, update_outgoing_webhook, request)
    }

    async fn delete(
        &self,
        request: DeleteOutgoingWebhookRequest,
    ) -> Result<DeleteOutgoingWebhookResponse, Status> {
        unary!(self.client, delete_outgoing_webhook, request)
    }

    async fn list(
        &self,
        request: ListAllOutgoingWebhooksRequest,
    ) -> Result<ListAllOutgoingWebhooksResponse, Status> {
        unary!(self.client, list_all_outgoing_webhooks, request)
    }
}
