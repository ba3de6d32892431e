//! Alert definitions service.

use async_trait::async_trait;
use tonic::Status;

use super::{unary, AuthChannel};
use crate::sdk::alerts::alert_defs_service_client::AlertDefsServiceClient;
use crate::sdk::alerts::{
    CreateAlertDefRequest, CreateAlertDefResponse, DeleteAlertDefRequest, DeleteAlertDefResponse,
    GetAlertDefRequest, GetAlertDefResponse, ListAlertDefsRequest, ListAlertDefsResponse,
    ReplaceAlertDefRequest, ReplaceAlertDefResponse,
};

/// Full method path of `CreateAlertDef`.
pub const CREATE_ALERT_DEF: &str = "/coralogix.alerts.v3.AlertDefsService/CreateAlertDef";
/// Full method path of `GetAlertDef`.
pub const GET_ALERT_DEF: &str = "/coralogix.alerts.v3.AlertDefsService/GetAlertDef";
/// Full method path of `ReplaceAlertDef`.
pub const REPLACE_ALERT_DEF: &str = "/coralogix.alerts.v3.AlertDefsService/ReplaceAlertDef";
/// Full method path of `DeleteAlertDef`.
pub const DELETE_ALERT_DEF: &str = "/coralogix.alerts.v3.AlertDefsService/DeleteAlertDef";
/// Full method path of `ListAlertDefs`.
pub const LIST_ALERT_DEFS: &str = "/coralogix.alerts.v3.AlertDefsService/ListAlertDefs";

/// Operations on alert definitions.
#[async_trait]
pub trait AlertsApi: Send + Sync {
    /// Call `CreateAlertDef`.
    async fn create(&self, request: CreateAlertDefRequest) -> Result<CreateAlertDefResponse, Status>;
    /// Call `GetAlertDef`.
    async fn get(&self, request: GetAlertDefRequest) -> Result<GetAlertDefResponse, Status>;
    /// Call `ReplaceAlertDef`.
    async fn replace(&self, request: ReplaceAlertDefRequest) -> Result<ReplaceAlertDefResponse, Status>;
    /// Call `DeleteAlertDef`.
    async fn delete(&self, request: DeleteAlertDefRequest) -> Result<DeleteAlertDefResponse, Status>;
    /// Call `ListAlertDefs`.
    async fn list(&self, request: ListAlertDefsRequest) -> Result<ListAlertDefsResponse, Status>;
}

/// [`AlertsApi`] over gRPC.
pub struct GrpcAlerts {
    client: AlertDefsServiceClient<AuthChannel>,
}

impl GrpcAlerts {
    /// A client over the authenticated channel.
    pub fn new(channel: AuthChannel) -> Self {
        Self {
            client: AlertDefsServiceClient::new(channel),
        }
    }
}

#[async_trait]
impl AlertsApi for GrpcAlerts {
    async fn create(&self, request: CreateAlertDefRequest) -> Result<CreateAlertDefResponse, Status> {
        unary!(self.client, create_alert_def, request)
    }

    async fn get(&self, request: GetAlertDefRequest) -> Result<GetAlertDefResponse, Status> {
        unary!(self.client, get_alert_def, request)
    }

    async fn replace(&self, request: ReplaceAlertDefRequest) -> Result<ReplaceAlertDefResponse, Status> {
        unary!(self.client, replace_alert_def, request)
    }

    async fn delete(&self, request: DeleteAlertDefRequest) -> Result<DeleteAlertDefResponse, Status> {
        unary!(self.client, delete_alert_def, request)
    }

    async fn list(&self, request: ListAlertDefsRequest) -> Result<ListAlertDefsResponse, Status> {
        unary!(self.client, list_alert_defs, request)
    }
}
