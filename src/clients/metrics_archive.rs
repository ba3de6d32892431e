//! Metrics archive tenant configuration service.

use async_trait::async_trait;
use tonic::Status;

use super::{unary, AuthChannel};
use crate::sdk::metrics_archive::metrics_archive_service_client::MetricsArchiveServiceClient;
use crate::sdk::metrics_archive::{
    ConfigureTenantRequest, ConfigureTenantResponse, GetTenantConfigRequest,
    GetTenantConfigResponse, UpdateTenantRequest, UpdateTenantResponse,
};

/// Full method path of `GetTenantConfig`.
pub const GET_TENANT_CONFIG: &str = "/coralogix.metrics_archive.v1.MetricsArchiveService/GetTenantConfig";
/// Full method path of `ConfigureTenant`.
pub const CONFIGURE_TENANT: &str = "/coralogix.metrics_archive.v1.MetricsArchiveService/ConfigureTenant";
/// Full method path of `UpdateTenant`.
pub const UPDATE_TENANT: &str = "/coralogix.metrics_archive.v1.MetricsArchiveService/UpdateTenant";

/// Operations on the account's metrics archive configuration.
#[async_trait]
pub trait MetricsArchiveApi: Send + Sync {
    /// Call `GetTenantConfig`.
    async fn get(&self, request: GetTenantConfigRequest) -> Result<GetTenantConfigResponse, Status>;
    /// Call `ConfigureTenant`.
    async fn configure(&self, request: ConfigureTenantRequest) -> Result<ConfigureTenantResponse, Status>;
    /// Call `UpdateTenant`.
    async fn update(&self, request: UpdateTenantRequest) -> Result<UpdateTenantResponse, Status>;
}

/// [`MetricsArchiveApi`] over gRPC.
pub struct GrpcMetricsArchive {
    client: MetricsArchiveServiceClient<AuthChannel>,
}

impl GrpcMetricsArchive {
    /// A client over the authenticated channel.
    pub fn new(channel: AuthChannel) -> Self {
        Self {
            client: MetricsArchiveServiceClient::new(channel),
        }
    }
}

#[async_trait]
impl MetricsArchiveApi for GrpcMetricsArchive {
    async fn get(&self, request: GetTenantConfigRequest) -> Result<GetTenantConfigResponse, Status> {
        unary!(self.client, get_tenant_config, request)
    }

    async fn configure(&self, request: ConfigureTenantRequest) -> Result<ConfigureTenantResponse, Status> {
        unary!(self.client, configure_tenant, request)
    }

    async fn update(&self, request: UpdateTenantRequest) -> Result<UpdateTenantResponse, Status> {
        unary!(self.client, update_tenant, request)
    }
}
