//! Saved views service.

use async_trait::async_trait;
use tonic::Status;

use super::{unary, AuthChannel};
use crate::sdk::views::views_service_client::ViewsServiceClient;
use crate::sdk::views::{
    CreateViewRequest, CreateViewResponse, DeleteViewRequest, DeleteViewResponse, GetViewRequest,
    GetViewResponse, ListViewsRequest, ListViewsResponse, ReplaceViewRequest, ReplaceViewResponse,
};

/// Full method path of `CreateView`.
pub const CREATE_VIEW: &str = "/coralogix.views.v1.ViewsService/CreateView";
/// Full method path of `GetView`.
pub const GET_VIEW: &str = "/coralogix.views.v1.ViewsService/GetView";
/// Full method path of `ReplaceView`.
pub const REPLACE_VIEW: &str = "/coralogix.views.v1.ViewsService/ReplaceView";
/// Full method path of `DeleteView`.
pub const DELETE_VIEW: &str = "/coralogix.views.v1.ViewsService/DeleteView";
/// Full method path of `ListViews`.
pub const LIST_VIEWS: &str = "/coralogix.views.v1.ViewsService/ListViews";

/// Operations on saved views.
#[async_trait]
pub trait ViewsApi: Send + Sync {
    /// Call `CreateView`.
    async fn create(&self, request: CreateViewRequest) -> Result<CreateViewResponse, Status>;
    /// Call `GetView`.
    async fn get(&self, request: GetViewRequest) -> Result<GetViewResponse, Status>;
    /// Call `ReplaceView`.
    async fn replace(&self, request: ReplaceViewRequest) -> Result<ReplaceViewResponse, Status>;
    /// Call `DeleteView`.
    async fn delete(&self, request: DeleteViewRequest) -> Result<DeleteViewResponse, Status>;
    /// Call `ListViews`.
    async fn list(&self, request: ListViewsRequest) -> Result<ListViewsResponse, Status>;
}

/// [`ViewsApi`] over gRPC.
pub struct GrpcViews {
    client: ViewsServiceClient<AuthChannel>,
}

impl GrpcViews {
    /// A client over the authenticated channel.
    pub fn new(channel: AuthChannel) -> Self {
        Self {
            client: ViewsServiceClient::new(channel),
        }
    }
}

#[async_trait]
impl ViewsApi for GrpcViews {
    async fn create(&self, request: CreateViewRequest) -> Result<CreateViewResponse, Status> {
        unary!(self.client, create_view, request)
    }

    async fn get(&self, request: GetViewRequest) -> Result<GetViewResponse, Status> {
        unary!(self.client, get_view, request)
    }

    async fn replace(&self, request: ReplaceViewRequest) -> Result<ReplaceViewResponse, Status> {
        unary!(self.client, replace_view, request)
    }

    async fn delete(&self, request: DeleteViewRequest) -> Result<DeleteViewResponse, Status> {
        unary!(self.client, delete_view, request)
    }

    async fn list(&self, request: ListViewsRequest) -> Result<ListViewsResponse, Status> {
        unary!(self.client, list_views, request)
    }
}
