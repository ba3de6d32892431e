//! Clients for the Coralogix management API.
//!
//! Every backend service sits behind a trait taking and returning the SDK
//! messages. [`ClientSet`] bundles one implementation of each; the gRPC ones
//! share a single lazily-connected TLS channel that carries the API key on
//! every request. Tests swap in the in-memory backend from
//! [`crate::testing::FakeCoralogix`].

use std::sync::Arc;
use std::time::Duration;

use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::info;

use crate::config::ProviderConfig;
use crate::error::ProviderError;

/// Issue a unary call on a generated client and unwrap the response.
macro_rules! unary {
    ($client:expr, $method:ident, $request:expr) => {{
        tracing::debug!(rpc = stringify!($method), "Calling Coralogix API");
        $client
            .clone()
            .$method($request)
            .await
            .map(tonic::Response::into_inner)
    }};
}
pub(crate) use unary;

// RPC path constants and trait methods mirror the service definitions one to one.
#[allow(missing_docs)]
pub mod alerts;
#[allow(missing_docs)]
pub mod archive_retentions;
#[allow(missing_docs)]
pub mod groups;
#[allow(missing_docs)]
pub mod metrics_archive;
#[allow(missing_docs)]
pub mod roles;
#[allow(missing_docs)]
pub mod views;
#[allow(missing_docs)]
pub mod webhooks;

pub use alerts::AlertsApi;
pub use archive_retentions::ArchiveRetentionsApi;
pub use groups::GroupsApi;
pub use metrics_archive::MetricsArchiveApi;
pub use roles::RolesApi;
pub use views::ViewsApi;
pub use webhooks::WebhooksApi;

/// The channel type every generated client runs over.
pub type AuthChannel = InterceptedService<Channel, ApiKeyInterceptor>;

/// Adds `authorization: Bearer <api key>` to every request.
#[derive(Clone)]
pub struct ApiKeyInterceptor {
    header: MetadataValue<Ascii>,
}

impl ApiKeyInterceptor {
    /// Build the interceptor, rejecting keys that cannot be sent as a header.
    pub fn new(api_key: &str) -> Result<Self, ProviderError> {
        let header = format!("Bearer {}", api_key).parse().map_err(|_| {
            ProviderError::Configuration(
                "api_key contains characters that are not valid in a request header".to_string(),
            )
        })?;
        Ok(Self { header })
    }
}

impl Interceptor for ApiKeyInterceptor {
    fn call(&mut self, mut request: tonic::Request<()>) -> Result<tonic::Request<()>, tonic::Status> {
        request
            .metadata_mut()
            .insert("authorization", self.header.clone());
        Ok(request)
    }
}

/// One client per Coralogix service.
#[derive(Clone)]
pub struct ClientSet {
    /// Alert definitions.
    pub alerts: Arc<dyn AlertsApi>,
    /// Outgoing webhooks.
    pub webhooks: Arc<dyn WebhooksApi>,
    /// Custom roles.
    pub roles: Arc<dyn RolesApi>,
    /// Team group membership.
    pub groups: Arc<dyn GroupsApi>,
    /// Logs archive retentions.
    pub archive_retentions: Arc<dyn ArchiveRetentionsApi>,
    /// Metrics archive tenant configuration.
    pub metrics_archive: Arc<dyn MetricsArchiveApi>,
    /// Saved views.
    pub views: Arc<dyn ViewsApi>,
}

impl ClientSet {
    /// Build gRPC clients for the configured domain.
    ///
    /// The channel connects lazily on the first call, so this never touches
    /// the network. Must be called from within a Tokio runtime.
    pub fn connect(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let endpoint = build_endpoint(config.endpoint(), config.connect_timeout, config.request_timeout)?;
        let channel = endpoint.connect_lazy();
        let interceptor = ApiKeyInterceptor::new(&config.api_key)?;
        info!(endpoint = %config.endpoint(), "Coralogix clients configured");

        let auth = || InterceptedService::new(channel.clone(), interceptor.clone());
        Ok(Self {
            alerts: Arc::new(alerts::GrpcAlerts::new(auth())),
            webhooks: Arc::new(webhooks::GrpcWebhooks::new(auth())),
            roles: Arc::new(roles::GrpcRoles::new(auth())),
            groups: Arc::new(groups::GrpcGroups::new(auth())),
            archive_retentions: Arc::new(archive_retentions::GrpcArchiveRetentions::new(auth())),
            metrics_archive: Arc::new(metrics_archive::GrpcMetricsArchive::new(auth())),
            views: Arc::new(views::GrpcViews::new(auth())),
        })
    }
}

/// Build a TLS endpoint with timeouts and keepalive settings.
fn build_endpoint(
    uri: String,
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<Endpoint, ProviderError> {
    let endpoint = Endpoint::from_shared(uri)?
        .tls_config(ClientTlsConfig::new().with_webpki_roots())?
        .user_agent(format!(
            "terraform-provider-coralogix/{}",
            env!("CARGO_PKG_VERSION")
        ))?
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .tcp_keepalive(Some(Duration::from_secs(30)))
        .http2_keep_alive_interval(Duration::from_secs(30))
        .keep_alive_timeout(Duration::from_secs(10));

    Ok(endpoint)
}
