//! Managed Coralogix entities.
//!
//! Each module holds one entity's model, its schema, the transcoders between
//! model and SDK messages, and the [`Resource`](crate::resource::Resource)
//! implementation. Data sources reuse the models and transcoders from here.

pub mod alert;
pub mod archive_metrics;
pub mod archive_retentions;
pub mod custom_role;
pub mod group_attachment;
pub mod view;
pub mod webhook;

pub use alert::AlertResource;
pub use archive_metrics::ArchiveMetricsResource;
pub use archive_retentions::ArchiveRetentionsResource;
pub use custom_role::CustomRoleResource;
pub use group_attachment::GroupAttachmentResource;
pub use view::ViewResource;
pub use webhook::WebhookResource;

use crate::error::ProviderError;

/// Map a not-found error to `None`, keeping every other outcome.
pub(crate) fn found<T>(result: Result<T, ProviderError>) -> Result<Option<T>, ProviderError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
