//! Coralogix management API, compiled from `proto/coralogix/*.proto`.
//!
//! Only client stubs are generated. Handlers never use these clients directly;
//! they go through the service traits in [`crate::clients`].

#![allow(missing_docs)]
#![allow(clippy::all)]

pub mod alerts {
    tonic::include_proto!("coralogix.alerts.v3");
}

pub mod webhooks {
    tonic::include_proto!("coralogix.webhooks.v1");
}

pub mod roles {
    tonic::include_proto!("coralogix.roles.v2");
}

pub mod groups {
    tonic::include_proto!("coralogix.permissions.v1");
}

pub mod archive_retentions {
    tonic::include_proto!("coralogix.archive.retentions.v1");
}

pub mod metrics_archive {
    tonic::include_proto!("coralogix.metrics_archive.v1");
}

pub mod views {
    tonic::include_proto!("coralogix.views.v1");
}
