//! Terraform provider for Coralogix.
//!
//! Coralogix configuration entities (alerts, webhooks, custom roles, group
//! membership, archive settings and saved views) are exposed as resources and
//! data sources. Each handler transcodes between its Terraform model and the
//! Coralogix management API messages, which travel over gRPC.
//!
//! # Layout
//!
//! - [`server`]: the plugin host protocol, the [`ProviderService`] trait and
//!   [`serve`], which prints the handshake and runs until SIGTERM or SIGINT
//! - [`provider`]: [`CoralogixProvider`], the registry of handlers
//! - [`resource`]: the typed [`resource::Resource`] and
//!   [`resource::DataSource`] traits and their JSON-erased forms
//! - [`resources`] and [`data_sources`]: one module per entity
//! - [`clients`]: one trait per Coralogix service, with gRPC implementations
//!   sharing a single authenticated TLS channel
//! - [`schema`], [`validation`] and [`plan`]: schema description, config
//!   validation and plan computation
//! - [`transcode`]: helpers shared by every model/message conversion
//! - [`testing`]: an in-memory Coralogix and a harness for driving the
//!   provider without a host
//!
//! # Handshake Protocol
//!
//! Once listening, the provider prints a single line to stdout:
//!
//! ```text
//! CORALOGIX_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `CORALOGIX_PROVIDER|<protocol_version>|<address>`. Logs go to
//! stderr so they never interfere with it.
//!
//! # Quick Start
//!
//! ```ignore
//! use terraform_provider_coralogix::{init_logging, serve, CoralogixProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     init_logging();
//!     serve(CoralogixProvider::new()).await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clients;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod resources;
pub mod schema;
pub mod sdk;
pub mod server;
pub mod testing;
pub mod transcode;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::CoralogixProvider;
pub use schema::ProviderSchema;
pub use server::{serve, serve_with_options, serve_with_shutdown, ProviderService, ServeOptions};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ReadResult, ServerCapabilities, TfValue,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::validate;

pub use async_trait::async_trait;
pub use serde_json;
pub use tonic;
pub use tracing;
