//! Build script for proto compilation.
//!
//! Two sets of protos are compiled into `OUT_DIR`:
//!
//! - `proto/provider.proto`: the plugin host protocol, server side only.
//! - `proto/coralogix/*.proto`: the Coralogix management API, client side only.
//!
//! Requires `protoc` on the build host.

const SDK_PROTOS: &[&str] = &[
    "proto/coralogix/alerts.proto",
    "proto/coralogix/webhooks.proto",
    "proto/coralogix/roles.proto",
    "proto/coralogix/groups.proto",
    "proto/coralogix/archive_retentions.proto",
    "proto/coralogix/metrics_archive.proto",
    "proto/coralogix/views.proto",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto");

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(false)
        .compile_protos(&["proto/provider.proto"], &["proto"])?;

    tonic_prost_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_protos(SDK_PROTOS, &["proto"])?;

    Ok(())
}
