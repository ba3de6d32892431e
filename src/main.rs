use terraform_provider_coralogix::{init_logging, serve, CoralogixProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Coralogix provider");
    serve(CoralogixProvider::new()).await
}
