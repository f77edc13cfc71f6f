use anyhow::Result;
use individuals_api::{config::Config, server, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Initialize tracing and metrics
    let prometheus_handle = telemetry::init(&config.telemetry);

    info!("Starting Individuals API");
    info!("HTTP server listening on {}", config.http_addr());
    info!(
        "Keycloak realm {} at {}",
        config.keycloak.realm, config.keycloak.url
    );

    // Run the server
    let result = server::run(config, prometheus_handle).await;

    telemetry::shutdown();
    result
}
