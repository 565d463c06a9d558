use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use anc_notify_service::{
    api::{AppState, run_api_server},
    clients::{
        auth::{QontakAuthenticator, SharedAccessToken},
        cursor::RedisCursorStore,
        database::DatabaseClient,
        health::HealthChecker,
        qontak::QontakClient,
    },
    config::Config,
    pipeline::{PipelineSettings, engine::NotificationPipeline},
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load()?;

    let token = SharedAccessToken::new();

    // A failed authentication is not fatal: the service stays up, the health
    // endpoint reports it, and broadcasts come back Rejected until a restart
    // obtains a token.
    let authenticator = QontakAuthenticator::new(&config, token.clone())?;
    if let Err(e) = authenticator.authenticate().await {
        warn!(error = %e, "Provider authentication failed at startup");
    }

    let database = Arc::new(DatabaseClient::connect(&config).await?);
    let cursors = Arc::new(RedisCursorStore::connect(&config).await?);
    let qontak = Arc::new(QontakClient::from_config(&config, token.clone())?);

    let pipeline = NotificationPipeline::new(
        database.clone(),
        cursors,
        database,
        qontak,
        PipelineSettings::from_config(&config),
    );

    let health_checker = HealthChecker::new(config.clone(), token);
    let state = Arc::new(AppState::new(pipeline, health_checker));

    run_api_server(config.server_port, state)
        .await
        .map_err(|e| anyhow!("API server failed: {}", e))?;

    Ok(())
}
