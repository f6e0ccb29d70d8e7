use tracing_subscriber::EnvFilter;
use zkp_visa_backend::config::{Config, ConfigError};
use zkp_visa_backend::errors::ApiError;
use zkp_visa_backend::state::AppState;
use zkp_visa_backend::{api, db};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = Config::from_env().map_err(startup_config_error)?;

    // Store local state under backend/data (ignored by git).
    std::fs::create_dir_all(&config.data_dir).map_err(|_| ApiError::Internal)?;

    let db = db::connect(&config.database_url()).await?;
    db::init_schema(&db).await?;

    let state = AppState::from_config(db, &config).map_err(startup_config_error)?;

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .map_err(|_| ApiError::Internal)?;

    tracing::info!(addr = %config.addr, issuer = config.issuer_mode.as_str(), "backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|_| ApiError::Internal)?;

    Ok(())
}

fn startup_config_error(e: ConfigError) -> ApiError {
    tracing::error!(error = %e, "invalid configuration");
    ApiError::Internal
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutting down");
    }
}
