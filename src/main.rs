use wca_mcp_server::{build_app, config::Config, logging, wca_client::WcaClient, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    logging::init_logging(&config.log_level);

    let bind_socket = config.bind_socket()?;
    let state = AppState::new(
        config.api_token.clone(),
        config.server_name.clone(),
        WcaClient::from_config(&config),
    );
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        api_base_url = %config.api_base_url,
        api_timeout_secs = config.api_timeout_secs,
        cache_ttl_secs = config.cache_ttl_secs,
        cache_max_size = config.cache_max_size,
        auth_enabled = config.api_token.is_some(),
        "server starting"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
