use mock_server::ServerConfig;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let mut config = ServerConfig::default();
    if let Some(max) = std::env::var("MAX_PER_PAGE").ok().and_then(|v| v.parse().ok()) {
        config = config.with_max_per_page(max);
    }
    if let Ok(token) = std::env::var("API_TOKEN") {
        config = config.with_token(&token);
    }

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("listening on {addr}");
    mock_server::run_with(listener, config).await
}
