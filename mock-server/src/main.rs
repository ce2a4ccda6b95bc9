use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mock_server=info")),
        )
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "8529".to_string());
    let collections = std::env::var("COLLECTIONS").unwrap_or_default();
    let collections: Vec<&str> = collections
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, ?collections, "listening");
    mock_server::run_with_collections(listener, &collections).await
}
