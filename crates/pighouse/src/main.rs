use pighouse::{PighouseError, PighouseServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), PighouseError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env();
    let server = PighouseServer::builder().config(config).build().await?;
    match server.local_addr() {
        Ok(addr) => tracing::info!(%addr, "listening"),
        Err(e) => tracing::warn!(error = %e, "could not read local address"),
    }
    server.run().await
}
