use gridplay::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), GridplayError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let server = GameServerBuilder::<TicTacToe>::from_config(config).build();
    let transport = server.bind_websocket().await?;
    if let Ok(addr) = transport.local_addr() {
        tracing::info!(%addr, path = %server.config().path, "listening");
    }

    server.start();
    tokio::select! {
        result = server.run(transport) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
    }
    server.stop();
    Ok(())
}
