//! Message service entry point: runs the relay accept loop.

use message_service::{Config, MessageService, serve};
use squeak_common::init_tracing;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.tracing);

    info!("Starting Message Service");
    let service = MessageService::from_config(&config).await?;
    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Message Service listening");

    serve(
        listener,
        service.relay(),
        service.verifier(),
        config.server.clone(),
        shutdown_signal(),
    )
    .await;

    info!("Message Service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
