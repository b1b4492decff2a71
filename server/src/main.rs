use std::sync::Arc;

use clap::Parser;
use strassen::WorkStealingScheduler;
use strassen_server::{Server, ServerConfig};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::parse();
    config.validate()?;
    tracing::info!(?config, "starting strassen-server");

    let scheduler = Arc::new(WorkStealingScheduler::new(config.workers)?);
    let server = Server::new(&config, scheduler)?;

    let listener = TcpListener::bind(config.bind).await?;
    server
        .serve_with_shutdown(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
