use comanda_server::{Config, Server, ServerState, setup_environment};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Environment first: dotenv, work directory, logging
    setup_environment()?;

    tracing::info!("Comanda server starting...");

    let config = Config::from_env();
    let state = ServerState::initialize(&config).await?;

    // Server::run spawns the background tasks itself
    let server = Server::with_state(config, state);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {e}");
        return Err(e.into());
    }

    Ok(())
}
