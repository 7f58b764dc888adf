//! slirc-bot - prints every event from one IRC server until interrupted.

use anyhow::Context;
use slirc_client::{logging, Client, Config};
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "slirc-client.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var("SLIRC_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path))?;
    logging::init(config.debug.enabled);

    info!(
        server = %config.server.hostname,
        port = config.server.port,
        nick = %config.server.nick,
        "Starting slirc-bot"
    );

    let client = Client::new(config)?;
    client.set_callback(|event| println!("{}", event));

    let runner = {
        let client = client.clone();
        tokio::spawn(async move { client.run().await })
    };

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, quitting");
    client.quit(Some("Goodbye"));

    match runner.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "client stopped with an error"),
        Err(e) => error!(error = %e, "client task panicked"),
    }
    Ok(())
}
