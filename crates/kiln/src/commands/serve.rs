//! Development server command.

use anyhow::Result;
use kiln_server::{DevServer, DevServerConfig};
use kiln_tasks::{Config, TaskContext};

/// Build, then serve the build tree and rebuild on change until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    let ctx = TaskContext::from_config(&config)?;
    let server_config = DevServerConfig::from(&config.server);

    tracing::info!(
        "Starting development server on {}:{}",
        server_config.host,
        server_config.port
    );

    DevServer::new(server_config, ctx).start().await?;

    Ok(())
}
