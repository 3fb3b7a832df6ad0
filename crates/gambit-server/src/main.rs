//! Gambit relay server entry point

use clap::Parser;
use tracing::{error, info};

use gambit_server::cli::{Cli, Commands};
use gambit_server::{Result, ServerAppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.command() == Commands::ExampleConfig {
        println!("{}", ServerAppConfig::example_config());
        return Ok(());
    }

    let config = ServerAppConfig::load(cli.config.as_deref(), &cli.overrides())?;
    setup_logging(&config);

    info!(
        bind = %config.server.bind_address,
        ttl_secs = config.relay.rooms.ttl_secs,
        "Starting Gambit relay"
    );

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for ctrl-c");
        }
    };

    if let Err(err) = gambit_server::run(config, shutdown).await {
        error!("Server failed: {}", err);
        std::process::exit(1);
    }

    info!("Gambit relay exited");
    Ok(())
}

/// Setup logging from the configured level
fn setup_logging(config: &ServerAppConfig) {
    let log_level = config
        .logging
        .max_level()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
