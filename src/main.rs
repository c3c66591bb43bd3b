//! UDP Ping Server - Entry Point

use log::{error, info};
use std::process::ExitCode;
use std::sync::Arc;

use udp_pinger::error::{error_to_exit_code, handle_error};
use udp_pinger::utils::logging::setup_logging;
use udp_pinger::utils::signal::shutdown_signal;
use udp_pinger::{PingerConfig, PingerError, Server};

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();

    info!("Launching ping server...");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            handle_error(&e);
            ExitCode::from(error_to_exit_code(&e))
        }
    }
}

async fn run() -> Result<(), PingerError> {
    let config = PingerConfig::load()?;
    let server = Arc::new(Server::bind(&config).await?);

    let signal_server = Arc::clone(&server);
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(()) => signal_server.stop().await,
            Err(e) => error!("Failed to install signal handlers: {}", e),
        }
    });

    server.start().await
}
