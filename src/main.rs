use sun2000_logger::prelude::*;
use sun2000_logger::options::Options;

#[tokio::main]
async fn main() {
    let options = Options::new();

    let config = match Config::new(options.config_file.clone()) {
        Ok(config) => config,
        Err(err) => {
            sun2000_logger::init_logging("info");
            error!("Failed to load config: {:?}", err);
            std::process::exit(255);
        }
    };

    sun2000_logger::init_logging(options.log_level.as_deref().unwrap_or(&config.loglevel));

    info!(
        "sun2000-logger {} starting with config file: {}",
        sun2000_logger::CARGO_PKG_VERSION,
        options.config_file
    );

    let channels = Channels::new();

    // Handle Ctrl+C
    let shutdown_tx = channels.shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        if let Err(e) = shutdown_tx.send(()) {
            error!("Failed to send shutdown signal: {}", e);
        }
    });

    if let Err(err) = sun2000_logger::app(channels, config).await {
        error!("Error: {:#}", err);
        std::process::exit(1);
    }

    info!("Application shutdown complete");
}
