// Module declarations for the application's core components
pub mod channels;  // Inter-component communication channels
pub mod config;    // Configuration management
pub mod error;     // Transport and retry error types
pub mod influx;    // InfluxDB integration
pub mod inverter;  // Typed access to the inverter's registers
pub mod options;   // Command line options parsing
pub mod poller;    // Startup and steady-state poll cycle
pub mod prelude;   // Common imports and types
pub mod registers; // Register catalogue and decoding
pub mod retry;     // Bounded retry around transport reads
pub mod sink;      // Snapshot type and sink trait
pub mod status;    // Device status code labels
pub mod transport; // Modbus RTU transport

// Get the package version from Cargo.toml
pub const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::influx::Influx;
use crate::inverter::Inverter;
use crate::poller::Poller;
use crate::prelude::*;
use crate::retry::RetryPolicy;
use crate::transport::ModbusTransport;
use std::sync::Arc;

/// Initialise env_logger with the bridge's line format. `RUST_LOG` wins
/// over `level` when set.
pub fn init_logging(level: &str) {
    let result = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init();

    if let Err(e) = result {
        error!("Failed to initialise logging: {}", e);
    }
}

/// Main application entry point
///
/// Opens the serial link and the InfluxDB sink, then polls until a shutdown
/// is broadcast on `channels.shutdown`. An error is returned only when
/// startup fails; steady-state read failures are absorbed by the poller.
pub async fn app(channels: Channels, config: Config) -> Result<()> {
    let shutdown_rx = channels.shutdown.subscribe();

    config.log_summary();

    info!("Initializing components...");

    info!("  Creating InfluxDB client...");
    let influx = Influx::new(config.influx.clone(), channels.clone())?;
    let sender_handle = influx.start();

    info!("  Opening Modbus transport...");
    let result = match ModbusTransport::open(&config.modbus) {
        Ok(transport) => {
            let inverter = Inverter::new(Box::new(transport), RetryPolicy::from(&config.retry));
            let poller = Poller::new(inverter, Arc::new(influx.clone()), config.status_label_lag);

            poller.run(shutdown_rx).await
        }
        Err(e) => Err(e),
    };

    info!("Stopping components...");
    influx.stop();
    if let Some(handle) = sender_handle {
        if let Err(e) = handle.await {
            error!("Error waiting for InfluxDB sender task: {}", e);
        }
    }
    influx.log_summary();

    result
}
