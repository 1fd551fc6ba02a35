use crate::prelude::*;

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub modbus: Modbus,

    #[serde(default)]
    pub retry: Retry,

    pub influx: Influx,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,

    /// Resolve the status label from the previously cached code, as older
    /// releases did. Only useful to keep logs comparable with historical ones.
    #[serde(default)]
    pub status_label_lag: bool,
}

// Modbus {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Modbus {
    pub port: String,

    #[serde(default = "Config::default_slave_address")]
    pub slave_address: u8,

    #[serde(default = "Config::default_baud_rate")]
    pub baud_rate: u32,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "timeout_ms", default = "Config::default_modbus_timeout")]
    pub timeout: Duration,

    /// BCM number of the GPIO driving the RS-485 transceiver's DE/RE line
    pub direction_pin: Option<u8>,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "settle_ms", default = "Config::default_settle")]
    pub settle: Duration,
}
impl Modbus {
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn slave_address(&self) -> u8 {
        self.slave_address
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn direction_pin(&self) -> Option<u8> {
        self.direction_pin
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }
} // }}}

// Retry {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Retry {
    #[serde(default = "Config::default_max_attempts")]
    pub max_attempts: u32,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "delay_ms", default)]
    pub delay: Duration,

    #[serde(default = "Config::default_enabled")]
    pub progress: bool,
}
impl Default for Retry {
    fn default() -> Self {
        Self {
            max_attempts: Config::default_max_attempts(),
            delay: Duration::ZERO,
            progress: Config::default_enabled(),
        }
    }
} // }}}

// Influx {{{
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    Synchronous,
    #[default]
    Asynchronous,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Influx {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub org: String,
    #[serde(default = "Config::default_bucket")]
    pub bucket: String,

    #[serde(default = "Config::default_location")]
    pub location: String,

    #[serde(default)]
    pub mode: WriteMode,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "timeout_ms", default = "Config::default_influx_timeout")]
    pub timeout: Duration,
}
impl Influx {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
} // }}}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        info!("Reading configuration from {}", file);
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("error reading {}: {}", file, err))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        info!("  Modbus:");
        info!("    Port: {}", self.modbus.port);
        info!("    Slave Address: {}", self.modbus.slave_address);
        info!("    Baud Rate: {}", self.modbus.baud_rate);
        info!("    Timeout: {}ms", self.modbus.timeout.as_millis());
        match self.modbus.direction_pin {
            Some(pin) => info!(
                "    Direction Pin: {} (settle {}ms)",
                pin,
                self.modbus.settle.as_millis()
            ),
            None => info!("    Direction Pin: none"),
        }

        info!("  Retry:");
        info!("    Max Attempts: {}", self.retry.max_attempts);
        info!("    Delay: {}ms", self.retry.delay.as_millis());

        info!("  InfluxDB: {}", if self.influx.enabled { "enabled" } else { "disabled" });
        if self.influx.enabled {
            info!("    URL: {}", self.influx.url);
            info!("    Org: {}", self.influx.org);
            info!("    Bucket: {}", self.influx.bucket);
            info!("    Token: {}", if self.influx.token.is_empty() { "(none)" } else { "(redacted)" });
            info!("    Mode: {:?}", self.influx.mode);
        }
        info!("    Location: {}", self.influx.location);

        info!("  Status Label Lag: {}", self.status_label_lag);
        info!("  Log Level: {}", self.loglevel);
    }

    fn validate(&self) -> Result<()> {
        if self.modbus.port.is_empty() {
            bail!("modbus.port cannot be empty");
        }
        if !(1..=247).contains(&self.modbus.slave_address) {
            bail!("modbus.slave_address must be between 1 and 247");
        }
        if self.modbus.baud_rate == 0 {
            bail!("modbus.baud_rate cannot be 0");
        }
        if self.modbus.timeout.is_zero() {
            bail!("modbus.timeout_ms cannot be 0");
        }

        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }

        if self.influx.enabled {
            if let Err(e) = url::Url::parse(&self.influx.url) {
                bail!("Invalid InfluxDB URL: {}", e);
            }
            if self.influx.org.is_empty() {
                bail!("influx.org cannot be empty");
            }
            if self.influx.bucket.is_empty() {
                bail!("influx.bucket cannot be empty");
            }
        }

        Ok(())
    }

    fn default_slave_address() -> u8 {
        1
    }

    fn default_baud_rate() -> u32 {
        9600
    }

    fn default_modbus_timeout() -> Duration {
        Duration::from_millis(200)
    }

    fn default_settle() -> Duration {
        Duration::from_millis(100)
    }

    fn default_max_attempts() -> u32 {
        160
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_bucket() -> String {
        "sun2000".to_string()
    }

    fn default_location() -> String {
        "lt".to_string()
    }

    fn default_influx_timeout() -> Duration {
        Duration::from_secs(5)
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}
