use clap::Parser;

/// SUN2000 logger - polls a Huawei inverter over Modbus RTU into InfluxDB
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    /// Override the configured log level (trace, debug, info, warn, error)
    #[clap(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}
