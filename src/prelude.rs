pub use crate::channels::Channels;
pub use crate::config::{self, Config};
pub use crate::error::{RetryError, TransportError};

pub use anyhow::{anyhow, bail, Context, Error, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::io::Write;
pub use std::str::FromStr;
pub use tokio::sync::broadcast;
