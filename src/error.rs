use thiserror::Error;

/// A single failed exchange with the inverter.
///
/// Every variant is transient from the point of view of the poller: it is
/// counted, retried, and never turned into a field value.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("timed out waiting for response")]
    Timeout,
    #[error("serial i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("modbus exception: {0}")]
    Exception(String),
    #[error("malformed response: {0}")]
    Protocol(String),
}

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("gave up after {attempts} attempts, last error: {last}")]
    Exhausted { attempts: u32, last: TransportError },
    #[error("not attempted: {reason}")]
    NotAttempted { reason: TransportError },
}

impl RetryError {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::NotAttempted { .. } => 0,
        }
    }

    pub fn last_error(&self) -> &TransportError {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::NotAttempted { reason } => reason,
        }
    }
}
