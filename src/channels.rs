use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct Channels {
    pub to_influx: broadcast::Sender<crate::influx::ChannelData>,
    pub shutdown: broadcast::Sender<()>,
}

impl Default for Channels {
    fn default() -> Self {
        Self::new()
    }
}

impl Channels {
    pub fn new() -> Self {
        Self {
            to_influx: Self::channel(),
            shutdown: Self::channel(),
        }
    }

    fn channel<T: Clone>() -> broadcast::Sender<T> {
        broadcast::channel(2048).0
    }
}
