use crate::registers::Value;

use async_trait::async_trait;

pub const DEVICE: &str = "device";
pub const ELECTRICITY: &str = "electricity";

/// One cycle's worth of fields under a single measurement. Field order is
/// the order in which they were read.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    measurement: &'static str,
    fields: Vec<(String, Value)>,
}

impl Snapshot {
    pub fn new(measurement: &'static str) -> Self {
        Self {
            measurement,
            fields: Vec::new(),
        }
    }

    pub fn measurement(&self) -> &'static str {
        self.measurement
    }

    /// Set `name`, replacing any earlier value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();

        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }
}

/// Destination for snapshots. Delivery is best effort: implementations log
/// and drop on failure rather than returning errors into the poll loop.
#[async_trait]
pub trait MeasurementSink: Send + Sync {
    async fn write(&self, snapshot: &Snapshot);
}
