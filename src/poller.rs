use crate::prelude::*;
use crate::inverter::{Inverter, Phase};
use crate::registers::{self, Value};
use crate::sink::{self, MeasurementSink, Snapshot};
use crate::status::{status_label, INVALID_STATUS};

use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub model_id: u16,
    pub model: String,
    pub pv_string_count: u16,
}

/// Last value seen for a field, used to log only on change.
#[derive(Clone, Debug)]
pub struct Tracked<T> {
    value: Option<T>,
}

impl<T> Default for Tracked<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T: PartialEq> Tracked<T> {
    /// Store `new`, returning true if it differs from what was held before.
    pub fn update(&mut self, new: T) -> bool {
        if self.value.as_ref() == Some(&new) {
            return false;
        }
        self.value = Some(new);
        true
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

/// Drives the inverter: identity once, then one electricity snapshot per
/// cycle for as long as it runs.
pub struct Poller {
    inverter: Inverter,
    sink: Arc<dyn MeasurementSink>,
    status_label_lag: bool,
    identity: Option<DeviceIdentity>,
    status: Tracked<u16>,
    status_label: &'static str,
    temperature: Tracked<f64>,
}

impl Poller {
    pub fn new(inverter: Inverter, sink: Arc<dyn MeasurementSink>, status_label_lag: bool) -> Self {
        Self {
            inverter,
            sink,
            status_label_lag,
            identity: None,
            status: Tracked::default(),
            status_label: INVALID_STATUS,
            temperature: Tracked::default(),
        }
    }

    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    /// Read the identity registers and publish them. Any of them failing
    /// for good is fatal.
    pub async fn startup(&mut self) -> Result<DeviceIdentity> {
        info!("Initialising...");

        let model_id = self
            .inverter
            .model_id()
            .await
            .context("reading model id")?;
        info!("Model ID: {}", model_id);

        let model = self.inverter.model().await.context("reading model")?;
        info!("Model: {}", model);

        let pv_string_count = self
            .inverter
            .pv_string_count()
            .await
            .context("reading PV string count")?;
        info!("PV String count: {}", pv_string_count);
        if pv_string_count > registers::MAX_PV_STRINGS {
            bail!(
                "inverter reports {} PV strings, at most {} are mapped",
                pv_string_count,
                registers::MAX_PV_STRINGS
            );
        }

        let mut snapshot = Snapshot::new(sink::DEVICE);
        snapshot.insert("model_id", model_id);
        snapshot.insert("model", model.as_str());
        snapshot.insert("pv_string_count", pv_string_count);
        self.sink.write(&snapshot).await;

        let identity = DeviceIdentity {
            model_id,
            model,
            pv_string_count,
        };
        self.identity = Some(identity.clone());

        Ok(identity)
    }

    /// One sweep over the per-cycle registers. A register that cannot be
    /// read is left out of the snapshot; the snapshot is still written.
    pub async fn poll_once(&mut self) -> Result<Snapshot> {
        let pv_string_count = match &self.identity {
            Some(identity) => identity.pv_string_count,
            None => bail!("poll_once called before startup"),
        };

        let status_code = self.inverter.device_status_code().await;
        let temperature = self.inverter.internal_temperature().await;

        if let Ok(code) = status_code {
            let previous = self.status.get().copied();
            if self.status.update(code) {
                self.status_label = if self.status_label_lag {
                    previous.map(status_label).unwrap_or(INVALID_STATUS)
                } else {
                    status_label(code)
                };
                info!("Device status: {}", describe_status(code, self.status_label));
            }
        }

        if let Ok(temperature) = temperature {
            if self.temperature.update(temperature) {
                info!("Device temperature: {}", temperature);
            }
        }

        let mut snapshot = Snapshot::new(sink::ELECTRICITY);

        for n in 0..pv_string_count {
            let voltage = self.inverter.pv_voltage(n + 1).await;
            record(&mut snapshot, format!("pv{}_voltage", n), voltage);
            let current = self.inverter.pv_current(n + 1).await;
            record(&mut snapshot, format!("pv{}_current", n), current);
        }

        let mut voltages = Vec::with_capacity(Phase::ALL.len());
        for phase in Phase::ALL {
            voltages.push(self.inverter.phase_voltage(phase).await);
        }
        let mut currents = Vec::with_capacity(Phase::ALL.len());
        for phase in Phase::ALL {
            currents.push(self.inverter.phase_current(phase).await);
        }

        let input_power = self.inverter.input_power().await;
        let active_power = self.inverter.active_power().await;
        let reactive_power = self.inverter.reactive_power().await;
        let power_factor = self.inverter.power_factor().await;
        let efficiency = self.inverter.efficiency().await;

        for ((phase, voltage), current) in Phase::ALL.iter().zip(voltages).zip(currents) {
            record(&mut snapshot, phase.voltage().name, voltage);
            record(&mut snapshot, phase.current().name, current);
        }

        record(&mut snapshot, "input_power", input_power);
        record(&mut snapshot, "active_power", active_power);
        record(&mut snapshot, "reactive_power", reactive_power);
        record(&mut snapshot, "power_factor", power_factor);
        record(&mut snapshot, "efficiency", efficiency);

        if let Some(temperature) = self.temperature.get() {
            snapshot.insert("internal_temp", *temperature);
        }
        if let Some(code) = self.status.get() {
            snapshot.insert("status_code", *code);
            snapshot.insert("status_string", self.status_label);
        }

        self.sink.write(&snapshot).await;

        Ok(snapshot)
    }

    /// Startup followed by back-to-back cycles until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("shutdown requested during startup");
                return Ok(());
            }
            identity = self.startup() => {
                identity?;
            }
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                result = self.poll_once() => {
                    result?;
                }
            }
        }

        let stats = self.inverter.retrier().stats();
        info!(
            "poller stopped after {} reads, {} failed ({}%)",
            stats.total,
            stats.errors,
            stats.error_rate()
        );

        Ok(())
    }
}

/// Status as logged on change: raw code then label.
fn describe_status(code: u16, label: &str) -> String {
    format!("{} {}", code, label)
}

fn record<V, E>(snapshot: &mut Snapshot, name: impl Into<String>, value: std::result::Result<V, E>)
where
    V: Into<Value>,
    E: std::fmt::Display,
{
    let name = name.into();
    match value {
        Ok(value) => snapshot.insert(name, value),
        Err(err) => warn!("{} missing from this cycle: {}", name, err),
    }
}
