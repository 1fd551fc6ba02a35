use crate::error::{RetryError, TransportError};
use crate::registers::{self, RegisterSpec, Value};
use crate::retry::{Retrier, RetryPolicy};
use crate::transport::Transport;

use futures::FutureExt;

/// Conversion from a decoded register into the type an accessor hands out.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromValue for u16 {
    fn from_value(value: Value) -> Option<Self> {
        value.as_i64().and_then(|v| u16::try_from(v).ok())
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    A,
    B,
    C,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::A, Phase::B, Phase::C];

    pub fn voltage(&self) -> RegisterSpec {
        match self {
            Phase::A => registers::PHASE_A_VOLTAGE,
            Phase::B => registers::PHASE_B_VOLTAGE,
            Phase::C => registers::PHASE_C_VOLTAGE,
        }
    }

    pub fn current(&self) -> RegisterSpec {
        match self {
            Phase::A => registers::PHASE_A_CURRENT,
            Phase::B => registers::PHASE_B_CURRENT,
            Phase::C => registers::PHASE_C_CURRENT,
        }
    }
}

/// Typed access to the inverter's telemetry registers. Owns the transport;
/// every read goes through the retrier.
pub struct Inverter {
    transport: Box<dyn Transport>,
    retrier: Retrier,
}

impl Inverter {
    pub fn new(transport: Box<dyn Transport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            retrier: Retrier::new(policy),
        }
    }

    pub fn retrier(&self) -> &Retrier {
        &self.retrier
    }

    async fn read_as<T>(&mut self, spec: RegisterSpec) -> Result<T, RetryError>
    where
        T: FromValue + Send + 'static,
    {
        self.retrier
            .call(self.transport.as_mut(), move |transport| {
                async move {
                    let words = transport
                        .read_holding_registers(spec.address, spec.count())
                        .await?;
                    let value = spec.decode(&words)?;

                    T::from_value(value).ok_or_else(|| {
                        TransportError::Protocol(format!("{}: unexpected value type", spec.name))
                    })
                }
                .boxed()
            })
            .await
    }

    pub async fn model(&mut self) -> Result<String, RetryError> {
        self.read_as(registers::MODEL).await
    }

    pub async fn model_id(&mut self) -> Result<u16, RetryError> {
        self.read_as(registers::MODEL_ID).await
    }

    pub async fn pv_string_count(&mut self) -> Result<u16, RetryError> {
        self.read_as(registers::PV_STRING_COUNT).await
    }

    /// `index` counts from 1.
    pub async fn pv_voltage(&mut self, index: u16) -> Result<f64, RetryError> {
        self.read_as(pv_register(registers::pv_voltage(index), index)?)
            .await
    }

    /// `index` counts from 1.
    pub async fn pv_current(&mut self, index: u16) -> Result<f64, RetryError> {
        self.read_as(pv_register(registers::pv_current(index), index)?)
            .await
    }

    pub async fn phase_voltage(&mut self, phase: Phase) -> Result<f64, RetryError> {
        self.read_as(phase.voltage()).await
    }

    pub async fn phase_current(&mut self, phase: Phase) -> Result<f64, RetryError> {
        self.read_as(phase.current()).await
    }

    pub async fn input_power(&mut self) -> Result<i64, RetryError> {
        self.read_as(registers::INPUT_POWER).await
    }

    pub async fn active_power(&mut self) -> Result<i64, RetryError> {
        self.read_as(registers::ACTIVE_POWER).await
    }

    pub async fn reactive_power(&mut self) -> Result<i64, RetryError> {
        self.read_as(registers::REACTIVE_POWER).await
    }

    pub async fn power_factor(&mut self) -> Result<f64, RetryError> {
        self.read_as(registers::POWER_FACTOR).await
    }

    pub async fn efficiency(&mut self) -> Result<f64, RetryError> {
        self.read_as(registers::EFFICIENCY).await
    }

    pub async fn internal_temperature(&mut self) -> Result<f64, RetryError> {
        self.read_as(registers::INTERNAL_TEMPERATURE).await
    }

    pub async fn device_status_code(&mut self) -> Result<u16, RetryError> {
        self.read_as(registers::DEVICE_STATUS).await
    }
}

fn pv_register(spec: Option<RegisterSpec>, index: u16) -> Result<RegisterSpec, RetryError> {
    spec.ok_or_else(|| RetryError::NotAttempted {
        reason: TransportError::Protocol(format!(
            "PV string {} is outside the register map",
            index
        )),
    })
}
