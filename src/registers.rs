//! Register catalogue of the SUN2000 telemetry points and the rules for
//! turning raw holding register words into values.

use crate::error::TransportError;
use std::fmt;

/// How the words of a register are interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeKind {
    /// Integer spanning `word_count` words, optionally scaled by decimals.
    Register,
    /// Wide (two or more words) integer.
    Long,
    /// Two characters per word, NUL padded.
    String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterSpec {
    pub name: &'static str,
    pub address: u16,
    pub word_count: u8,
    pub signed: bool,
    /// Decimal places; the raw integer is divided by `10^decimals`.
    pub decimals: u8,
    pub kind: DecodeKind,
}

impl RegisterSpec {
    pub const fn register(name: &'static str, address: u16, decimals: u8, signed: bool) -> Self {
        Self {
            name,
            address,
            word_count: 1,
            signed,
            decimals,
            kind: DecodeKind::Register,
        }
    }

    pub const fn long(name: &'static str, address: u16, signed: bool) -> Self {
        Self {
            name,
            address,
            word_count: 2,
            signed,
            decimals: 0,
            kind: DecodeKind::Long,
        }
    }

    pub const fn string(name: &'static str, address: u16, word_count: u8) -> Self {
        Self {
            name,
            address,
            word_count,
            signed: false,
            decimals: 0,
            kind: DecodeKind::String,
        }
    }

    pub const fn with_width(mut self, word_count: u8) -> Self {
        self.word_count = word_count;
        self
    }

    pub fn count(&self) -> u16 {
        self.word_count as u16
    }

    pub fn decode(&self, words: &[u16]) -> Result<Value, TransportError> {
        if words.len() != self.word_count as usize {
            return Err(TransportError::Protocol(format!(
                "{}: expected {} registers, got {}",
                self.name,
                self.word_count,
                words.len()
            )));
        }

        match self.kind {
            DecodeKind::String => Ok(Value::Text(decode_string(words))),
            DecodeKind::Register | DecodeKind::Long => {
                let raw = combine_words(words, self.signed);
                if self.decimals == 0 {
                    Ok(Value::Integer(raw))
                } else {
                    Ok(Value::Float(raw as f64 / 10f64.powi(self.decimals as i32)))
                }
            }
        }
    }
}

/// Big-endian word order; two's complement over the full width when signed.
fn combine_words(words: &[u16], signed: bool) -> i64 {
    let bits = 16 * words.len() as u32;
    let raw = words
        .iter()
        .fold(0u64, |acc, word| (acc << 16) | u64::from(*word));

    if signed && bits < 64 && raw & (1 << (bits - 1)) != 0 {
        raw as i64 - (1i64 << bits)
    } else {
        raw as i64
    }
}

fn decode_string(words: &[u16]) -> String {
    let text: String = words
        .iter()
        .flat_map(|word| word.to_be_bytes())
        .map(char::from)
        .collect();

    text.trim_end_matches('\0').to_string()
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

// {{{ catalogue
pub const MODEL: RegisterSpec = RegisterSpec::string("model", 30000, 15);
pub const MODEL_ID: RegisterSpec = RegisterSpec::register("model_id", 30070, 0, false);
pub const PV_STRING_COUNT: RegisterSpec =
    RegisterSpec::register("pv_string_count", 30071, 0, false);

pub const PV_VOLTAGE_BASE: u16 = 32014;
pub const PV_CURRENT_BASE: u16 = 32015;
/// PV string registers stop short of `INPUT_POWER`.
pub const MAX_PV_STRINGS: u16 = 24;

pub const INPUT_POWER: RegisterSpec = RegisterSpec::long("input_power", 32064, true);
pub const PHASE_A_VOLTAGE: RegisterSpec =
    RegisterSpec::register("phase_a_voltage", 32069, 1, false);
pub const PHASE_B_VOLTAGE: RegisterSpec =
    RegisterSpec::register("phase_b_voltage", 32070, 1, false);
pub const PHASE_C_VOLTAGE: RegisterSpec =
    RegisterSpec::register("phase_c_voltage", 32071, 1, false);
pub const PHASE_A_CURRENT: RegisterSpec =
    RegisterSpec::register("phase_a_current", 32072, 3, true);
pub const PHASE_B_CURRENT: RegisterSpec =
    RegisterSpec::register("phase_b_current", 32074, 3, true);
pub const PHASE_C_CURRENT: RegisterSpec =
    RegisterSpec::register("phase_c_current", 32076, 3, true);
pub const ACTIVE_POWER: RegisterSpec = RegisterSpec::long("active_power", 32080, true);
pub const REACTIVE_POWER: RegisterSpec = RegisterSpec::long("reactive_power", 32082, true);
pub const POWER_FACTOR: RegisterSpec = RegisterSpec::register("power_factor", 32084, 3, true);
pub const EFFICIENCY: RegisterSpec = RegisterSpec::register("efficiency", 32086, 2, false);
pub const INTERNAL_TEMPERATURE: RegisterSpec =
    RegisterSpec::register("internal_temp", 32087, 1, true);
pub const DEVICE_STATUS: RegisterSpec = RegisterSpec::register("status_code", 32089, 0, false);

/// Voltage register of PV string `index`, counting from 1. `None` outside
/// `1..=MAX_PV_STRINGS`.
pub fn pv_voltage(index: u16) -> Option<RegisterSpec> {
    pv_address(PV_VOLTAGE_BASE, index).map(|a| RegisterSpec::register("pv_voltage", a, 1, true))
}

/// Current register of PV string `index`, counting from 1. `None` outside
/// `1..=MAX_PV_STRINGS`.
pub fn pv_current(index: u16) -> Option<RegisterSpec> {
    pv_address(PV_CURRENT_BASE, index).map(|a| RegisterSpec::register("pv_current", a, 2, true))
}

fn pv_address(base: u16, index: u16) -> Option<u16> {
    if !(1..=MAX_PV_STRINGS).contains(&index) {
        return None;
    }
    base.checked_add(2 * index)
}
// }}}
