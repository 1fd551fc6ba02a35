#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use sun2000_logger::error::TransportError;
use sun2000_logger::inverter::Inverter;
use sun2000_logger::registers;
use sun2000_logger::retry::RetryPolicy;
use sun2000_logger::sink::{MeasurementSink, Snapshot};
use sun2000_logger::transport::Transport;

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
struct State {
    registers: HashMap<u16, Vec<u16>>,
    scripts: HashMap<u16, VecDeque<Option<Vec<u16>>>>,
    failing: HashSet<u16>,
    requests: Vec<(u16, u16)>,
}

/// In-memory inverter. Registers hold a steady value unless a script is
/// queued for the address; `None` entries in a script are failed reads.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<State>>,
}

impl ScriptedTransport {
    pub fn set(&self, address: u16, words: &[u16]) {
        self.state
            .lock()
            .unwrap()
            .registers
            .insert(address, words.to_vec());
    }

    pub fn script(&self, address: u16, reads: Vec<Option<Vec<u16>>>) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(address, reads.into());
    }

    pub fn fail(&self, address: u16) {
        self.state.lock().unwrap().failing.insert(address);
    }

    pub fn requests(&self) -> Vec<(u16, u16)> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn reads_of(&self, address: u16) -> usize {
        self.requests().iter().filter(|(a, _)| *a == address).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push((address, count));

        if state.failing.contains(&address) {
            return Err(TransportError::Timeout);
        }

        if let Some(next) = state.scripts.get_mut(&address).and_then(|s| s.pop_front()) {
            return next.ok_or(TransportError::Timeout);
        }

        match state.registers.get(&address) {
            Some(words) if words.len() == count as usize => Ok(words.clone()),
            Some(words) => Err(TransportError::Protocol(format!(
                "{} words at {}, asked for {}",
                words.len(),
                address,
                count
            ))),
            None => Err(TransportError::Exception("IllegalDataAddress".to_string())),
        }
    }
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    written: Arc<Mutex<Vec<Snapshot>>>,
}

impl RecordingSink {
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.written.lock().unwrap().clone()
    }

    pub fn last(&self) -> Snapshot {
        self.snapshots().last().cloned().expect("nothing written")
    }
}

#[async_trait]
impl MeasurementSink for RecordingSink {
    async fn write(&self, snapshot: &Snapshot) {
        self.written.lock().unwrap().push(snapshot.clone());
        // the scripted transport never blocks, so give other tasks a turn
        tokio::task::yield_now().await;
    }
}

pub fn string_words(s: &str, count: usize) -> Vec<u16> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.resize(count * 2, 0);
    bytes
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

pub struct Factory;

impl Factory {
    /// A healthy SUN2000-10KTL with `pv_string_count` strings.
    pub fn transport(pv_string_count: u16) -> ScriptedTransport {
        let t = ScriptedTransport::default();

        t.set(registers::MODEL.address, &string_words("SUN2000-10KTL", 15));
        t.set(registers::MODEL_ID.address, &[428]);
        t.set(registers::PV_STRING_COUNT.address, &[pv_string_count]);

        for index in 1..=pv_string_count {
            // 600.0 V + index, 8.00 A + index/100
            t.set(registers::pv_voltage(index).unwrap().address, &[6000 + index]);
            t.set(registers::pv_current(index).unwrap().address, &[800 + index]);
        }

        t.set(registers::PHASE_A_VOLTAGE.address, &[2301]);
        t.set(registers::PHASE_B_VOLTAGE.address, &[2302]);
        t.set(registers::PHASE_C_VOLTAGE.address, &[2303]);
        t.set(registers::PHASE_A_CURRENT.address, &[14001]);
        t.set(registers::PHASE_B_CURRENT.address, &[14002]);
        t.set(registers::PHASE_C_CURRENT.address, &[14003]);

        t.set(registers::INPUT_POWER.address, &[0x0000, 0x2710]);
        t.set(registers::ACTIVE_POWER.address, &[0x0000, 0x26AC]);
        t.set(registers::REACTIVE_POWER.address, &[0xFFFF, 0xFF38]);
        t.set(registers::POWER_FACTOR.address, &[999]);
        t.set(registers::EFFICIENCY.address, &[9900]);
        t.set(registers::INTERNAL_TEMPERATURE.address, &[452]);
        t.set(registers::DEVICE_STATUS.address, &[0x0200]);

        t
    }

    pub fn inverter(transport: &ScriptedTransport, max_attempts: u32) -> Inverter {
        Inverter::new(Box::new(transport.clone()), RetryPolicy::new(max_attempts))
    }
}
