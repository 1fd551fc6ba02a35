use crate::config;
use crate::error::TransportError;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Sleep;
use tokio_modbus::client::Context as ModbusContext;
use tokio_modbus::prelude::*;

/// Raw register access to the inverter.
#[async_trait]
pub trait Transport: Send {
    async fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError>;
}

/// Half-duplex transceiver direction hook. `begin_transmit` enables the
/// driver, `end_transmit` hands the bus back to the receiver.
pub trait DirectionControl: Send {
    fn begin_transmit(&mut self);
    fn end_transmit(&mut self);
}

struct DirectionState {
    control: Box<dyn DirectionControl>,
    transmitting: bool,
}

/// Shared handle on the direction line. The hooks only fire on an actual
/// change of direction, so `release` may be called any number of times.
#[derive(Clone)]
pub struct DirectionLine {
    state: Arc<Mutex<DirectionState>>,
}

impl DirectionLine {
    pub fn new(control: Box<dyn DirectionControl>) -> Self {
        Self {
            state: Arc::new(Mutex::new(DirectionState {
                control,
                transmitting: false,
            })),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut DirectionState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    pub fn is_transmitting(&self) -> bool {
        self.with_state(|s| s.transmitting)
    }

    /// Switch to transmit. Returns false if already transmitting.
    pub fn transmit(&self) -> bool {
        self.with_state(|s| {
            if s.transmitting {
                return false;
            }
            s.control.begin_transmit();
            s.transmitting = true;
            true
        })
    }

    /// Switch back to receive.
    pub fn release(&self) {
        self.with_state(|s| {
            if s.transmitting {
                s.control.end_transmit();
                s.transmitting = false;
            }
        })
    }
}

impl fmt::Debug for DirectionLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectionLine")
            .field("transmitting", &self.is_transmitting())
            .finish()
    }
}

/// Stream adapter that drives the direction line around each outgoing
/// frame: transmit and settle before the first byte is written, release
/// once the frame is flushed and has had time to leave the UART.
#[derive(Debug)]
pub struct DirectionStream<S> {
    inner: S,
    line: DirectionLine,
    settle: Duration,
    /// On-wire time of one character; zero skips the drain wait.
    char_time: Duration,
    pending: u32,
    settling: Option<Pin<Box<Sleep>>>,
    draining: Option<Pin<Box<Sleep>>>,
}

impl<S> DirectionStream<S> {
    pub fn new(inner: S, line: DirectionLine, settle: Duration) -> Self {
        Self {
            inner,
            line,
            settle,
            char_time: Duration::ZERO,
            pending: 0,
            settling: None,
            draining: None,
        }
    }

    /// Wait for the frame to be shifted out at `baud_rate` (8N1, ten bits
    /// per character) before releasing the line.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.char_time = if baud_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(10.0 / baud_rate as f64)
        };
        self
    }

    fn finish_transmit(&mut self) {
        self.settling = None;
        self.draining = None;
        self.pending = 0;
        self.line.release();
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for DirectionStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for DirectionStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;

        if this.line.transmit() && !this.settle.is_zero() {
            this.settling = Some(Box::pin(tokio::time::sleep(this.settle)));
        }
        if let Some(settle) = this.settling.as_mut() {
            ready!(settle.as_mut().poll(cx));
            this.settling = None;
        }

        match ready!(Pin::new(&mut this.inner).poll_write(cx, buf)) {
            Ok(n) => {
                this.pending = this.pending.saturating_add(n as u32);
                Poll::Ready(Ok(n))
            }
            Err(err) => {
                this.finish_transmit();
                Poll::Ready(Err(err))
            }
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = &mut *self;

        if let Err(err) = ready!(Pin::new(&mut this.inner).poll_flush(cx)) {
            this.finish_transmit();
            return Poll::Ready(Err(err));
        }

        if this.draining.is_none() && this.pending > 0 && !this.char_time.is_zero() {
            let drain = this.char_time * this.pending;
            this.draining = Some(Box::pin(tokio::time::sleep(drain)));
        }
        if let Some(drain) = this.draining.as_mut() {
            ready!(drain.as_mut().poll(cx));
        }

        this.finish_transmit();
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let result = ready!(Pin::new(&mut self.inner).poll_shutdown(cx));
        self.finish_transmit();
        Poll::Ready(result)
    }
}

pub struct ModbusTransport {
    ctx: ModbusContext,
    timeout: Duration,
    direction: Option<DirectionLine>,
}

impl ModbusTransport {
    pub fn open(config: &config::Modbus) -> Result<Self> {
        info!(
            "opening {} at {} baud, slave {}",
            config.port(),
            config.baud_rate(),
            config.slave_address()
        );

        let builder = tokio_serial::new(config.port(), config.baud_rate())
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .data_bits(tokio_serial::DataBits::Eight);

        let serial = tokio_serial::SerialStream::open(&builder)
            .map_err(|e| anyhow!("serial open of {} failed: {}", config.port(), e))?;

        let direction = match config.direction_pin() {
            Some(pin) => Some(gpio::open(pin)?),
            None => None,
        };

        Ok(Self::attach(serial, config, direction))
    }

    /// Run the RTU client over an already open byte stream. With a
    /// direction hook the stream is wrapped so the hook follows each frame.
    pub fn attach<T>(
        stream: T,
        config: &config::Modbus,
        direction: Option<Box<dyn DirectionControl>>,
    ) -> Self
    where
        T: AsyncRead + AsyncWrite + fmt::Debug + Unpin + Send + 'static,
    {
        let slave = Slave(config.slave_address());

        let (ctx, direction) = match direction {
            Some(control) => {
                let line = DirectionLine::new(control);
                let stream = DirectionStream::new(stream, line.clone(), config.settle())
                    .with_baud_rate(config.baud_rate());
                (rtu::attach_slave(stream, slave), Some(line))
            }
            None => (rtu::attach_slave(stream, slave), None),
        };

        Self {
            ctx,
            timeout: config.timeout(),
            direction,
        }
    }
}

#[async_trait]
impl Transport for ModbusTransport {
    async fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        let result = tokio::time::timeout(
            self.timeout,
            self.ctx.read_holding_registers(address, count),
        )
        .await;

        // a timed out or failed request may have stopped mid-frame
        if let Some(line) = &self.direction {
            line.release();
        }

        let words = result
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| match e {
                tokio_modbus::Error::Transport(io) => TransportError::Io(io),
                other => TransportError::Protocol(other.to_string()),
            })?
            .map_err(|code| TransportError::Exception(format!("{:?}", code)))?;

        debug!("read {} @ {} -> {:?}", count, address, words);

        if words.len() != count as usize {
            return Err(TransportError::Protocol(format!(
                "asked for {} registers at {}, got {}",
                count,
                address,
                words.len()
            )));
        }

        Ok(words)
    }
}

#[cfg(feature = "gpio")]
mod gpio {
    use super::DirectionControl;
    use anyhow::{anyhow, Result};
    use rppal::gpio::{Gpio, OutputPin};

    pub struct DirectionPin(OutputPin);

    impl DirectionControl for DirectionPin {
        fn begin_transmit(&mut self) {
            self.0.set_high();
        }

        fn end_transmit(&mut self) {
            self.0.set_low();
        }
    }

    pub fn open(pin: u8) -> Result<Box<dyn DirectionControl>> {
        let pin = Gpio::new()
            .and_then(|gpio| gpio.get(pin))
            .map_err(|e| anyhow!("cannot claim GPIO {}: {}", pin, e))?;

        Ok(Box::new(DirectionPin(pin.into_output_low())))
    }
}

#[cfg(not(feature = "gpio"))]
mod gpio {
    use super::DirectionControl;
    use anyhow::{bail, Result};

    pub fn open(pin: u8) -> Result<Box<dyn DirectionControl>> {
        bail!(
            "direction_pin {} configured but sun2000-logger was built without the gpio feature",
            pin
        )
    }
}
