//! Handshake-gated full-duplex transfer
//!
//! One call moves a whole buffer, one byte per kernel message. Before the
//! first byte the write strobe is raised and the peer must report ready.
//! After every byte the strobe is pulsed low-high and the engine waits for
//! the ready line again:
//!
//! ```text
//! Idle -> StrobeAsserted -> (WaitReady -> SendByte -> Strobe -> WaitReady)* -> Done | Failed
//! ```
//!
//! A failure leaves the bus and the lines exactly where the last completed
//! step put them.

use std::time::{Duration, Instant};

use crate::backend::{GpioPins, SpiBus, SpiMessage};
use crate::clock;
use crate::config::DeviceConfiguration;
use crate::error::{Error, Result};

/// Hold before polling a busy line; the peer may need up to 20 us to raise it
const BUSY_SETTLE_US: u32 = 10;

/// Hold before polling a ready line; the peer may need up to 500 ns to drop it
const READY_SETTLE_US: u32 = 1;

/// Hold after a strobe before the ready line is polled again
pub fn settle_us(invert_ready: bool) -> u32 {
    if invert_ready {
        BUSY_SETTLE_US
    } else {
        READY_SETTLE_US
    }
}

/// Check buffers and work out the stream length
pub fn stream_len(write: Option<&[u8]>, read: Option<&[u8]>) -> Result<usize> {
    match (write, read) {
        (None, None) => Err(Error::NoBuffers),
        (Some(w), Some(r)) if !w.is_empty() && !r.is_empty() && w.len() != r.len() => {
            Err(Error::LengthMismatch {
                write: w.len(),
                read: r.len(),
            })
        }
        (w, r) => Ok(w.map_or(0, <[u8]>::len).max(r.map_or(0, <[u8]>::len))),
    }
}

/// Runs one transfer against an open bus
pub struct TransferEngine<'a, B, G> {
    bus: &'a mut B,
    gpio: &'a G,
    config: &'a DeviceConfiguration,
}

impl<'a, B: SpiBus, G: GpioPins> TransferEngine<'a, B, G> {
    pub fn new(bus: &'a mut B, gpio: &'a G, config: &'a DeviceConfiguration) -> Self {
        Self { bus, gpio, config }
    }

    /// Stream `len` bytes and return the status of the last message
    ///
    /// Positions past the end of a buffer (or any position of a missing
    /// buffer) go to the kernel as null pointers.
    pub fn run(
        &mut self,
        write: Option<&[u8]>,
        mut read: Option<&mut [u8]>,
        len: usize,
    ) -> Result<i32> {
        let wr_pin = self.config.write_pin();
        let settle_us = settle_us(self.config.invert_ready());

        self.gpio.set_high(wr_pin);
        self.wait_ready()?;

        let mut status = 0;
        for index in 0..len {
            let mut msg = SpiMessage {
                tx: write.and_then(|w| w.get(index)),
                rx: read.as_deref_mut().and_then(|r| r.get_mut(index)),
                speed_hz: self.config.max_speed_hz(),
                delay_usecs: self.config.delay_usecs(),
                bits_per_word: self.config.bits_per_word(),
            };
            status = self
                .bus
                .message(&mut msg)
                .map_err(|source| Error::TransferFailed { index, source })?;
            log::trace!("transfer: byte {} tx={:02x?} status={}", index, msg.tx, status);

            if wr_pin != 0 {
                self.gpio.set_low(wr_pin);
                self.gpio.set_high(wr_pin);
            }

            clock::delay_us(settle_us);
            self.wait_ready()?;
        }

        Ok(status)
    }

    /// Spin until the ready pin reports ready
    fn wait_ready(&self) -> Result<()> {
        let pin = self.config.ready_pin();
        let ready = self.config.ready_level();

        match self.config.ready_timeout() {
            None => {
                while self.gpio.is_high(pin) != ready {
                    std::hint::spin_loop();
                }
                Ok(())
            }
            Some(timeout) => self.wait_ready_until(pin, ready, timeout),
        }
    }

    fn wait_ready_until(&self, pin: u32, ready: bool, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while self.gpio.is_high(pin) != ready {
            if Instant::now() >= deadline {
                return Err(Error::ReadyTimeout {
                    pin,
                    level: if ready { "high" } else { "low" },
                    timeout,
                });
            }
            std::hint::spin_loop();
        }
        Ok(())
    }
}
