//! Simulated BCM GPIO register file
//!
//! Writes to GPSET/GPCLR update the level register the way the output
//! drivers would. A peer model holds the ready pin at its ready level and
//! can report busy for a number of polls after every strobe.

use std::sync::{Mutex, MutexGuard};

use rdyspi_core::gpio::{bank_bit, regs};
use rdyspi_core::RegisterBlock;

#[derive(Debug, Default)]
struct Peer {
    ready_pin: u32,
    ready_level: bool,
    busy_polls: u32,
    busy_remaining: u32,
}

#[derive(Debug)]
struct State {
    words: [u32; regs::BLOCK_WORDS],
    writes: Vec<(usize, u32)>,
    record_writes: bool,
    strobes: usize,
    peer: Option<Peer>,
}

/// In-memory register block with output and peer emulation
#[derive(Debug)]
pub struct SimRegisters {
    state: Mutex<State>,
}

impl Default for SimRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRegisters {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                words: [0; regs::BLOCK_WORDS],
                writes: Vec::new(),
                record_writes: true,
                strobes: 0,
                peer: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Attach a peer that drives `pin` to `ready_level` when ready
    pub fn attach_peer(&self, pin: u32, ready_level: bool) {
        self.state().peer = Some(Peer {
            ready_pin: pin,
            ready_level,
            ..Default::default()
        });
    }

    /// Report busy for `polls` level reads after every strobe
    pub fn set_busy_polls(&self, polls: u32) {
        if let Some(peer) = self.state().peer.as_mut() {
            peer.busy_polls = polls;
        }
    }

    /// Turn the write log on or off; levels and strobes are still tracked
    pub fn set_recording(&self, on: bool) {
        let mut state = self.state();
        state.record_writes = on;
        if !on {
            state.writes = Vec::new();
        }
    }

    /// Every register write so far, in order
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.state().writes.clone()
    }

    /// Number of strobe pulses (writes to a clear register)
    pub fn strobes(&self) -> usize {
        self.state().strobes
    }

    /// Raw register value, without peer effects
    pub fn peek(&self, word: usize) -> u32 {
        self.state().words[word]
    }
}

impl RegisterBlock for SimRegisters {
    fn read(&self, word: usize) -> u32 {
        let mut state = self.state();
        let mut value = state.words[word];

        if let Some(peer) = state.peer.as_mut() {
            let (bank, bit) = bank_bit(peer.ready_pin);
            if word == regs::GPLEV0 + bank {
                let level = if peer.busy_remaining > 0 {
                    peer.busy_remaining -= 1;
                    !peer.ready_level
                } else {
                    peer.ready_level
                };
                value = if level { value | bit } else { value & !bit };
            }
        }
        value
    }

    fn write(&self, word: usize, value: u32) {
        let mut state = self.state();
        if state.record_writes {
            state.writes.push((word, value));
        }
        match word {
            w if w == regs::GPSET0 || w == regs::GPSET0 + 1 => {
                state.words[regs::GPLEV0 + (w - regs::GPSET0)] |= value;
            }
            w if w == regs::GPCLR0 || w == regs::GPCLR0 + 1 => {
                state.words[regs::GPLEV0 + (w - regs::GPCLR0)] &= !value;
                state.strobes += 1;
                if let Some(peer) = state.peer.as_mut() {
                    peer.busy_remaining = peer.busy_polls;
                }
            }
            w => state.words[w] = value,
        }
    }
}
