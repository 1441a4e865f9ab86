//! BCM283x GPIO register layout
//!
//! [`BcmGpio`] implements [`GpioPins`] over any [`RegisterBlock`], so the
//! same pin logic drives the real `/dev/mem` window and the simulated
//! register file used in tests.
//!
//! Register map (32-bit word offsets from the GPIO base):
//!
//! | Word  | Register    | Use                                  |
//! |-------|-------------|--------------------------------------|
//! | 0-5   | GPFSEL0-5   | 3-bit function select, 10 pins/word  |
//! | 7-8   | GPSET0-1    | write 1 to drive a pin high          |
//! | 10-11 | GPCLR0-1    | write 1 to drive a pin low           |
//! | 13-14 | GPLEV0-1    | current pin levels                   |
//! | 37    | GPPUD       | pull-up/down select                  |
//! | 38-39 | GPPUDCLK0-1 | pull-up/down clock                   |

use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::GpioPins;
use crate::clock;

/// Register word offsets
pub mod regs {
    /// First function select register
    pub const GPFSEL0: usize = 0;
    /// First output set register
    pub const GPSET0: usize = 7;
    /// First output clear register
    pub const GPCLR0: usize = 10;
    /// First level register
    pub const GPLEV0: usize = 13;
    /// Pull-up/down select
    pub const GPPUD: usize = 37;
    /// First pull-up/down clock register
    pub const GPPUDCLK0: usize = 38;
    /// Number of words a register block must cover
    pub const BLOCK_WORDS: usize = 41;
}

/// Number of GPIO lines on the BCM2835/6/7
pub const GPIO_COUNT: u32 = 54;

/// Hold time around the pull clock strobe, in microseconds
const PULL_SETTLE_US: u32 = 5;

/// Function select value for an input
const FSEL_INPUT: u32 = 0b000;
/// Function select value for an output
const FSEL_OUTPUT: u32 = 0b001;
const FSEL_MASK: u32 = 0b111;

/// Pull resistor selection, as written to GPPUD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pull {
    Down = 1,
}

/// 32-bit register window
///
/// Implementations must perform every access as a volatile read or write.
pub trait RegisterBlock {
    /// Read the register at word offset `word`
    fn read(&self, word: usize) -> u32;

    /// Write the register at word offset `word`
    fn write(&self, word: usize, value: u32);
}

impl<R: RegisterBlock + ?Sized> RegisterBlock for &R {
    fn read(&self, word: usize) -> u32 {
        (**self).read(word)
    }

    fn write(&self, word: usize, value: u32) {
        (**self).write(word, value)
    }
}

impl<R: RegisterBlock + ?Sized> RegisterBlock for Arc<R> {
    fn read(&self, word: usize) -> u32 {
        (**self).read(word)
    }

    fn write(&self, word: usize, value: u32) {
        (**self).write(word, value)
    }
}

/// Word offset and shift of a pin's function select field
#[inline]
pub fn fsel_position(pin: u32) -> (usize, u32) {
    (regs::GPFSEL0 + (pin / 10) as usize, (pin % 10) * 3)
}

/// Bank index and bit mask of a pin in the 32-pin-wide registers
#[inline]
pub fn bank_bit(pin: u32) -> (usize, u32) {
    ((pin / 32) as usize, 1 << (pin % 32))
}

/// GPIO controller over a BCM register block
///
/// Read-modify-write sequences (function select, pull programming) hold an
/// internal lock. Single writes to GPSET/GPCLR and reads of GPLEV do not,
/// those registers only affect the bits written.
pub struct BcmGpio<R> {
    regs: R,
    lock: Mutex<()>,
}

impl<R: RegisterBlock> BcmGpio<R> {
    /// Wrap a register block
    pub fn new(regs: R) -> Self {
        Self {
            regs,
            lock: Mutex::new(()),
        }
    }

    /// Underlying register block
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Current 3-bit function select value of `pin`
    pub fn function(&self, pin: u32) -> u32 {
        let (word, shift) = fsel_position(pin);
        (self.regs.read(word) >> shift) & FSEL_MASK
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded data is `()`, a poisoned lock has nothing to repair
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<R: RegisterBlock> GpioPins for BcmGpio<R> {
    fn set_input(&self, pin: u32) {
        let _guard = self.guard();
        let (word, shift) = fsel_position(pin);
        let value = self.regs.read(word) & !(FSEL_MASK << shift);
        self.regs.write(word, value | (FSEL_INPUT << shift));
    }

    fn set_output(&self, pin: u32) {
        let _guard = self.guard();
        let (word, shift) = fsel_position(pin);
        let value = self.regs.read(word);
        self.regs.write(word, value | (FSEL_OUTPUT << shift));
    }

    #[inline]
    fn set_high(&self, pin: u32) {
        let (bank, bit) = bank_bit(pin);
        self.regs.write(regs::GPSET0 + bank, bit);
    }

    #[inline]
    fn set_low(&self, pin: u32) {
        let (bank, bit) = bank_bit(pin);
        self.regs.write(regs::GPCLR0 + bank, bit);
    }

    #[inline]
    fn is_high(&self, pin: u32) -> bool {
        let (bank, bit) = bank_bit(pin);
        self.regs.read(regs::GPLEV0 + bank) & bit != 0
    }

    fn pull(&self, pin: u32, pull: Pull) {
        let _guard = self.guard();
        let (bank, bit) = bank_bit(pin);
        self.regs.write(regs::GPPUD, pull as u32);
        clock::delay_us(PULL_SETTLE_US);
        self.regs.write(regs::GPPUDCLK0 + bank, bit);
        clock::delay_us(PULL_SETTLE_US);
        self.regs.write(regs::GPPUD, 0);
        self.regs.write(regs::GPPUDCLK0 + bank, 0);
    }
}

/// Plain in-memory register file with no side effects
///
/// Useful for checking the encoding of register writes.
#[derive(Debug)]
pub struct MemoryRegisters {
    words: Vec<std::sync::atomic::AtomicU32>,
}

impl MemoryRegisters {
    pub fn new() -> Self {
        Self {
            words: (0..regs::BLOCK_WORDS)
                .map(|_| std::sync::atomic::AtomicU32::new(0))
                .collect(),
        }
    }
}

impl Default for MemoryRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBlock for MemoryRegisters {
    fn read(&self, word: usize) -> u32 {
        self.words[word].load(std::sync::atomic::Ordering::SeqCst)
    }

    fn write(&self, word: usize, value: u32) {
        self.words[word].store(value, std::sync::atomic::Ordering::SeqCst)
    }
}
