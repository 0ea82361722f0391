//! Programmable state machine abstractions
//!
//! The SPI master runs on a PIO state machine. This module describes the
//! pieces the transfer logic needs from it: which microprogram to load,
//! how the state machine is brought up, and the blocking byte primitives.
//!
//! All primitives shift most-significant-bit first. Any other bit order is
//! handled in software before the data reaches the engine.

use crate::gpio::PinId;
use crate::spi::{Phase, Polarity};

/// PIO instructions issued per SPI clock period
///
/// Both clock-phase programs spend four state machine cycles on each bit.
pub const CYCLES_PER_BIT: u32 = 4;

/// Bits per SPI frame
pub const FRAME_BITS: u8 = 8;

/// The two fixed SPI microprograms, selected by clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockProgram {
    /// Data driven before the first clock edge (CPHA=0)
    Cpha0,
    /// Data driven on the first clock edge (CPHA=1)
    Cpha1,
}

impl From<Phase> for ClockProgram {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::CaptureOnFirstTransition => ClockProgram::Cpha0,
            Phase::CaptureOnSecondTransition => ClockProgram::Cpha1,
        }
    }
}

/// PIO clock divider in 16.8 fixed point
///
/// The state machine runs at `sys_clk / divider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockDivider {
    /// Integer part (1-65535)
    pub int: u16,
    /// Fractional part in 1/256ths
    pub frac: u8,
}

impl ClockDivider {
    /// Slowest possible divider
    pub const MAX: Self = Self {
        int: 0xFFFF,
        frac: 0xFF,
    };

    /// Divider that yields `freq_hz` on the SPI clock
    ///
    /// divider = sys_clk / (freq * CYCLES_PER_BIT)
    ///
    /// A zero frequency gives the maximum divider. Requests faster than the
    /// state machine can go are clamped to a divider of 1.
    pub fn from_frequency(sys_clk_hz: u32, freq_hz: u32) -> Self {
        if freq_hz == 0 {
            return Self::MAX;
        }

        // To get 8-bit fractional precision, multiply by 256 first
        let divisor = freq_hz as u64 * CYCLES_PER_BIT as u64;
        let divider_x256 = (sys_clk_hz as u64 * 256) / divisor;

        let int_part = divider_x256 / 256;
        let frac_part = divider_x256 % 256;

        if int_part == 0 {
            return Self { int: 1, frac: 0 };
        }
        if int_part > 0xFFFF {
            return Self::MAX;
        }

        Self {
            int: int_part as u16,
            frac: frac_part as u8,
        }
    }

    /// Raw 16.8 bits, integer part in bits 23..8
    pub fn to_bits(self) -> u32 {
        ((self.int as u32) << 8) | (self.frac as u32)
    }

    /// SPI clock this divider produces from `sys_clk_hz`
    pub fn spi_frequency(self, sys_clk_hz: u32) -> u32 {
        let bits = self.to_bits() as u64;
        if bits == 0 {
            return 0;
        }
        ((sys_clk_hz as u64 * 256) / (bits * CYCLES_PER_BIT as u64)) as u32
    }
}

/// Everything the state machine needs at bring-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StateMachineConfig {
    /// Clock divider
    pub divider: ClockDivider,
    /// Bits per frame (autopull/autopush threshold)
    pub frame_bits: u8,
    /// Idle level of the clock line
    pub polarity: Polarity,
    /// Clock output
    pub sck: PinId,
    /// Data output
    pub tx: PinId,
    /// Data input
    pub rx: PinId,
}

/// Blocking SPI engine backed by one state machine slot
///
/// An engine owns exactly one state machine. `init_state_machine` claims and
/// starts it, `release` stops it and gives the slot back. The byte
/// primitives block until every frame has been shifted, and must only be
/// called between `init_state_machine` and `release`.
pub trait SpiEngine {
    /// Handle to a program resident in instruction memory
    type Program;

    /// Error from program loading or state machine bring-up
    type Error;

    /// System clock the state machine divides down from
    fn system_clock_hz(&self) -> u32;

    /// Load one of the clock-phase microprograms
    fn load_program(&mut self, program: ClockProgram) -> Result<Self::Program, Self::Error>;

    /// Configure and start the state machine running `program`
    fn init_state_machine(
        &mut self,
        program: &Self::Program,
        config: &StateMachineConfig,
    ) -> Result<(), Self::Error>;

    /// Shift out `src`, discarding whatever comes back
    fn write_blocking(&mut self, src: &[u8]);

    /// Shift in `dst.len()` bytes while clocking out zeros
    fn read_blocking(&mut self, dst: &mut [u8]);

    /// Shift out `src` while shifting into `dst`
    ///
    /// Transfers `min(src.len(), dst.len())` bytes.
    fn write_read_blocking(&mut self, src: &[u8], dst: &mut [u8]);

    /// Stop the state machine and release its slot
    fn release(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_divider() {
        // 125MHz / (1MHz * 4) = 31.25
        let div = ClockDivider::from_frequency(125_000_000, 1_000_000);
        assert_eq!(div.int, 31);
        assert_eq!(div.frac, 64);

        // 125MHz / (25MHz * 4) = 1.25
        let div = ClockDivider::from_frequency(125_000_000, 25_000_000);
        assert_eq!(div.int, 1);
        assert_eq!(div.frac, 64);
    }

    #[test]
    fn test_clock_divider_limits() {
        assert_eq!(ClockDivider::from_frequency(125_000_000, 0), ClockDivider::MAX);

        // Faster than sys_clk / 4 clamps to a divider of 1
        let div = ClockDivider::from_frequency(125_000_000, 100_000_000);
        assert_eq!(div, ClockDivider { int: 1, frac: 0 });

        // 1 Hz needs more than 16 integer bits
        assert_eq!(ClockDivider::from_frequency(125_000_000, 1), ClockDivider::MAX);
    }

    #[test]
    fn test_divider_bits_and_frequency() {
        let div = ClockDivider::from_frequency(125_000_000, 1_000_000);
        assert_eq!(div.to_bits(), (31 << 8) | 64);
        assert_eq!(div.spi_frequency(125_000_000), 1_000_000);
    }

    #[test]
    fn test_program_follows_phase() {
        assert_eq!(
            ClockProgram::from(Phase::CaptureOnFirstTransition),
            ClockProgram::Cpha0
        );
        assert_eq!(
            ClockProgram::from(Phase::CaptureOnSecondTransition),
            ClockProgram::Cpha1
        );
    }
}
