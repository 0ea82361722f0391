//! SPI bus abstractions
//!
//! Provides the SPI bus trait used by device drivers, plus the plain value
//! types that describe how a bus is clocked and framed.

use crate::gpio::PinId;

/// SPI bus master
///
/// Provides basic SPI transfer operations for communicating with
/// peripheral devices.
pub trait SpiBus {
    /// Error type for SPI operations
    type Error;

    /// Transfer data (simultaneous read/write)
    ///
    /// Writes data from `write` buffer while reading into `read` buffer.
    /// When the lengths differ, the longer buffer finishes on its own:
    /// extra reads clock out zeros, extra writes discard what comes back.
    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error>;

    /// Write data without reading
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Read data (writes zeros)
    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Transfer data in place
    ///
    /// Writes data from buffer while reading into the same buffer.
    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error>;
}

/// Per-transaction SPI settings
///
/// Mirrors the settings object handed to a transaction: clock rate, data
/// mode and bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpiSettings {
    /// Clock frequency in Hz
    pub frequency: u32,
    /// Clock polarity and phase
    pub mode: Mode,
    /// Order of bits on the wire as seen by the caller
    pub bit_order: BitOrder,
}

impl Default for SpiSettings {
    fn default() -> Self {
        Self {
            frequency: 4_000_000, // 4 MHz
            mode: Mode::Mode0,
            bit_order: BitOrder::MsbFirst,
        }
    }
}

impl SpiSettings {
    /// Create settings from their parts
    pub const fn new(frequency: u32, mode: Mode, bit_order: BitOrder) -> Self {
        Self {
            frequency,
            mode,
            bit_order,
        }
    }
}

/// Pin assignment of an SPI master
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpiPins {
    /// Data out (MOSI)
    pub tx: PinId,
    /// Data in (MISO)
    pub rx: PinId,
    /// Serial clock
    pub sck: PinId,
    /// Chip select, active low
    pub cs: PinId,
}

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

impl Polarity {
    /// Build from the CPOL flag
    pub fn from_cpol(cpol: bool) -> Self {
        if cpol {
            Polarity::IdleHigh
        } else {
            Polarity::IdleLow
        }
    }

    /// The CPOL flag
    pub fn cpol(self) -> bool {
        self == Polarity::IdleHigh
    }
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

impl Phase {
    /// Build from the CPHA flag
    pub fn from_cpha(cpha: bool) -> Self {
        if cpha {
            Phase::CaptureOnSecondTransition
        } else {
            Phase::CaptureOnFirstTransition
        }
    }

    /// The CPHA flag
    pub fn cpha(self) -> bool {
        self == Phase::CaptureOnSecondTransition
    }
}

/// SPI mode (combined polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl Mode {
    /// Mode from its conventional number (0-3)
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Mode::Mode0),
            1 => Some(Mode::Mode1),
            2 => Some(Mode::Mode2),
            3 => Some(Mode::Mode3),
            _ => None,
        }
    }

    /// Mode from separate polarity and phase
    pub fn from_parts(polarity: Polarity, phase: Phase) -> Self {
        match (polarity, phase) {
            (Polarity::IdleLow, Phase::CaptureOnFirstTransition) => Mode::Mode0,
            (Polarity::IdleLow, Phase::CaptureOnSecondTransition) => Mode::Mode1,
            (Polarity::IdleHigh, Phase::CaptureOnFirstTransition) => Mode::Mode2,
            (Polarity::IdleHigh, Phase::CaptureOnSecondTransition) => Mode::Mode3,
        }
    }

    /// Clock polarity of this mode
    pub fn polarity(self) -> Polarity {
        <(Polarity, Phase)>::from(self).0
    }

    /// Clock phase of this mode
    pub fn phase(self) -> Phase {
        <(Polarity, Phase)>::from(self).1
    }
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
            Mode::Mode1 => (Polarity::IdleLow, Phase::CaptureOnSecondTransition),
            Mode::Mode2 => (Polarity::IdleHigh, Phase::CaptureOnFirstTransition),
            Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
        }
    }
}

/// Order in which the bits of a frame are shifted onto the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BitOrder {
    /// Most significant bit first (the PIO program's native order)
    #[default]
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip_through_parts() {
        for index in 0..4 {
            let mode = Mode::from_index(index).unwrap();
            assert_eq!(Mode::from_parts(mode.polarity(), mode.phase()), mode);
        }
        assert_eq!(Mode::from_index(4), None);
    }

    #[test]
    fn test_mode_flags() {
        assert!(!Mode::Mode0.polarity().cpol());
        assert!(!Mode::Mode0.phase().cpha());
        assert!(Mode::Mode1.phase().cpha());
        assert!(Mode::Mode2.polarity().cpol());
        assert!(Mode::Mode3.polarity().cpol() && Mode::Mode3.phase().cpha());
    }

    #[test]
    fn test_default_settings() {
        let settings = SpiSettings::default();
        assert_eq!(settings.mode, Mode::Mode0);
        assert_eq!(settings.bit_order, BitOrder::MsbFirst);
    }
}
