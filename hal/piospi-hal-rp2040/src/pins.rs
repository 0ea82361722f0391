//! Pin allocation by number
//!
//! SPI pins come from `bus.toml` as plain GPIO numbers, and the engine only
//! learns which ones it needs when the bus is first brought up. A
//! [`PinBank`] holds the pins a board hands over and gives them out by
//! number.

use embassy_rp::gpio::AnyPin;
use embassy_rp::Peri;
use piospi_hal::PinId;

/// Number of user GPIOs
pub const NUM_PINS: usize = 30;

/// Take a pin by number from peripherals
///
/// Usage:
/// ```ignore
/// let sck = take_pin!(p, 10); // Takes p.PIN_10 as Peri<AnyPin>
/// ```
#[macro_export]
macro_rules! take_pin {
    ($p:expr, 0) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_0) };
    ($p:expr, 1) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_1) };
    ($p:expr, 2) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_2) };
    ($p:expr, 3) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_3) };
    ($p:expr, 4) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_4) };
    ($p:expr, 5) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_5) };
    ($p:expr, 6) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_6) };
    ($p:expr, 7) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_7) };
    ($p:expr, 8) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_8) };
    ($p:expr, 9) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_9) };
    ($p:expr, 10) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_10) };
    ($p:expr, 11) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_11) };
    ($p:expr, 12) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_12) };
    ($p:expr, 13) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_13) };
    ($p:expr, 14) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_14) };
    ($p:expr, 15) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_15) };
    ($p:expr, 16) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_16) };
    ($p:expr, 17) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_17) };
    ($p:expr, 18) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_18) };
    ($p:expr, 19) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_19) };
    ($p:expr, 20) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_20) };
    ($p:expr, 21) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_21) };
    ($p:expr, 22) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_22) };
    ($p:expr, 23) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_23) };
    ($p:expr, 24) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_24) };
    ($p:expr, 25) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_25) };
    ($p:expr, 26) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_26) };
    ($p:expr, 27) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_27) };
    ($p:expr, 28) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_28) };
    ($p:expr, 29) => { embassy_rp::Peri::<embassy_rp::gpio::AnyPin>::from($p.PIN_29) };
}

/// Build a [`PinBank`] from the listed pin numbers
///
/// Usage:
/// ```ignore
/// let bank = pin_bank!(p, 10, 11, 12, 13);
/// ```
#[macro_export]
macro_rules! pin_bank {
    ($p:expr, $($n:tt),+ $(,)?) => {{
        let mut bank = $crate::pins::PinBank::new();
        $( bank.insert($n, $crate::take_pin!($p, $n)); )+
        bank
    }};
}

/// Error when requesting a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinError {
    /// Pin number out of range (0-29 valid)
    InvalidPin,
    /// Pin was never handed to the bank, or is already in use
    AlreadyTaken,
}

/// GPIO pins available to the SPI engine, looked up by number
pub struct PinBank {
    pins: [Option<Peri<'static, AnyPin>>; NUM_PINS],
}

impl PinBank {
    /// Create an empty bank
    pub const fn new() -> Self {
        Self {
            pins: [const { None }; NUM_PINS],
        }
    }

    /// Hand a pin to the bank
    ///
    /// Out-of-range numbers are ignored.
    pub fn insert(&mut self, pin_num: PinId, pin: Peri<'static, AnyPin>) {
        if let Some(slot) = self.pins.get_mut(pin_num as usize) {
            *slot = Some(pin);
        }
    }

    /// Take a pin by number
    pub fn take(&mut self, pin_num: PinId) -> Result<Peri<'static, AnyPin>, PinError> {
        self.pins
            .get_mut(pin_num as usize)
            .ok_or(PinError::InvalidPin)?
            .take()
            .ok_or(PinError::AlreadyTaken)
    }

    /// Check if a pin is available
    pub fn is_available(&self, pin_num: PinId) -> bool {
        self.pins
            .get(pin_num as usize)
            .is_some_and(|slot| slot.is_some())
    }

    /// Return a pin to the bank
    pub fn return_pin(&mut self, pin_num: PinId, pin: Peri<'static, AnyPin>) {
        self.insert(pin_num, pin);
    }
}

impl Default for PinBank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bank() {
        let mut bank = PinBank::new();
        assert!(!bank.is_available(10));
        assert!(matches!(bank.take(10), Err(PinError::AlreadyTaken)));
    }

    #[test]
    fn test_out_of_range_pin() {
        let mut bank = PinBank::default();
        assert!(!bank.is_available(30));
        assert!(matches!(bank.take(30), Err(PinError::InvalidPin)));
    }
}
