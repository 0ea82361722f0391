//! Chip-select GPIO
//!
//! Chip select is an ordinary GPIO driven from software, never by the
//! state machine. Pins are claimed from the bank on `init` and kept as
//! `Flex` so their direction can change later.

use embassy_rp::gpio::{Flex, Level as RpLevel};
use embassy_rp::pio::Instance;
use piospi_hal::{Direction, GpioPort, Level, PinId};

use crate::pio::Rp2040PioSpi;

fn to_rp_level(level: Level) -> RpLevel {
    match level {
        Level::Low => RpLevel::Low,
        Level::High => RpLevel::High,
    }
}

impl<'d, PIO: Instance, const SM: usize> Rp2040PioSpi<'d, PIO, SM> {
    fn output_mut(&mut self, pin: PinId) -> Option<&mut Flex<'d>> {
        self.outputs
            .iter_mut()
            .find(|(id, _)| *id == pin)
            .map(|(_, flex)| flex)
    }
}

impl<'d, PIO: Instance, const SM: usize> GpioPort for Rp2040PioSpi<'d, PIO, SM> {
    fn init(&mut self, pin: PinId) {
        if self.output_mut(pin).is_some() {
            return;
        }

        match self.bank.take(pin) {
            Ok(peri) => {
                if self.outputs.push((pin, Flex::new(peri))).is_err() {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("No room for GPIO{}", pin);
                }
            }
            Err(_err) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Cannot claim GPIO{}: {}", pin, _err);
            }
        }
    }

    fn set_direction(&mut self, pin: PinId, direction: Direction) {
        if let Some(flex) = self.output_mut(pin) {
            match direction {
                Direction::Output => flex.set_as_output(),
                Direction::Input => flex.set_as_input(),
            }
        }
    }

    fn set_level(&mut self, pin: PinId, level: Level) {
        if let Some(flex) = self.output_mut(pin) {
            flex.set_level(to_rp_level(level));
        }
    }
}
