//! GPIO abstractions
//!
//! The SPI master addresses its chip-select line by pin number, because
//! pin assignments stay mutable until the bus is first activated.

/// GPIO number on the target chip
pub type PinId = u8;

/// Logic level of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    /// Logic 0
    Low,
    /// Logic 1
    High,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level == Level::High
    }
}

/// Pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Pin is an input
    Input,
    /// Pin drives its level
    Output,
}

/// Pin-number addressed GPIO control
///
/// Implementations should handle the actual hardware register manipulation
/// for the specific chip. Operations are infallible; an implementation that
/// cannot honour a request (pin owned elsewhere) ignores it.
pub trait GpioPort {
    /// Hand the pin to the GPIO function (SIO on the RP2040)
    fn init(&mut self, pin: PinId);

    /// Set the pin direction
    fn set_direction(&mut self, pin: PinId, direction: Direction);

    /// Drive the pin to a level
    fn set_level(&mut self, pin: PinId, level: Level);

    /// Initialise the pin as an output already driven to `level`
    ///
    /// The level is latched before the direction flips so the line never
    /// glitches to the opposite state.
    fn init_output(&mut self, pin: PinId, level: Level) {
        self.init(pin);
        self.set_level(pin, level);
        self.set_direction(pin, Direction::Output);
    }
}
