//! Error types

/// SPI master errors
///
/// The inherent transfer API is fail-silent; these errors surface through
/// the pin setters and the bus trait implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiError {
    /// Pin assignment changed after the bus was activated
    PinsFrozen,
    /// Transfer requested before `begin_transaction` activated the bus
    NotActive,
}

impl embedded_hal::spi::Error for SpiError {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        embedded_hal::spi::ErrorKind::Other
    }
}
