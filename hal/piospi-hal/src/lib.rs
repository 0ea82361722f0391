//! PIO SPI Hardware Abstraction Layer
//!
//! This crate defines the hardware seams of the PIO SPI master. The
//! transfer logic in `piospi-core` is written against these traits, and
//! chip-specific crates (RP2040) implement them. Host tests implement them
//! with recording fakes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (piospi-firmware, etc.)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  piospi-core (dispatcher, bit order)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  piospi-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │  piospi-hal-  │
//!             │    rp2040     │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::GpioPort`] - Pin-number addressed GPIO control (chip-select)
//! - [`pio::SpiEngine`] - State machine bring-up and blocking byte transfers
//! - [`spi::SpiBus`] - SPI bus operations for device drivers

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod pio;
pub mod spi;

// Re-export key traits at crate root for convenience
pub use gpio::{Direction, GpioPort, Level, PinId};
pub use pio::{ClockDivider, ClockProgram, SpiEngine, StateMachineConfig};
pub use spi::{BitOrder, Mode, Phase, Polarity, SpiBus, SpiPins, SpiSettings};
