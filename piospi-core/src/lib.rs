//! Board-agnostic transfer logic for the PIO SPI master
//!
//! This crate contains everything that does not depend on a specific chip:
//!
//! - Bit-order adaptation (MSB-first hardware, LSB-first callers)
//! - The transfer dispatcher that owns bus configuration and activation
//!   state and picks the fastest hardware path for each request
//! - Bus configuration values and the `bus.toml` parser
//!
//! Hardware is reached only through the `piospi-hal` traits, so the whole
//! crate runs under host tests against fake hardware.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate std;

#[macro_use]
mod log;

pub mod bit_order;
pub mod config;
pub mod dispatcher;
pub mod error;

#[cfg(test)]
mod fake;

pub use bit_order::{adapt, adapt_buffer, adapt_in_place, reverse_bits16, reverse_bits8};
pub use config::{parse_bus_config, BusConfig, ParseError};
pub use dispatcher::{ActivationState, PioSpi};
pub use error::SpiError;
