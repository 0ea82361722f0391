//! RP2040 backend for the PIO SPI master
//!
//! This crate implements the `piospi-hal` traits on top of embassy-rp:
//!
//! - Pin allocation by number for config-driven setup
//! - The two clock-phase SPI programs, in both clock polarities
//! - A blocking [`Rp2040PioSpi`] engine that owns one state machine
//! - Chip select through a plain GPIO

#![no_std]

pub mod gpio;
pub mod pins;
pub mod pio;

pub use pins::{PinBank, PinError};
pub use pio::{EngineError, Rp2040PioSpi};
