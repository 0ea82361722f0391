//! PIO SPI demo firmware
//!
//! Brings up the bus described in `bus.toml` on PIO0 and polls the JEDEC ID
//! of a SPI NOR flash wired to it.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::{InterruptHandler, Pio};
use {defmt_rtt as _, panic_probe as _};

use piospi_core::{parse_bus_config, BusConfig, PioSpi};
use piospi_hal_rp2040::{pin_bank, Rp2040PioSpi};

mod tasks;

/// Embedded bus configuration (compiled into firmware)
/// Edit bus.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../bus.toml");

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => InterruptHandler<PIO0>;
});

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("PIO SPI firmware starting...");

    let p = embassy_rp::init(Default::default());

    // build.rs has already checked the file, this only fails on a stale build
    let config = match parse_bus_config(EMBEDDED_CONFIG) {
        Ok(config) => config,
        Err(e) => {
            warn!("bus.toml rejected ({}), using defaults", e);
            BusConfig::default()
        }
    };
    info!(
        "SPI bus: sck=GPIO{} tx=GPIO{} rx=GPIO{} cs=GPIO{} {} Hz {}",
        config.pins.sck,
        config.pins.tx,
        config.pins.rx,
        config.pins.cs,
        config.settings.frequency,
        config.settings.mode
    );

    // Every GPIO goes into the bank; the bus claims its four on first use
    let bank = pin_bank!(p, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29);

    let pio = Pio::new(p.PIO0, Irqs);
    let engine = Rp2040PioSpi::new(pio.common, pio.sm0, bank);

    let mut spi = PioSpi::from_config(engine, &config);
    spi.begin();

    // The state machine only starts with the first transaction
    spi.begin_transaction();
    spi.end_transaction();
    if !spi.is_active() || !spi.hardware().is_running() {
        error!("SPI bus failed to start");
        return;
    }
    info!("SPI bus active, divider {}", spi.divider());

    spawner.spawn(tasks::flash_id_task(spi)).unwrap();
}
