//! Flash identification task
//!
//! Reads the JEDEC ID of a SPI NOR flash once a second. Each read is one
//! complete transaction: command byte out, three ID bytes back.

use defmt::*;
use embassy_rp::peripherals::PIO0;
use embassy_time::{Duration, Ticker};
use piospi_core::PioSpi;
use piospi_hal_rp2040::Rp2040PioSpi;

/// Bus type owned by the task
pub type FlashBus = PioSpi<Rp2040PioSpi<'static, PIO0, 0>>;

/// JEDEC "read identification" command
pub const CMD_READ_JEDEC_ID: u8 = 0x9F;

/// Poll interval in milliseconds
pub const POLL_INTERVAL_MS: u64 = 1000;

/// Flash ID task - logs the JEDEC ID at a fixed interval
#[embassy_executor::task]
pub async fn flash_id_task(mut spi: FlashBus) {
    info!("Flash ID task started");

    let mut ticker = Ticker::every(Duration::from_millis(POLL_INTERVAL_MS));
    let mut last = None;

    loop {
        let id = read_jedec_id(&mut spi);

        // Floating or shorted MISO reads back all zeros or all ones
        if id == [0x00; 3] || id == [0xFF; 3] {
            warn!("No flash responding");
        } else if last != Some(id) {
            info!(
                "JEDEC ID: manufacturer={:02x} type={:02x} capacity={:02x}",
                id[0], id[1], id[2]
            );
        }
        last = Some(id);

        ticker.next().await;
    }
}

fn read_jedec_id(spi: &mut FlashBus) -> [u8; 3] {
    let mut id = [0u8; 3];
    spi.begin_transaction();
    spi.transfer(CMD_READ_JEDEC_ID);
    spi.transfer_buffers(None, Some(&mut id[..]), 3);
    spi.end_transaction();
    id
}
