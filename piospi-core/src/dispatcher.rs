//! Transfer dispatcher
//!
//! [`PioSpi`] owns the configuration and activation state of one SPI bus and
//! decides, per request, which blocking primitive of the [`SpiEngine`] to
//! use. MSB-first transfers go straight to the hardware; LSB-first transfers
//! are routed byte by byte through the bit-order adapter.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──begin()──▶ Configured ──begin_transaction()──▶ Active
//!       │                                                        │  ▲
//!       └──────────────begin_transaction()───────────────────────┘  │
//!                                                    end() │        │ begin_transaction()
//!                                                          ▼        │
//!                                                        Released ──┘
//! ```
//!
//! Transfers outside `Active` return zero or do nothing, without touching
//! the hardware.

use piospi_hal::pio::FRAME_BITS;
use piospi_hal::{
    BitOrder, ClockDivider, ClockProgram, GpioPort, Level, Mode, Phase, PinId, Polarity,
    SpiEngine, SpiPins, SpiSettings, StateMachineConfig,
};

use crate::bit_order::adapt;
use crate::config::BusConfig;
use crate::error::SpiError;

/// Activation state of the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActivationState {
    /// Constructed, chip-select not yet initialised
    Uninitialized,
    /// Chip-select initialised and deselected
    Configured,
    /// State machine loaded and running
    Active,
    /// State machine stopped and its slot released by `end()`
    Released,
}

/// SPI master driven by a PIO state machine
///
/// `H` is the hardware handle: the state machine slot plus GPIO access for
/// chip-select. The dispatcher owns it for its whole lifetime.
pub struct PioSpi<H> {
    hw: H,
    pins: SpiPins,
    phase: Phase,
    polarity: Polarity,
    bit_order: BitOrder,
    frequency: u32,
    divider: ClockDivider,
    state: ActivationState,
    /// Set on first activation, never cleared
    pins_frozen: bool,
    transaction_open: bool,
}

impl<H: SpiEngine + GpioPort> PioSpi<H> {
    /// Create an SPI master
    ///
    /// Bit order starts MSB-first. Nothing is touched on the hardware until
    /// `begin()` or `begin_transaction()`.
    pub fn new(hw: H, pins: SpiPins, phase: Phase, polarity: Polarity, frequency: u32) -> Self {
        let divider = ClockDivider::from_frequency(hw.system_clock_hz(), frequency);
        Self {
            hw,
            pins,
            phase,
            polarity,
            bit_order: BitOrder::MsbFirst,
            frequency,
            divider,
            state: ActivationState::Uninitialized,
            pins_frozen: false,
            transaction_open: false,
        }
    }

    /// Create an SPI master from a parsed bus configuration
    pub fn from_config(hw: H, config: &BusConfig) -> Self {
        let settings = config.settings;
        let mut spi = Self::new(
            hw,
            config.pins,
            settings.mode.phase(),
            settings.mode.polarity(),
            settings.frequency,
        );
        spi.bit_order = settings.bit_order;
        spi
    }

    // ---- Configuration ----

    /// Assign the data-out pin
    pub fn set_tx_pin(&mut self, pin: PinId) -> Result<(), SpiError> {
        self.check_pins_mutable()?;
        self.pins.tx = pin;
        Ok(())
    }

    /// Assign the data-in pin
    pub fn set_rx_pin(&mut self, pin: PinId) -> Result<(), SpiError> {
        self.check_pins_mutable()?;
        self.pins.rx = pin;
        Ok(())
    }

    /// Assign the clock pin
    pub fn set_sck_pin(&mut self, pin: PinId) -> Result<(), SpiError> {
        self.check_pins_mutable()?;
        self.pins.sck = pin;
        Ok(())
    }

    /// Assign the chip-select pin
    pub fn set_cs_pin(&mut self, pin: PinId) -> Result<(), SpiError> {
        self.check_pins_mutable()?;
        self.pins.cs = pin;
        Ok(())
    }

    fn check_pins_mutable(&self) -> Result<(), SpiError> {
        if self.pins_frozen {
            warn!("pin change rejected, bus already activated");
            return Err(SpiError::PinsFrozen);
        }
        Ok(())
    }

    /// Set the bit order seen by the caller
    ///
    /// Takes effect on the next transfer. The hardware always shifts
    /// MSB-first, so this never touches the state machine.
    pub fn set_bit_order(&mut self, order: BitOrder) {
        self.bit_order = order;
    }

    /// Current bit order
    pub fn bit_order(&self) -> BitOrder {
        self.bit_order
    }

    /// Current pin assignment
    pub fn pins(&self) -> SpiPins {
        self.pins
    }

    /// Current SPI mode
    pub fn mode(&self) -> Mode {
        Mode::from_parts(self.polarity, self.phase)
    }

    /// Requested clock frequency in Hz
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Clock divider the state machine runs (or will run) with
    pub fn divider(&self) -> ClockDivider {
        self.divider
    }

    /// Activation state
    pub fn state(&self) -> ActivationState {
        self.state
    }

    /// Whether transfers currently reach the hardware
    pub fn is_active(&self) -> bool {
        self.state == ActivationState::Active
    }

    /// Whether chip-select is currently asserted by a transaction
    pub fn is_transaction_open(&self) -> bool {
        self.transaction_open
    }

    /// Borrow the hardware handle
    pub fn hardware(&self) -> &H {
        &self.hw
    }

    /// Give back the hardware handle
    pub fn free(self) -> H {
        self.hw
    }

    // ---- Lifecycle ----

    /// Initialise chip-select as an output, deselected
    ///
    /// The state machine is brought up lazily by the first transaction.
    pub fn begin(&mut self) {
        self.hw.init_output(self.pins.cs, Level::High);
        if self.state == ActivationState::Uninitialized {
            self.state = ActivationState::Configured;
        }
        debug!("spi begin, cs={=u8}", self.pins.cs);
    }

    /// Start a transaction with the current configuration
    ///
    /// The first call (and the first call after `end()`) loads the clock-phase
    /// program and starts the state machine. Every call asserts chip-select.
    pub fn begin_transaction(&mut self) {
        if !self.is_active() {
            self.activate();
        }
        if self.transaction_open {
            warn!("begin_transaction while a transaction is open");
        }
        self.hw.set_level(self.pins.cs, Level::Low);
        self.transaction_open = true;
    }

    /// Start a transaction with explicit settings
    ///
    /// Frequency and mode only take effect on the call that activates the
    /// state machine. The bit order is applied on every call.
    pub fn begin_transaction_with(&mut self, settings: SpiSettings) {
        if !self.is_active() {
            self.frequency = settings.frequency;
            (self.polarity, self.phase) = settings.mode.into();
        } else if settings.frequency != self.frequency || settings.mode != self.mode() {
            debug!("clock settings ignored, state machine already running");
        }
        self.bit_order = settings.bit_order;
        self.begin_transaction();
    }

    /// End the current transaction, deasserting chip-select
    ///
    /// The state machine keeps running.
    pub fn end_transaction(&mut self) {
        self.hw.set_level(self.pins.cs, Level::High);
        self.transaction_open = false;
    }

    /// Stop the state machine and release its slot
    ///
    /// An open transaction is closed first. Transfers afterwards behave as
    /// before activation until `begin_transaction` re-arms the bus.
    pub fn end(&mut self) {
        if self.transaction_open {
            self.end_transaction();
        }
        if self.state == ActivationState::Active {
            self.hw.release();
            self.state = ActivationState::Released;
            debug!("spi released");
        }
    }

    fn activate(&mut self) {
        self.divider = ClockDivider::from_frequency(self.hw.system_clock_hz(), self.frequency);

        // Chip-select may not have gone through begin()
        self.hw.init_output(self.pins.cs, Level::High);

        let program = match self.hw.load_program(ClockProgram::from(self.phase)) {
            Ok(program) => program,
            Err(_) => {
                warn!("spi program load failed");
                return;
            }
        };

        let config = StateMachineConfig {
            divider: self.divider,
            frame_bits: FRAME_BITS,
            polarity: self.polarity,
            sck: self.pins.sck,
            tx: self.pins.tx,
            rx: self.pins.rx,
        };
        if self.hw.init_state_machine(&program, &config).is_err() {
            warn!("spi state machine init failed");
            return;
        }

        self.state = ActivationState::Active;
        self.pins_frozen = true;
        debug!(
            "spi active: div={=u16}.{=u8} cpha={=bool} cpol={=bool}",
            self.divider.int,
            self.divider.frac,
            self.phase.cpha(),
            self.polarity.cpol()
        );
    }

    // ---- Transfers ----

    /// Exchange one byte
    ///
    /// Returns 0 without touching the hardware if the bus is not active.
    pub fn transfer(&mut self, data: u8) -> u8 {
        if !self.is_active() {
            return 0;
        }
        let out = [adapt(self.bit_order, data)];
        let mut ret = [0u8];
        trace!("transfer({=u8:#x})", out[0]);
        self.hw.write_read_blocking(&out, &mut ret);
        trace!("read back {=u8:#x}", ret[0]);
        adapt(self.bit_order, ret[0])
    }

    /// Exchange one 16-bit word as two 8-bit frames, high byte first
    ///
    /// Returns 0 without touching the hardware if the bus is not active.
    pub fn transfer16(&mut self, data: u16) -> u16 {
        if !self.is_active() {
            return 0;
        }
        let out = adapt(self.bit_order, data).to_be_bytes();
        let mut ret = [0u8; 2];
        trace!("transfer16({=u16:#x})", data);
        self.hw.write_read_blocking(&out, &mut ret);
        adapt(self.bit_order, u16::from_be_bytes(ret))
    }

    /// Send `buf` and overwrite it with the received bytes
    ///
    /// Runs one scalar transfer per byte. Like every buffer transfer, the
    /// received bytes are handed back in wire bit order: under LSB-first
    /// each one is reversed again after the scalar transfer.
    pub fn transfer_in_place(&mut self, buf: &mut [u8]) {
        if !self.is_active() {
            return;
        }
        trace!("transfer_in_place({=usize})", buf.len());
        for byte in buf.iter_mut() {
            *byte = adapt(self.bit_order, self.transfer(*byte));
        }
    }

    /// Send `tx` while receiving into `rx`; either side may be absent
    ///
    /// At most `count` bytes move, bounded by the buffers that are present.
    /// With MSB-first order exactly one hardware primitive runs: write-only,
    /// read-only, or write-read. LSB-first falls back to one scalar transfer
    /// per byte and reverses each received byte once more, so `rx` holds
    /// the bytes in wire bit order. Does nothing if the bus is not active.
    pub fn transfer_buffers(&mut self, tx: Option<&[u8]>, rx: Option<&mut [u8]>, count: usize) {
        if !self.is_active() {
            return;
        }
        let count = count
            .min(tx.map_or(usize::MAX, |b| b.len()))
            .min(rx.as_ref().map_or(usize::MAX, |b| b.len()));
        trace!("transfer_buffers({=usize})", count);

        if self.bit_order == BitOrder::MsbFirst {
            match (tx, rx) {
                (Some(tx), None) => self.hw.write_blocking(&tx[..count]),
                (None, Some(rx)) => self.hw.read_blocking(&mut rx[..count]),
                (Some(tx), Some(rx)) => self.hw.write_read_blocking(&tx[..count], &mut rx[..count]),
                (None, None) => {}
            }
            return;
        }

        match (tx, rx) {
            (Some(tx), Some(rx)) => {
                for (out, inp) in tx[..count].iter().zip(rx[..count].iter_mut()) {
                    *inp = adapt(self.bit_order, self.transfer(*out));
                }
            }
            (Some(tx), None) => {
                for &out in &tx[..count] {
                    self.transfer(out);
                }
            }
            (None, Some(rx)) => {
                for inp in rx[..count].iter_mut() {
                    *inp = adapt(self.bit_order, self.transfer(0));
                }
            }
            (None, None) => {}
        }
    }

    /// Clock `write` and `read` together, then finish whichever is longer
    fn exchange(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), SpiError> {
        if !self.is_active() {
            return Err(SpiError::NotActive);
        }
        let common = read.len().min(write.len());
        let (read_head, read_tail) = read.split_at_mut(common);
        self.transfer_buffers(Some(&write[..common]), Some(read_head), common);
        if !read_tail.is_empty() {
            let len = read_tail.len();
            self.transfer_buffers(None, Some(read_tail), len);
        }
        if write.len() > common {
            let tail = &write[common..];
            self.transfer_buffers(Some(tail), None, tail.len());
        }
        Ok(())
    }
}

impl<H: SpiEngine + GpioPort> piospi_hal::SpiBus for PioSpi<H> {
    type Error = SpiError;

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), SpiError> {
        self.exchange(read, write)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), SpiError> {
        self.exchange(&mut [], data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), SpiError> {
        self.exchange(buf, &[])
    }

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), SpiError> {
        if !self.is_active() {
            return Err(SpiError::NotActive);
        }
        PioSpi::transfer_in_place(self, data);
        Ok(())
    }
}

impl<H> embedded_hal::spi::ErrorType for PioSpi<H> {
    type Error = SpiError;
}

impl<H: SpiEngine + GpioPort> embedded_hal::spi::SpiBus<u8> for PioSpi<H> {
    fn read(&mut self, words: &mut [u8]) -> Result<(), SpiError> {
        self.exchange(words, &[])
    }

    fn write(&mut self, words: &[u8]) -> Result<(), SpiError> {
        self.exchange(&mut [], words)
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), SpiError> {
        self.exchange(read, write)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), SpiError> {
        piospi_hal::SpiBus::transfer_in_place(self, words)
    }

    fn flush(&mut self) -> Result<(), SpiError> {
        // Every primitive blocks until its last frame is in
        Ok(())
    }
}
