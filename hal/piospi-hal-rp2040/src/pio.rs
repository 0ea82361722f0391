//! PIO SPI engine
//!
//! Runs the SPI bit engine on one RP2040 PIO state machine. Each clock phase
//! has its own program, and each program comes in two side-set flavours, one
//! per clock polarity, so polarity costs nothing at run time.
//!
//! # Programs
//!
//! Both programs spend four PIO cycles per bit and shift MSB-first with
//! 8-bit autopull/autopush:
//!
//! ```text
//! CPHA=0                         CPHA=1
//!   out pins, 1  side 0 [1]        out x, 1     side 0
//!   in  pins, 1  side 1 [1]        mov pins, x  side 1 [1]
//!                                  in  pins, 1  side 0
//! ```
//!
//! With an idle-high clock every side-set value is inverted.
//!
//! # Frames
//!
//! A byte enters the TX FIFO in bits 31..24 so that a left-shifting OSR
//! emits bit 7 first. The RX FIFO delivers each received byte in bits 7..0.

use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::gpio::{Flex, Level as RpLevel};
use embassy_rp::pio::{
    Common, Config, Direction as PioDirection, Instance, LoadedProgram, Pin, ShiftDirection,
    StateMachine,
};
use fixed::types::U24F8;
use heapless::Vec;
use piospi_hal::{ClockDivider, ClockProgram, PinId, Polarity, SpiEngine, StateMachineConfig};

use crate::pins::{PinBank, PinError};

/// Chip-select GPIOs one engine can drive
pub const MAX_OUTPUTS: usize = 4;

/// Errors from program loading or state machine bring-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineError {
    /// Not enough free instruction memory
    ProgramSpace,
    /// Init was asked to run a program that was never loaded
    NotLoaded,
    /// A clock or data pin could not be claimed
    Pin(PinError),
    /// The state machine already owns different clock or data pins
    PinsChanged,
}

impl From<PinError> for EngineError {
    fn from(err: PinError) -> Self {
        EngineError::Pin(err)
    }
}

/// CPHA=0 program for the given clock polarity
pub fn cpha0_program(polarity: Polarity) -> pio::Program<32> {
    match polarity {
        Polarity::IdleLow => {
            pio::pio_asm!(
                ".side_set 1",
                ".wrap_target",
                "out pins, 1 side 0 [1]", // Drive MOSI, clock low
                "in pins, 1 side 1 [1]",  // Sample MISO on the rising edge
                ".wrap"
            )
            .program
        }
        Polarity::IdleHigh => {
            pio::pio_asm!(
                ".side_set 1",
                ".wrap_target",
                "out pins, 1 side 1 [1]",
                "in pins, 1 side 0 [1]",
                ".wrap"
            )
            .program
        }
    }
}

/// CPHA=1 program for the given clock polarity
pub fn cpha1_program(polarity: Polarity) -> pio::Program<32> {
    match polarity {
        Polarity::IdleLow => {
            pio::pio_asm!(
                ".side_set 1",
                ".wrap_target",
                "out x, 1 side 0",        // Stall here on an empty FIFO, clock idle
                "mov pins, x side 1 [1]", // Drive MOSI on the leading edge
                "in pins, 1 side 0",      // Sample MISO on the trailing edge
                ".wrap"
            )
            .program
        }
        Polarity::IdleHigh => {
            pio::pio_asm!(
                ".side_set 1",
                ".wrap_target",
                "out x, 1 side 1",
                "mov pins, x side 0 [1]",
                "in pins, 1 side 1",
                ".wrap"
            )
            .program
        }
    }
}

/// Assemble `program` in the flavour for `polarity`
pub fn assemble(program: ClockProgram, polarity: Polarity) -> pio::Program<32> {
    match program {
        ClockProgram::Cpha0 => cpha0_program(polarity),
        ClockProgram::Cpha1 => cpha1_program(polarity),
    }
}

/// Convert a 16.8 divider to the PIO register format
///
/// FixedU32<U8> has 24 integer bits and 8 fractional bits
pub fn divider_to_fixed(divider: ClockDivider) -> U24F8 {
    U24F8::from_bits(divider.to_bits())
}

/// Position of a byte in the TX FIFO word
#[inline]
pub const fn frame_out(byte: u8) -> u32 {
    (byte as u32) << 24
}

/// Byte carried by an RX FIFO word
#[inline]
pub const fn frame_in(word: u32) -> u8 {
    word as u8
}

/// Index of a (program, polarity) pair in the loaded-program cache
const fn slot(program: ClockProgram, polarity: Polarity) -> usize {
    let phase = match program {
        ClockProgram::Cpha0 => 0,
        ClockProgram::Cpha1 => 1,
    };
    let pol = match polarity {
        Polarity::IdleLow => 0,
        Polarity::IdleHigh => 1,
    };
    phase * 2 + pol
}

/// Clock and data pins handed to the state machine
struct DataPins<'d, PIO: Instance> {
    sck: Pin<'d, PIO>,
    tx: Pin<'d, PIO>,
    rx: Pin<'d, PIO>,
    /// (sck, tx, rx) GPIO numbers
    ids: (PinId, PinId, PinId),
}

/// Blocking SPI engine on one PIO state machine
///
/// The engine takes its clock, data and chip-select pins from a
/// [`PinBank`] by number the first time they are needed. Loaded programs
/// and claimed pins are kept across `release`, so a released bus can be
/// brought up again on the same pins.
pub struct Rp2040PioSpi<'d, PIO: Instance, const SM: usize> {
    common: Common<'d, PIO>,
    sm: StateMachine<'d, PIO, SM>,
    pub(crate) bank: PinBank,
    programs: [Option<LoadedProgram<'d, PIO>>; 4],
    data_pins: Option<DataPins<'d, PIO>>,
    pub(crate) outputs: Vec<(PinId, Flex<'d>), MAX_OUTPUTS>,
    running: bool,
}

impl<'d, PIO: Instance, const SM: usize> Rp2040PioSpi<'d, PIO, SM> {
    /// Create an engine on `sm`
    ///
    /// Nothing is loaded or claimed until the bus is brought up.
    pub fn new(common: Common<'d, PIO>, sm: StateMachine<'d, PIO, SM>, bank: PinBank) -> Self {
        Self {
            common,
            sm,
            bank,
            programs: [const { None }; 4],
            data_pins: None,
            outputs: Vec::new(),
            running: false,
        }
    }

    /// Check if the state machine is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    fn claim_data_pins(&mut self, config: &StateMachineConfig) -> Result<(), EngineError> {
        let ids = (config.sck, config.tx, config.rx);
        if let Some(pins) = &self.data_pins {
            return if pins.ids == ids {
                Ok(())
            } else {
                Err(EngineError::PinsChanged)
            };
        }

        // A partial claim hands its pins back so a later attempt can retry
        let sck = self.bank.take(config.sck)?;
        let tx = match self.bank.take(config.tx) {
            Ok(pin) => pin,
            Err(err) => {
                self.bank.return_pin(config.sck, sck);
                return Err(err.into());
            }
        };
        let rx = match self.bank.take(config.rx) {
            Ok(pin) => pin,
            Err(err) => {
                self.bank.return_pin(config.sck, sck);
                self.bank.return_pin(config.tx, tx);
                return Err(err.into());
            }
        };

        self.data_pins = Some(DataPins {
            sck: self.common.make_pio_pin(sck),
            tx: self.common.make_pio_pin(tx),
            rx: self.common.make_pio_pin(rx),
            ids,
        });
        Ok(())
    }

    /// Push `count` frames while draining as many, never letting either
    /// FIFO stall the other
    fn shift(&mut self, count: usize, out: impl Fn(usize) -> u8, mut input: impl FnMut(usize, u8)) {
        if !self.running {
            return;
        }

        let mut sent = 0;
        let mut received = 0;
        while sent < count || received < count {
            if sent < count && self.sm.tx().try_push(frame_out(out(sent))) {
                sent += 1;
            }
            if received < count {
                if let Some(word) = self.sm.rx().try_pull() {
                    input(received, frame_in(word));
                    received += 1;
                }
            }
        }
    }
}

impl<'d, PIO: Instance, const SM: usize> SpiEngine for Rp2040PioSpi<'d, PIO, SM> {
    type Program = ClockProgram;
    type Error = EngineError;

    fn system_clock_hz(&self) -> u32 {
        clk_sys_freq()
    }

    fn load_program(&mut self, program: ClockProgram) -> Result<ClockProgram, EngineError> {
        for polarity in [Polarity::IdleLow, Polarity::IdleHigh] {
            let entry = &mut self.programs[slot(program, polarity)];
            if entry.is_none() {
                let loaded = self
                    .common
                    .try_load_program(&assemble(program, polarity))
                    .map_err(|_| EngineError::ProgramSpace)?;
                *entry = Some(loaded);
            }
        }
        Ok(program)
    }

    fn init_state_machine(
        &mut self,
        program: &ClockProgram,
        config: &StateMachineConfig,
    ) -> Result<(), EngineError> {
        self.claim_data_pins(config)?;

        let loaded = self.programs[slot(*program, config.polarity)]
            .as_ref()
            .ok_or(EngineError::NotLoaded)?;
        let pins = self.data_pins.as_ref().ok_or(EngineError::NotLoaded)?;

        let mut cfg = Config::default();
        cfg.use_program(loaded, &[&pins.sck]);
        cfg.set_out_pins(&[&pins.tx]);
        cfg.set_in_pins(&[&pins.rx]);

        cfg.shift_out.auto_fill = true;
        cfg.shift_out.threshold = config.frame_bits;
        cfg.shift_out.direction = ShiftDirection::Left;
        cfg.shift_in.auto_fill = true;
        cfg.shift_in.threshold = config.frame_bits;
        cfg.shift_in.direction = ShiftDirection::Left;

        cfg.clock_divider = divider_to_fixed(config.divider);

        let idle = match config.polarity {
            Polarity::IdleLow => RpLevel::Low,
            Polarity::IdleHigh => RpLevel::High,
        };

        self.sm.set_enable(false);
        self.sm.set_config(&cfg);
        self.sm.set_pins(idle, &[&pins.sck]);
        self.sm.set_pins(RpLevel::Low, &[&pins.tx]);
        self.sm.set_pin_dirs(PioDirection::Out, &[&pins.sck, &pins.tx]);
        self.sm.set_pin_dirs(PioDirection::In, &[&pins.rx]);
        self.sm.clear_fifos();
        self.sm.restart();
        self.sm.set_enable(true);
        self.running = true;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "PIO SPI SM{} running: sck={} tx={} rx={} div={}",
            SM,
            config.sck,
            config.tx,
            config.rx,
            config.divider
        );

        Ok(())
    }

    fn write_blocking(&mut self, src: &[u8]) {
        self.shift(src.len(), |i| src[i], |_, _| {});
    }

    fn read_blocking(&mut self, dst: &mut [u8]) {
        self.shift(dst.len(), |_| 0, |i, b| dst[i] = b);
    }

    fn write_read_blocking(&mut self, src: &[u8], dst: &mut [u8]) {
        let count = src.len().min(dst.len());
        self.shift(count, |i| src[i], |i, b| dst[i] = b);
    }

    fn release(&mut self) {
        self.sm.set_enable(false);
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpha0_encoding() {
        let low = cpha0_program(Polarity::IdleLow);
        assert_eq!(low.code.as_slice(), &[0x6101, 0x5101]);

        // Idle-high only flips the side-set bit
        let high = cpha0_program(Polarity::IdleHigh);
        assert_eq!(high.code.as_slice(), &[0x7101, 0x4101]);
    }

    #[test]
    fn test_cpha1_encoding() {
        let low = cpha1_program(Polarity::IdleLow);
        assert_eq!(low.code.as_slice(), &[0x6021, 0xB101, 0x4001]);

        let high = cpha1_program(Polarity::IdleHigh);
        assert_eq!(high.code.as_slice(), &[0x7021, 0xA101, 0x5001]);
    }

    #[test]
    fn test_programs_wrap_whole_body() {
        for program in [ClockProgram::Cpha0, ClockProgram::Cpha1] {
            for polarity in [Polarity::IdleLow, Polarity::IdleHigh] {
                let prg = assemble(program, polarity);
                assert_eq!(prg.wrap.target, 0);
                assert_eq!(prg.wrap.source as usize, prg.code.len() - 1);
            }
        }
    }

    #[test]
    fn test_slots_are_distinct() {
        let mut seen = [false; 4];
        for program in [ClockProgram::Cpha0, ClockProgram::Cpha1] {
            for polarity in [Polarity::IdleLow, Polarity::IdleHigh] {
                let s = slot(program, polarity);
                assert!(!seen[s]);
                seen[s] = true;
            }
        }
    }

    #[test]
    fn test_frame_packing() {
        assert_eq!(frame_out(0xA5), 0xA500_0000);
        assert_eq!(frame_in(0x0000_00A5), 0xA5);
        assert_eq!(frame_in(0xFFFF_FF3C), 0x3C);
    }

    #[test]
    fn test_divider_conversion() {
        let div = ClockDivider::from_frequency(125_000_000, 1_000_000);
        let fixed = divider_to_fixed(div);
        assert_eq!(fixed.to_bits(), (31 << 8) | 64);
        assert_eq!(fixed.int().to_num::<u32>(), 31);
    }
}
