//! Recording fake hardware for host tests
//!
//! `FakeBus` implements both hardware traits, logs every call in order and
//! loops MOSI back to MISO unless a canned response is queued.

use heapless::{Deque, Vec};
use piospi_hal::{
    ClockProgram, Direction, GpioPort, Level, PinId, SpiEngine, StateMachineConfig,
};

pub const SYS_CLK_HZ: u32 = 125_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    LoadProgram(ClockProgram),
    Init(StateMachineConfig),
    Write(usize),
    Read(usize),
    WriteRead(usize),
    Release,
    GpioInit(PinId),
    GpioDirection(PinId, Direction),
    GpioLevel(PinId, Level),
}

pub struct FakeBus {
    pub ops: Vec<Op, 256>,
    /// Every byte clocked out on MOSI
    pub wire: Vec<u8, 256>,
    /// Bytes to present on MISO before falling back to loopback
    pub miso: Deque<u8, 64>,
    pub fail_init: bool,
    levels: [Option<Level>; 30],
}

impl FakeBus {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            wire: Vec::new(),
            miso: Deque::new(),
            fail_init: false,
            levels: [None; 30],
        }
    }

    pub fn queue_miso(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.miso.push_back(b).unwrap();
        }
    }

    pub fn level(&self, pin: PinId) -> Option<Level> {
        self.levels[pin as usize]
    }

    pub fn count(&self, f: impl Fn(&Op) -> bool) -> usize {
        self.ops.iter().filter(|op| f(*op)).count()
    }

    /// Number of calls that touched the state machine or a pin
    pub fn hardware_ops(&self) -> usize {
        self.ops.len()
    }

    fn record(&mut self, op: Op) {
        self.ops.push(op).unwrap();
    }

    fn shift(&mut self, out: u8) -> u8 {
        self.wire.push(out).unwrap();
        self.miso.pop_front().unwrap_or(out)
    }
}

impl SpiEngine for FakeBus {
    type Program = ClockProgram;
    type Error = ();

    fn system_clock_hz(&self) -> u32 {
        SYS_CLK_HZ
    }

    fn load_program(&mut self, program: ClockProgram) -> Result<ClockProgram, ()> {
        self.record(Op::LoadProgram(program));
        Ok(program)
    }

    fn init_state_machine(
        &mut self,
        _program: &ClockProgram,
        config: &StateMachineConfig,
    ) -> Result<(), ()> {
        self.record(Op::Init(*config));
        if self.fail_init {
            Err(())
        } else {
            Ok(())
        }
    }

    fn write_blocking(&mut self, src: &[u8]) {
        self.record(Op::Write(src.len()));
        for &b in src {
            self.shift(b);
        }
    }

    fn read_blocking(&mut self, dst: &mut [u8]) {
        self.record(Op::Read(dst.len()));
        for b in dst.iter_mut() {
            *b = self.shift(0);
        }
    }

    fn write_read_blocking(&mut self, src: &[u8], dst: &mut [u8]) {
        let count = src.len().min(dst.len());
        self.record(Op::WriteRead(count));
        for i in 0..count {
            dst[i] = self.shift(src[i]);
        }
    }

    fn release(&mut self) {
        self.record(Op::Release);
    }
}

impl GpioPort for FakeBus {
    fn init(&mut self, pin: PinId) {
        self.record(Op::GpioInit(pin));
    }

    fn set_direction(&mut self, pin: PinId, direction: Direction) {
        self.record(Op::GpioDirection(pin, direction));
    }

    fn set_level(&mut self, pin: PinId, level: Level) {
        self.record(Op::GpioLevel(pin, level));
        self.levels[pin as usize] = Some(level);
    }
}
