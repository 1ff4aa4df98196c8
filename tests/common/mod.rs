//! Simulated I2S peripheral, GPIO matrix and loopback panel.
//!
//! The simulation is shared between the platform handle and the register
//! handle through `Rc<RefCell<Sim>>`, so tests keep a clone and inspect it
//! after driving the bus.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use fugit::HertzU32;
use i2s_parallel8::dma::{Descriptor, DmaStorage};
use i2s_parallel8::regs::*;
use i2s_parallel8::{
    BusConfig, Gpio, OutputSignal, Parallel8, PinMode, Platform, PollStrategy, Port, Registers,
};

/// Status reads a started transfer stays busy for.
const BUSY_POLLS: u32 = 3;

pub struct Sim {
    /// Every register write, in order.
    pub writes: Vec<(Reg, u32)>,
    regs: HashMap<Reg, u32>,
    fifo: Vec<u32>,
    busy: u32,
    /// Never report idle.
    pub stuck: bool,
    /// Bytes that reached the bus, with the register-select level.
    pub bus: Vec<(bool, u8)>,
    pub starts: usize,
    /// Sample-width or FIFO-config writes made while a transfer was running.
    pub violations: Vec<(Reg, u32)>,
    /// Transfers started while another one was running.
    pub overlaps: usize,
    pub dma_chunks: Vec<usize>,
    pub dma_buffers: Vec<*const u8>,
    descriptors: Vec<*const Descriptor>,

    pub radio: bool,
    pub apb_hz: u32,
    pub ports: Vec<Port>,
    pub enabled: Vec<Port>,

    pub levels: HashMap<u8, bool>,
    pub modes: HashMap<u8, PinMode>,
    pub routes: HashMap<u8, (OutputSignal, bool)>,
    pub selected: Vec<u8>,
    data_pins: [Option<u8>; 8],
    rd_pin: u8,
    pub input_reads: usize,
    pub rd_pulses: usize,
    readback: Vec<u8>,
    cursor: usize,
}

impl Sim {
    pub fn new(rd_pin: u8) -> Self {
        Self {
            writes: Vec::new(),
            regs: HashMap::new(),
            fifo: Vec::new(),
            busy: 0,
            stuck: false,
            bus: Vec::new(),
            starts: 0,
            violations: Vec::new(),
            overlaps: 0,
            dma_chunks: Vec::new(),
            dma_buffers: Vec::new(),
            descriptors: Vec::new(),
            radio: false,
            apb_hz: 80_000_000,
            ports: Vec::new(),
            enabled: Vec::new(),
            levels: HashMap::new(),
            modes: HashMap::new(),
            routes: HashMap::new(),
            selected: Vec::new(),
            data_pins: [None; 8],
            rd_pin,
            input_reads: 0,
            rd_pulses: 0,
            readback: Vec::new(),
            cursor: 0,
        }
    }

    /// Forget everything observed so far; peripheral state is kept.
    pub fn clear(&mut self) {
        self.writes.clear();
        self.bus.clear();
        self.starts = 0;
        self.dma_chunks.clear();
        self.dma_buffers.clear();
        self.input_reads = 0;
        self.rd_pulses = 0;
    }

    pub fn reg(&self, reg: Reg) -> u32 {
        self.regs.get(&reg).copied().unwrap_or(0)
    }

    pub fn writes_to(&self, reg: Reg) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|(r, _)| *r == reg)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Bytes sent with register select high.
    pub fn data_bytes(&self) -> Vec<u8> {
        self.bus.iter().filter(|(rs, _)| *rs).map(|(_, b)| *b).collect()
    }

    /// Make the panel answer reads with `bytes`, starting over.
    pub fn set_readback(&mut self, bytes: Vec<u8>) {
        self.readback = bytes;
        self.cursor = 0;
    }

    fn level(&self, pin: u8) -> bool {
        self.levels.get(&pin).copied().unwrap_or(false)
    }

    fn read_status(&mut self, ready: u32) -> u32 {
        if self.stuck {
            return 0;
        }
        if self.busy > 0 {
            self.busy -= 1;
            0
        } else {
            ready
        }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        self.writes.push((reg, value));
        match reg {
            Reg::FifoWr => self.fifo.push(value),
            Reg::SampleRateConf | Reg::FifoConf => {
                if self.busy > 0 || self.stuck {
                    self.violations.push((reg, value));
                }
                self.regs.insert(reg, value);
            }
            Reg::Conf => {
                self.regs.insert(reg, value);
                if value & CONF_TX_FIFO_RESET != 0 {
                    self.fifo.clear();
                }
                if value & CONF_TX_START != 0 {
                    self.start();
                }
            }
            _ => {
                self.regs.insert(reg, value);
            }
        }
    }

    fn start(&mut self) {
        if self.busy > 0 {
            self.overlaps += 1;
        }
        self.starts += 1;
        if FifoConf::from_bits(self.reg(Reg::FifoConf)).dscr_en() {
            self.start_dma();
        } else {
            let bits = SampleRateConf::from_bits(self.reg(Reg::SampleRateConf)).tx_bits_mod();
            for word in std::mem::take(&mut self.fifo) {
                self.emit_word(word, bits);
            }
        }
        self.busy = BUSY_POLLS;
    }

    fn start_dma(&mut self) {
        let link = OutLink::from_bits(self.reg(Reg::OutLink));
        assert!(link.start(), "descriptor engine started without a link");
        let ptr = self.descriptors[link.addr() as usize - 1];
        // SAFETY: the descriptor lives in leaked storage owned by the bus.
        let desc = unsafe { &*ptr };
        let header = desc.header();
        assert!(header.owner() && header.eof());
        let buf = desc.buffer().cast::<u32>();
        for i in 0..usize::from(header.length()) / 4 {
            // SAFETY: the descriptor covers `length` bytes of the flip buffer.
            let word = unsafe { buf.add(i).read() };
            self.emit_word(word, 16);
        }
        self.dma_chunks.push(usize::from(header.length()));
        self.dma_buffers.push(desc.buffer());
    }

    fn emit_word(&mut self, word: u32, bits: u8) {
        self.emit(word >> 16);
        if bits == 16 {
            self.emit(word & 0xFFFF);
        }
    }

    fn emit(&mut self, sample: u32) {
        self.bus.push((sample & 0x100 != 0, sample as u8));
    }

    fn set_level(&mut self, pin: u8, high: bool) {
        let was = self.level(pin);
        self.levels.insert(pin, high);
        // the panel moves on to the next byte when the strobe drops
        if pin == self.rd_pin && was && !high {
            self.rd_pulses += 1;
            self.cursor += 1;
        }
    }

    fn input(&mut self) -> u32 {
        self.input_reads += 1;
        let mut raw = 0u32;
        if self.level(self.rd_pin) {
            raw |= 1 << self.rd_pin;
        }
        let listening = self
            .data_pins
            .iter()
            .flatten()
            .all(|pin| self.modes.get(pin) == Some(&PinMode::Input));
        if !listening {
            return raw;
        }
        let byte = self.readback.get(self.cursor).copied().unwrap_or(0);
        for (bit, pin) in self.data_pins.iter().enumerate() {
            if let Some(pin) = pin {
                if byte >> bit & 1 != 0 {
                    raw |= 1 << pin;
                }
            }
        }
        raw
    }
}

pub struct SimRegisters {
    sim: Rc<RefCell<Sim>>,
}

impl Registers for SimRegisters {
    fn read(&self, reg: Reg) -> u32 {
        let mut sim = self.sim.borrow_mut();
        match reg {
            Reg::State => sim.read_status(STATE_TX_IDLE),
            Reg::IntRaw => sim.read_status(INT_TX_REMPTY),
            _ => sim.reg(reg),
        }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        self.sim.borrow_mut().write(reg, value);
    }
}

pub struct SimPlatform {
    sim: Rc<RefCell<Sim>>,
}

impl Gpio for SimPlatform {
    fn select_gpio(&mut self, pin: u8) {
        self.sim.borrow_mut().selected.push(pin);
    }

    fn set_level(&mut self, pin: u8, high: bool) {
        self.sim.borrow_mut().set_level(pin, high);
    }

    fn set_mode(&mut self, pin: u8, mode: PinMode) {
        self.sim.borrow_mut().modes.insert(pin, mode);
    }

    fn connect_output(&mut self, pin: u8, signal: OutputSignal, invert: bool) {
        let mut sim = self.sim.borrow_mut();
        if let OutputSignal::I2sData { bit, .. } = signal {
            if bit < 8 {
                sim.data_pins[usize::from(bit)] = Some(pin);
            }
        }
        sim.routes.insert(pin, (signal, invert));
    }

    fn input(&self) -> u32 {
        self.sim.borrow_mut().input()
    }
}

impl Platform for SimPlatform {
    type Registers = SimRegisters;

    fn registers(&mut self, port: Port) -> SimRegisters {
        self.sim.borrow_mut().ports.push(port);
        SimRegisters {
            sim: self.sim.clone(),
        }
    }

    fn apb_frequency(&self) -> HertzU32 {
        HertzU32::from_raw(self.sim.borrow().apb_hz)
    }

    fn enable_peripheral(&mut self, port: Port) {
        self.sim.borrow_mut().enabled.push(port);
    }

    fn radio_active(&self) -> bool {
        self.sim.borrow().radio
    }

    fn dma_address(&self, desc: *const Descriptor) -> u32 {
        let mut sim = self.sim.borrow_mut();
        let index = match sim.descriptors.iter().position(|&d| d == desc) {
            Some(index) => index,
            None => {
                sim.descriptors.push(desc);
                sim.descriptors.len() - 1
            }
        };
        index as u32 + 1
    }
}

/// Gives up after a fixed number of polls instead of hanging the test.
pub struct Bounded(pub u32);

impl PollStrategy for Bounded {
    fn relax(&mut self, attempt: u32) {
        assert!(attempt < self.0, "peripheral never became ready");
    }
}

pub type TestBus = Parallel8<'static, SimPlatform, Bounded>;

pub fn config() -> BusConfig {
    BusConfig::new([12, 13, 26, 25, 17, 16, 27, 14], 2, 4, 15)
}

/// A configured but uninitialised bus.
pub fn setup(cfg: BusConfig) -> (TestBus, Rc<RefCell<Sim>>) {
    setup_in(cfg, Box::leak(Box::new(DmaStorage::new())))
}

pub fn setup_in(cfg: BusConfig, storage: &'static mut DmaStorage) -> (TestBus, Rc<RefCell<Sim>>) {
    let sim = Rc::new(RefCell::new(Sim::new(cfg.pin_rd)));
    let platform = SimPlatform { sim: sim.clone() };
    let bus = Parallel8::with_poll(platform, storage, cfg, Bounded(1000)).unwrap();
    (bus, sim)
}

/// An initialised bus inside an open transaction, with the log cleared.
pub fn ready() -> (TestBus, Rc<RefCell<Sim>>) {
    let (mut bus, sim) = setup(config());
    bus.init();
    bus.begin_transaction();
    sim.borrow_mut().clear();
    (bus, sim)
}
