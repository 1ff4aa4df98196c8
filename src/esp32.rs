//! ESP32 implementation of the platform traits.
//!
//! Talks to the I2S, GPIO, IO_MUX, DPORT and RTC_CNTL blocks directly at
//! their documented addresses. Nothing else in the crate knows an address.

use fugit::HertzU32;

use crate::config::Port;
use crate::dma::Descriptor;
use crate::hal::{Gpio, OutputSignal, PinMode, Platform, Registers};
use crate::regs::Reg;

const I2S0_BASE: usize = 0x3FF4_F000;
const I2S_STRIDE: usize = 0x1_E000;

const GPIO_OUT_W1TS: usize = 0x3FF4_4008;
const GPIO_OUT_W1TC: usize = 0x3FF4_400C;
const GPIO_ENABLE_W1TS: usize = 0x3FF4_4024;
const GPIO_ENABLE_W1TC: usize = 0x3FF4_4028;
const GPIO_IN: usize = 0x3FF4_403C;
const GPIO_FUNC0_OUT_SEL_CFG: usize = 0x3FF4_4530;

const OUT_SEL_GPIO: u32 = 0x100;
const OUT_INV_SEL: u32 = 1 << 9;
/// Output enable taken from GPIO_ENABLE rather than the peripheral.
const OEN_SEL: u32 = 1 << 10;

const IO_MUX_BASE: usize = 0x3FF4_9000;
const MCU_SEL_SHIFT: u32 = 12;
const MCU_SEL_MASK: u32 = 0b111 << MCU_SEL_SHIFT;
const FUNC_GPIO: u32 = 2;
const FUN_IE: u32 = 1 << 9;

const DPORT_PERIP_CLK_EN: usize = 0x3FF0_00C0;
const DPORT_PERIP_RST_EN: usize = 0x3FF0_00C4;
const DPORT_WIFI_CLK_EN: usize = 0x3FF0_00CC;
const DPORT_WIFI_CLK_MASK: u32 = 0x7FF;

/// Where the ROM keeps the APB frequency, in units of 4096 Hz.
const RTC_CNTL_STORE5: usize = 0x3FF4_80B4;
const APB_DEFAULT_HZ: u32 = 80_000_000;

#[inline(always)]
unsafe fn read_reg(addr: usize) -> u32 {
    core::ptr::read_volatile(addr as *const u32)
}

#[inline(always)]
unsafe fn write_reg(addr: usize, value: u32) {
    core::ptr::write_volatile(addr as *mut u32, value)
}

pub const fn i2s_base(port: Port) -> usize {
    I2S0_BASE + port.index() * I2S_STRIDE
}

/// Offset of the IO_MUX pad register of `pin` (they are not in GPIO order).
pub const fn io_mux_offset(pin: u8) -> Option<usize> {
    let offset = match pin {
        0 => 0x44,
        1 => 0x88,
        2 => 0x40,
        3 => 0x84,
        4 => 0x48,
        5 => 0x6C,
        6 => 0x60,
        7 => 0x64,
        8 => 0x68,
        9 => 0x54,
        10 => 0x58,
        11 => 0x5C,
        12 => 0x34,
        13 => 0x38,
        14 => 0x30,
        15 => 0x3C,
        16 => 0x4C,
        17 => 0x50,
        18 => 0x70,
        19 => 0x74,
        20 => 0x78,
        21 => 0x7C,
        22 => 0x80,
        23 => 0x8C,
        25 => 0x24,
        26 => 0x28,
        27 => 0x2C,
        32 => 0x1C,
        33 => 0x20,
        34 => 0x14,
        35 => 0x18,
        36 => 0x04,
        37 => 0x08,
        38 => 0x0C,
        39 => 0x10,
        _ => return None,
    };
    Some(offset)
}

/// GPIO matrix index of an output signal.
pub const fn signal_index(signal: OutputSignal) -> u32 {
    match signal {
        OutputSignal::I2sData { port: Port::I2s0, bit } => 148 + bit as u32,
        OutputSignal::I2sData { port: Port::I2s1, bit } => 174 + bit as u32,
        OutputSignal::I2sWordSelect { port: Port::I2s0 } => 13,
        OutputSignal::I2sWordSelect { port: Port::I2s1 } => 35,
        OutputSignal::Gpio => OUT_SEL_GPIO,
    }
}

const fn peripheral_bit(port: Port) -> u32 {
    match port {
        Port::I2s0 => 1 << 4,
        Port::I2s1 => 1 << 21,
    }
}

/// APB frequency from the raw RTC_CNTL_STORE5 value, rounded to whole MHz.
pub fn decode_apb(raw: u32) -> HertzU32 {
    const MHZ: u32 = 1_000_000;
    let hz = (raw & 0xFFFF) << 12;
    if hz == 0 {
        return HertzU32::from_raw(APB_DEFAULT_HZ);
    }
    HertzU32::from_raw((hz + MHZ / 2) / MHZ * MHZ)
}

/// Register file of one I2S instance.
#[derive(Debug)]
pub struct I2sRegisters {
    base: usize,
}

impl Registers for I2sRegisters {
    #[inline(always)]
    fn read(&self, reg: Reg) -> u32 {
        // SAFETY: `base` is an I2S instance and `reg` one of its registers.
        unsafe { read_reg(self.base + reg.offset()) }
    }

    #[inline(always)]
    fn write(&mut self, reg: Reg, value: u32) {
        // SAFETY: as above.
        unsafe { write_reg(self.base + reg.offset(), value) }
    }
}

pub struct Esp32 {
    _private: (),
}

impl Esp32 {
    /// # Safety
    ///
    /// The caller hands over the I2S instance the bus is configured for and
    /// the GPIOs it names. Nothing else may touch them, nor the GPIO matrix
    /// entries of those pins, while the bus is alive.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn pad_modify(&mut self, pin: u8, f: impl FnOnce(u32) -> u32) {
        if let Some(offset) = io_mux_offset(pin) {
            let addr = IO_MUX_BASE + offset;
            // SAFETY: IO_MUX pad register of an existing pin.
            unsafe { write_reg(addr, f(read_reg(addr))) }
        }
    }
}

impl Gpio for Esp32 {
    fn select_gpio(&mut self, pin: u8) {
        self.pad_modify(pin, |v| (v & !MCU_SEL_MASK) | FUNC_GPIO << MCU_SEL_SHIFT);
    }

    fn set_level(&mut self, pin: u8, high: bool) {
        let reg = if high { GPIO_OUT_W1TS } else { GPIO_OUT_W1TC };
        // SAFETY: write-one-to-set/clear only affects `pin`.
        unsafe { write_reg(reg, 1 << (pin & 31)) }
    }

    fn set_mode(&mut self, pin: u8, mode: PinMode) {
        let bit = 1 << (pin & 31);
        match mode {
            PinMode::Output => {
                self.pad_modify(pin, |v| v & !FUN_IE);
                // SAFETY: as in `set_level`.
                unsafe {
                    write_reg(GPIO_FUNC0_OUT_SEL_CFG + 4 * usize::from(pin), OUT_SEL_GPIO | OEN_SEL);
                    write_reg(GPIO_ENABLE_W1TS, bit);
                }
            }
            PinMode::Input => {
                // SAFETY: as in `set_level`.
                unsafe { write_reg(GPIO_ENABLE_W1TC, bit) }
                self.pad_modify(pin, |v| v | FUN_IE);
            }
        }
    }

    fn connect_output(&mut self, pin: u8, signal: OutputSignal, invert: bool) {
        let mut cfg = signal_index(signal);
        if invert {
            cfg |= OUT_INV_SEL;
        }
        if signal == OutputSignal::Gpio {
            cfg |= OEN_SEL;
        }
        // SAFETY: the matrix entry of a pin owned by the bus.
        unsafe {
            write_reg(GPIO_FUNC0_OUT_SEL_CFG + 4 * usize::from(pin), cfg);
            if signal != OutputSignal::Gpio {
                write_reg(GPIO_ENABLE_W1TS, 1 << (pin & 31));
            }
        }
    }

    #[inline(always)]
    fn input(&self) -> u32 {
        // SAFETY: read-only status register.
        unsafe { read_reg(GPIO_IN) }
    }
}

impl Platform for Esp32 {
    type Registers = I2sRegisters;

    fn registers(&mut self, port: Port) -> I2sRegisters {
        I2sRegisters {
            base: i2s_base(port),
        }
    }

    fn apb_frequency(&self) -> HertzU32 {
        // SAFETY: read-only scratch register.
        decode_apb(unsafe { read_reg(RTC_CNTL_STORE5) })
    }

    fn enable_peripheral(&mut self, port: Port) {
        let bit = peripheral_bit(port);
        // SAFETY: only the bit of the owned I2S instance changes.
        unsafe {
            write_reg(DPORT_PERIP_CLK_EN, read_reg(DPORT_PERIP_CLK_EN) | bit);
            write_reg(DPORT_PERIP_RST_EN, read_reg(DPORT_PERIP_RST_EN) & !bit);
        }
    }

    fn radio_active(&self) -> bool {
        // SAFETY: read-only.
        unsafe { read_reg(DPORT_WIFI_CLK_EN) & DPORT_WIFI_CLK_MASK != 0 }
    }

    fn dma_address(&self, desc: *const Descriptor) -> u32 {
        desc as usize as u32
    }
}
