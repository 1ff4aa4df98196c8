//! Platform capabilities consumed by the bus driver.
//!
//! All raw address arithmetic lives behind these traits, so the driver itself
//! can run against a simulated peripheral as well as against silicon (see
//! [`crate::esp32`]).

use fugit::HertzU32;

use crate::config::Port;
use crate::dma::Descriptor;
use crate::regs::Reg;

/// Register file of one I2S peripheral instance.
pub trait Registers {
    fn read(&self, reg: Reg) -> u32;
    fn write(&mut self, reg: Reg, value: u32);

    #[inline(always)]
    fn modify(&mut self, reg: Reg, f: impl FnOnce(u32) -> u32) {
        let value = self.read(reg);
        self.write(reg, f(value));
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    Input,
    Output,
}

/// Peripheral outputs a pad can be routed to through the GPIO matrix.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputSignal {
    /// Parallel data output `bit` (0..=8) of an I2S peripheral in LCD mode.
    /// Bit 8 carries register select.
    I2sData { port: Port, bit: u8 },
    /// Word clock of an I2S peripheral, used as the write strobe.
    I2sWordSelect { port: Port },
    /// Plain GPIO output register; detaches the pad from any peripheral.
    Gpio,
}

/// Pad control and the GPIO matrix.
pub trait Gpio {
    /// Switch the pad multiplexer to the GPIO function.
    fn select_gpio(&mut self, pin: u8);
    fn set_level(&mut self, pin: u8, high: bool);
    fn set_mode(&mut self, pin: u8, mode: PinMode);
    fn connect_output(&mut self, pin: u8, signal: OutputSignal, invert: bool);
    /// Raw input levels of GPIO0..=31.
    fn input(&self) -> u32;
}

pub trait Platform: Gpio {
    type Registers: Registers;

    /// Resolve the register file of `port`. Called once per configuration.
    fn registers(&mut self, port: Port) -> Self::Registers;
    /// Frequency of the bus clock the I2S clock divider runs from.
    fn apb_frequency(&self) -> HertzU32;
    /// Ungate the peripheral clock and release its reset.
    fn enable_peripheral(&mut self, port: Port);
    /// True while the radio clocks are running. The descriptor engine
    /// corrupts output when used concurrently with the radio.
    fn radio_active(&self) -> bool;
    /// Bus address of `desc` as programmed into the out-link register.
    fn dma_address(&self, desc: *const Descriptor) -> u32;
}

/// Called between unsuccessful polls of a hardware status bit.
///
/// There is no timeout on the bus: a peripheral that never reports idle
/// stalls the caller for good. Tests plug in a strategy that gives up.
pub trait PollStrategy {
    fn relax(&mut self, attempt: u32);
}

/// Busy-spin forever.
#[derive(Copy, Clone, Debug, Default)]
pub struct Spin;

impl PollStrategy for Spin {
    #[inline(always)]
    fn relax(&mut self, _attempt: u32) {
        core::hint::spin_loop();
    }
}

/// Poll `done` until it returns true, relaxing between attempts.
#[inline(always)]
pub(crate) fn poll_until(poll: &mut impl PollStrategy, mut done: impl FnMut() -> bool) {
    let mut attempt = 0;
    while !done() {
        poll.relax(attempt);
        attempt = attempt.wrapping_add(1);
    }
}
