//! Pin and signal routing for the two bus directions.

use crate::config::BusConfig;
use crate::hal::{Gpio, OutputSignal, PinMode, Platform};

/// Data-out slot of the I2S LCD bus that carries register select.
pub const RS_BIT: u8 = 8;

/// Route the bus for writing: data lines and register select to the I2S
/// parallel outputs, the write strobe to the inverted word clock, the read
/// strobe parked high.
pub fn route_write<P: Platform>(platform: &mut P, cfg: &BusConfig) {
    for pin in cfg.pins() {
        platform.select_gpio(pin);
    }
    for pin in [cfg.pin_rd, cfg.pin_wr, cfg.pin_rs] {
        platform.set_level(pin, true);
    }
    for pin in [cfg.pin_rd, cfg.pin_wr, cfg.pin_rs] {
        platform.set_mode(pin, PinMode::Output);
    }

    let port = cfg.port;
    platform.connect_output(cfg.pin_rs, OutputSignal::I2sData { port, bit: RS_BIT }, false);
    for (bit, &pin) in cfg.pin_d.iter().enumerate().rev() {
        let signal = OutputSignal::I2sData {
            port,
            bit: bit as u8,
        };
        platform.connect_output(pin, signal, false);
    }
    // the strobe is active low
    platform.connect_output(cfg.pin_wr, OutputSignal::I2sWordSelect { port }, true);

    platform.enable_peripheral(port);
}

/// Route the bus for reading: strobes and register select become plain
/// outputs, the data lines are detached from the I2S peripheral and turned
/// into inputs.
pub fn route_read<G: Gpio>(gpio: &mut G, cfg: &BusConfig) {
    gpio.set_level(cfg.pin_rd, true);
    gpio.set_mode(cfg.pin_rd, PinMode::Output);
    for pin in [cfg.pin_wr, cfg.pin_rs] {
        gpio.select_gpio(pin);
        gpio.set_level(pin, true);
        gpio.set_mode(pin, PinMode::Output);
    }

    for &pin in cfg.pin_d.iter().rev() {
        gpio.connect_output(pin, OutputSignal::Gpio, false);
    }
    for &pin in cfg.pin_d.iter().rev() {
        gpio.set_mode(pin, PinMode::Input);
    }
}

/// Gather the eight data-line bits out of a raw GPIO input word.
#[inline(always)]
pub fn unscramble(raw: u32, pin_d: &[u8; 8]) -> u8 {
    pin_d
        .iter()
        .enumerate()
        .fold(0, |acc, (bit, &pin)| acc | (((raw >> pin) & 1) as u8) << bit)
}
