//! 8-bit 8080-style parallel display bus for the ESP32, driven by an I2S
//! peripheral in LCD mode.
//!
//! The I2S clock divider times the write strobe, the TX FIFO carries bus bytes
//! tagged with the register-select level, and long bursts are handed to the
//! descriptor engine. Reads bypass the peripheral and sample the data lines
//! over GPIO.
//!
//! ```ignore
//! let storage = i2s_parallel8::dma_storage!();
//! let cfg = BusConfig::new([12, 13, 26, 25, 17, 16, 27, 14], 2, 4, 15)
//!     .with_freq_write(20.MHz());
//! let mut bus = Parallel8::new(unsafe { Esp32::new() }, storage, cfg)?;
//! bus.init();
//!
//! bus.begin_transaction();
//! bus.write_command(0x2C, 8);
//! bus.write_data_repeat(0xF800, 16, 320 * 240);
//! bus.end_transaction();
//! ```

#![cfg_attr(not(test), no_std)]

pub mod bus;
pub mod clock;
pub mod config;
pub mod dma;
pub mod esp32;
pub mod hal;
pub mod interface;
pub mod pins;
pub mod pixel;
pub mod regs;

pub use bus::{Parallel8, TransferMode};
pub use config::{BusConfig, ConfigError, Port, Timing};
pub use dma::DmaStorage;
pub use hal::{Gpio, OutputSignal, PinMode, Platform, PollStrategy, Registers, Spin};
pub use interface::Parallel8Interface;
pub use pixel::{PixelSink, PixelSource, Rgb565Buffer, Rgb565Pixels, Rgb888Pixels};

#[doc(hidden)]
pub use static_cell;
