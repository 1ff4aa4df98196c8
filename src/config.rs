//! Bus settings.

use core::fmt;

use fugit::{HertzU32, RateExtU32};

/// Highest GPIO number (exclusive) usable for a bus line. The read path
/// samples the low 32-bit GPIO input word.
pub const PIN_LIMIT: u8 = 32;

/// Which of the two I2S peripherals drives the bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    #[default]
    I2s0,
    I2s1,
}

impl Port {
    pub const fn index(self) -> usize {
        match self {
            Port::I2s0 => 0,
            Port::I2s1 => 1,
        }
    }
}

/// Spin counts used between FIFO batches and while the descriptor engine
/// latches a new descriptor. Tuned for a 240 MHz core; retune for other
/// clock speeds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Upper bound of status polls spent waiting for a started batch to leave
    /// the idle state.
    pub batch_spins: u32,
    /// No-op iterations between linking a descriptor and restarting transmit.
    pub dma_latch_spins: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            batch_spins: 10,
            dma_latch_spins: 11,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    pub port: Port,
    /// Data lines, `pin_d[0]` is the least significant bit.
    pub pin_d: [u8; 8],
    /// Read strobe, active low.
    pub pin_rd: u8,
    /// Write strobe, active low.
    pub pin_wr: u8,
    /// Register select: low for commands, high for data.
    pub pin_rs: u8,
    pub freq_write: HertzU32,
    pub timing: Timing,
}

impl BusConfig {
    pub fn new(pin_d: [u8; 8], pin_rd: u8, pin_wr: u8, pin_rs: u8) -> Self {
        Self {
            port: Port::I2s0,
            pin_d,
            pin_rd,
            pin_wr,
            pin_rs,
            freq_write: 16.MHz(),
            timing: Timing::default(),
        }
    }

    pub fn with_port(mut self, port: Port) -> Self {
        self.port = port;
        self
    }

    pub fn with_freq_write(mut self, freq: HertzU32) -> Self {
        self.freq_write = freq;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// All eleven bus pins, data lines first.
    pub fn pins(&self) -> [u8; 11] {
        let d = self.pin_d;
        [
            d[0],
            d[1],
            d[2],
            d[3],
            d[4],
            d[5],
            d[6],
            d[7],
            self.pin_rd,
            self.pin_wr,
            self.pin_rs,
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.freq_write.raw() == 0 {
            return Err(ConfigError::ZeroFrequency);
        }
        let pins = self.pins();
        for (i, &pin) in pins.iter().enumerate() {
            if pin >= PIN_LIMIT {
                return Err(ConfigError::InvalidPin(pin));
            }
            if pins[..i].contains(&pin) {
                return Err(ConfigError::DuplicatePin(pin));
            }
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The same GPIO was assigned to two bus lines.
    DuplicatePin(u8),
    /// The GPIO cannot serve as a bidirectional bus line.
    InvalidPin(u8),
    ZeroFrequency,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::DuplicatePin(pin) => write!(f, "GPIO{} assigned to more than one line", pin),
            ConfigError::InvalidPin(pin) => write!(f, "GPIO{} cannot be used as a bus line", pin),
            ConfigError::ZeroFrequency => write!(f, "write frequency must be non-zero"),
        }
    }
}
