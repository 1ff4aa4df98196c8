//! The 8-bit 8080 bus on top of an I2S peripheral in LCD mode.
//!
//! Every FIFO sample carries one bus byte in its low eight bits and the
//! register-select level in bit 8. In 32-bit sample mode one FIFO word is one
//! sample (upper half); in 16-bit mode one FIFO word carries two samples,
//! upper half first. The word clock is routed, inverted, to the write strobe.

use core::sync::atomic::{compiler_fence, Ordering};

use crate::clock::ClockCache;
use crate::config::{BusConfig, ConfigError};
use crate::dma::{DmaStorage, FLIP_WORDS};
use crate::hal::{poll_until, Gpio, Platform, PollStrategy, Registers, Spin};
use crate::pins::{self, unscramble};
use crate::pixel::{PixelSink, PixelSource};
use crate::regs::*;

/// FIFO words queued per CPU-fed batch.
const FIFO_BATCH: u32 = 32;
/// Pixel pairs queued per batch of 24-bit repeats (three words each).
const PAIR_BATCH: u32 = 10;
/// First and largest descriptor payload, in bytes.
const DMA_FIRST: usize = 64;
const DMA_MAX: usize = 256;
/// Scratch space for one chunk of converted pixels.
const PIXEL_SCRATCH: usize = 512;

/// FIFO packing and feed currently programmed into the peripheral.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferMode {
    /// One 32-bit sample per FIFO word, fed by the CPU.
    Scalar32,
    /// Two 16-bit samples per FIFO word, fed by the CPU.
    Bulk16,
    /// Two 16-bit samples per word, fed by the descriptor engine.
    Bulk16Dma,
}

impl TransferMode {
    fn registers(self) -> (u32, u32) {
        match self {
            TransferMode::Scalar32 => (SAMPLE_RATE_32BIT, FIFO_CONF_DEFAULT),
            TransferMode::Bulk16 => (SAMPLE_RATE_16BIT, FIFO_CONF_DEFAULT),
            TransferMode::Bulk16Dma => (SAMPLE_RATE_16BIT, FIFO_CONF_DMA),
        }
    }
}

pub struct Parallel8<'d, P: Platform, W: PollStrategy = Spin> {
    platform: P,
    regs: P::Registers,
    storage: &'d mut DmaStorage,
    cfg: BusConfig,
    clock: ClockCache,
    mode: TransferMode,
    poll: W,
}

impl<'d, P: Platform> Parallel8<'d, P, Spin> {
    pub fn new(platform: P, storage: &'d mut DmaStorage, cfg: BusConfig) -> Result<Self, ConfigError> {
        Self::with_poll(platform, storage, cfg, Spin)
    }
}

impl<'d, P: Platform, W: PollStrategy> Parallel8<'d, P, W> {
    /// Like [`Parallel8::new`], with a custom strategy for status polling.
    pub fn with_poll(
        mut platform: P,
        storage: &'d mut DmaStorage,
        cfg: BusConfig,
        poll: W,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let regs = platform.registers(cfg.port);
        Ok(Self {
            platform,
            regs,
            storage,
            cfg,
            clock: ClockCache::new(),
            mode: TransferMode::Scalar32,
            poll,
        })
    }

    /// Replace the settings. Takes effect for the peripheral on the next
    /// [`init`](Self::init).
    pub fn config(&mut self, cfg: BusConfig) -> Result<(), ConfigError> {
        cfg.validate()?;
        self.regs = self.platform.registers(cfg.port);
        self.cfg = cfg;
        self.clock.invalidate();
        Ok(())
    }

    pub fn settings(&self) -> &BusConfig {
        &self.cfg
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Route the pins and bring the peripheral into LCD mode.
    pub fn init(&mut self) {
        log::debug!(
            "parallel8 init: port {}, d {:?}, rd {}, wr {}, rs {}",
            self.cfg.port.index(),
            self.cfg.pin_d,
            self.cfg.pin_rd,
            self.cfg.pin_wr,
            self.cfg.pin_rs
        );
        pins::route_write(&mut self.platform, &self.cfg);

        let regs = &mut self.regs;
        regs.write(
            Reg::Conf,
            CONF_TX_RESET | CONF_RX_RESET | CONF_TX_FIFO_RESET | CONF_RX_FIFO_RESET,
        );
        regs.write(Reg::Conf, CONF_DEFAULT);
        regs.write(
            Reg::LcConf,
            LC_CONF_IN_RST | LC_CONF_OUT_RST | LC_CONF_AHBM_RST | LC_CONF_AHBM_FIFO_RST,
        );
        regs.write(Reg::LcConf, LC_CONF_OUT_EOF_MODE);
        regs.write(Reg::Conf2, CONF2_LCD_EN);
        regs.write(Reg::Conf1, CONF1_TX_PCM_BYPASS | CONF1_TX_STOP_EN);
        regs.write(
            Reg::ConfChan,
            1 << CONF_CHAN_TX_CHAN_MOD_S | 1 << CONF_CHAN_RX_CHAN_MOD_S,
        );
        // enabled but never serviced; completion is polled
        regs.modify(Reg::IntEna, |v| {
            v | INT_TX_REMPTY | INT_TX_WFULL | INT_TX_PUT_DATA
        });
        regs.write(Reg::OutLink, 0);
        regs.write(Reg::InLink, 0);
        regs.write(Reg::Timing, 0);

        self.storage.reset();
        self.mode = TransferMode::Scalar32;
    }

    pub fn release(&mut self) {}

    pub fn begin_transaction(&mut self) {
        let apb = self.platform.apb_frequency();
        let clkm = self.clock.get(apb, self.cfg.freq_write);
        self.regs.write(Reg::ClkmConf, clkm);

        self.poll_idle();
        self.mode = TransferMode::Scalar32;
        self.regs.write(Reg::SampleRateConf, SAMPLE_RATE_32BIT);
        self.regs.write(Reg::FifoConf, FIFO_CONF_DEFAULT);
    }

    pub fn end_transaction(&mut self) {
        self.wait_idle();
    }

    /// Block until the FIFO drained and the transmitter stopped.
    pub fn wait(&mut self) {
        let regs = &self.regs;
        poll_until(&mut self.poll, || regs.read(Reg::IntRaw) & INT_TX_REMPTY != 0);
        self.regs.write(Reg::IntClr, INT_TX_REMPTY);
        self.wait_idle();
    }

    pub fn busy(&self) -> bool {
        self.regs.read(Reg::State) & STATE_TX_IDLE == 0
    }

    pub fn write_command(&mut self, value: u32, bit_length: u8) {
        self.write_scalar(value, bit_length, 0);
    }

    pub fn write_data(&mut self, value: u32, bit_length: u8) {
        self.write_scalar(value, bit_length, SAMPLE32_DATA);
    }

    /// Send `count` copies of one pixel value of `bit_length` bits.
    pub fn write_data_repeat(&mut self, value: u32, bit_length: u8, mut count: u32) {
        if count == 0 {
            return;
        }
        match bit_length {
            0..=8 => {
                let c = value & 0xFF;
                if count & 1 != 0 {
                    self.write_data(c, 8);
                    count -= 1;
                    if count == 0 {
                        return;
                    }
                }
                let word = SAMPLE16_DATA_PAIR | c << 16 | c;
                self.repeat_batched(&[word], count >> 1, FIFO_BATCH);
            }
            9..=16 => {
                let c = value & 0xFFFF;
                let word = SAMPLE16_DATA_PAIR | c << 16 | c >> 8;
                self.repeat_batched(&[word], count, FIFO_BATCH);
            }
            _ => {
                let c = value & 0xFF_FFFF;
                if count & 1 != 0 {
                    self.write_data(c, 24);
                    count -= 1;
                    if count == 0 {
                        return;
                    }
                }
                let words = [
                    SAMPLE16_DATA_PAIR | c << 16 | c >> 8,
                    SAMPLE16_DATA_PAIR | c,
                    SAMPLE16_DATA_PAIR | c << 8 | c >> 16,
                ];
                self.repeat_batched(&words, count >> 1, PAIR_BATCH);
            }
        }
    }

    /// Send a byte buffer, two bytes per FIFO word. With `use_dma`, whatever
    /// the first batch leaves over goes through the descriptor engine unless
    /// the radio is running.
    pub fn write_bytes(&mut self, data: &[u8], use_dma: bool) {
        let mut data = match data {
            [] => return,
            [first, rest @ ..] if data.len() & 1 != 0 => {
                self.write_data(u32::from(*first), 8);
                rest
            }
            _ => data,
        };
        if data.is_empty() {
            return;
        }

        self.switch_mode(TransferMode::Bulk16);
        loop {
            let words = (((data.len() >> 1) - 1) & (FIFO_BATCH as usize - 1)) + 1;
            let (batch, rest) = data.split_at(words << 1);
            self.wait_idle();
            for pair in batch.chunks_exact(2) {
                self.regs.write(Reg::FifoWr, pack_pair(pair));
            }
            self.regs.write(Reg::Conf, CONF_START);
            data = rest;

            if data.is_empty() {
                return;
            }
            if use_dma {
                if !self.platform.radio_active() {
                    break;
                }
                log::trace!("radio active, dma suppressed");
            }
        }

        log::trace!("dma for {} bytes", data.len());
        self.mode = TransferMode::Bulk16Dma;
        let mut lbase = DMA_FIRST;
        while !data.is_empty() {
            let len = ((data.len() - 1) & (lbase - 1)) + 1;
            let (chunk, rest) = data.split_at(len);
            let words = len >> 1;

            let buf = self.storage.next_buffer();
            for (word, pair) in buf.iter_mut().zip(chunk.chunks_exact(2)) {
                *word = pack_pair(pair);
            }

            self.poll_idle();
            let desc = self.storage.arm(words);
            let addr = self.platform.dma_address(desc);
            let link = OutLink::new().with_start(true).with_addr(addr & 0xF_FFFF).into_bits();
            self.regs.write(Reg::OutLink, link);
            self.regs.write(Reg::Conf, CONF_STOP);
            self.regs.write(Reg::FifoConf, FIFO_CONF_DMA);

            // the engine needs a moment to fetch the descriptor
            for _ in 0..self.cfg.timing.dma_latch_spins {
                core::hint::spin_loop();
            }
            compiler_fence(Ordering::SeqCst);
            self.regs.write(Reg::Conf, CONF_START);

            data = rest;
            lbase = (lbase << 1).min(DMA_MAX);
        }
    }

    /// Stream `length` pixels out of `source`, converted chunk by chunk.
    pub fn write_pixels(&mut self, source: &mut impl PixelSource, length: u32) {
        if length == 0 {
            return;
        }
        let bytes = usize::from(source.bits() >> 3).clamp(2, 3);
        let limit = (PIXEL_SCRATCH / bytes) as u32;
        let mut buf = [0u8; PIXEL_SCRATCH];
        let mut index = 0usize;
        let mut remaining = length;

        let mut n = length % limit;
        if n == 0 {
            n = limit;
        }
        while remaining > 0 {
            let len = n as usize * bytes;
            index = source.pull(&mut buf[..len], index, index + n as usize);
            self.write_bytes(&buf[..len], false);
            remaining -= n;
            n = limit;
        }
    }

    /// Switch the data lines over to GPIO inputs.
    pub fn begin_read(&mut self) {
        self.wait();
        pins::route_read(&mut self.platform, &self.cfg);
    }

    pub fn end_read(&mut self) {
        self.wait();
        pins::route_write(&mut self.platform, &self.cfg);
    }

    /// Read `bit_length` bits, first byte in the least significant position.
    pub fn read_data(&mut self, bit_length: u8) -> u32 {
        let bytes = usize::from(bit_length.div_ceil(8)).clamp(1, 4);
        let mut raw = [0u8; 4];
        self.read_bytes(&mut raw[..bytes], false);
        u32::from_le_bytes(raw)
    }

    /// Fill `dst` from the bus. Reads are always sampled over GPIO; `_use_dma`
    /// is accepted for symmetry with [`write_bytes`](Self::write_bytes).
    pub fn read_bytes(&mut self, dst: &mut [u8], _use_dma: bool) {
        for byte in dst {
            // first sample is stale
            let _ = self.platform.input();
            let raw = self.platform.input();
            self.pulse_rd();
            *byte = unscramble(raw, &self.cfg.pin_d);
        }
    }

    /// Read `length` pixels into `sink`, a batch at a time.
    pub fn read_pixels(&mut self, sink: &mut impl PixelSink, length: u32) {
        let bytes = usize::from(sink.bits() >> 3).clamp(2, 3);
        let limit = if bytes == 2 { 16 } else { 10 };
        let mut regbuf = heapless::Vec::<u8, 32>::new();
        let mut index = 0usize;
        let mut remaining = length as usize;

        while remaining > 0 {
            let n = remaining.min(limit);
            remaining -= n;
            regbuf.clear();
            for _ in 0..n * bytes {
                let raw = self.platform.input();
                self.pulse_rd();
                // a full batch is at most 32 bytes
                let _ = regbuf.push(unscramble(raw, &self.cfg.pin_d));
            }
            index = sink.pull(index, index + n, &regbuf);
        }
    }

    fn write_scalar(&mut self, value: u32, bit_length: u8, rs: u32) {
        let bytes = bit_length.div_ceil(8).clamp(1, 4);
        self.wait_idle();
        self.switch_mode(TransferMode::Scalar32);
        for i in 0..bytes {
            let byte = (value >> (8 * u32::from(i))) & 0xFF;
            self.regs.write(Reg::FifoWr, rs | byte << 16);
        }
        self.regs.write(Reg::Conf, CONF_START);
    }

    /// Queue `groups` copies of `words`, restarting the transmitter every
    /// `batch` groups. The first batch takes the remainder.
    fn repeat_batched(&mut self, words: &[u32], mut groups: u32, batch: u32) {
        self.switch_mode(TransferMode::Bulk16);
        let mut limit = ((groups - 1) % batch) + 1;
        loop {
            groups -= limit;
            self.wait_idle();
            for _ in 0..limit {
                for &word in words {
                    self.regs.write(Reg::FifoWr, word);
                }
            }
            self.regs.write(Reg::Conf, CONF_START);
            if groups == 0 {
                return;
            }
            limit = batch;
            // give the transmitter a chance to leave idle before the next wait
            let mut spins = self.cfg.timing.batch_spins;
            while spins > 0 && !self.busy() {
                core::hint::spin_loop();
                spins -= 1;
            }
        }
    }

    fn switch_mode(&mut self, mode: TransferMode) {
        if self.mode == mode {
            return;
        }
        self.poll_idle();
        let (sample_rate, fifo_conf) = mode.registers();
        self.regs.write(Reg::SampleRateConf, sample_rate);
        self.regs.write(Reg::FifoConf, fifo_conf);
        log::trace!("transfer mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
    }

    fn poll_idle(&mut self) {
        let regs = &self.regs;
        poll_until(&mut self.poll, || regs.read(Reg::State) & STATE_TX_IDLE != 0);
    }

    fn wait_idle(&mut self) {
        self.poll_idle();
        self.regs.write(Reg::Conf, CONF_STOP);
    }

    fn pulse_rd(&mut self) {
        self.platform.set_level(self.cfg.pin_rd, true);
        self.platform.set_level(self.cfg.pin_rd, false);
    }
}

#[inline(always)]
fn pack_pair(pair: &[u8]) -> u32 {
    SAMPLE16_DATA_PAIR | u32::from(pair[0]) << 16 | u32::from(pair[1])
}

const _: () = assert!(DMA_MAX / 4 <= FLIP_WORDS);
