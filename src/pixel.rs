//! Pixel-format conversion at the bus boundary.
//!
//! The bus never interprets pixel data. Writes pull raw bus bytes out of a
//! [`PixelSource`] in bounded chunks; reads hand raw sampled bytes to a
//! [`PixelSink`] which converts them into whatever the caller stores.

use embedded_graphics::pixelcolor::raw::RawU16;
use embedded_graphics::pixelcolor::{Rgb565, Rgb888, RgbColor};
use embedded_graphics::prelude::IntoStorage;

/// Producer of bus-format pixels.
pub trait PixelSource {
    /// Bits per pixel on the bus, 16 or 24.
    fn bits(&self) -> u8;

    /// Convert pixels `start..end` of the stream into `dst`, which holds
    /// exactly `(end - start) * bits / 8` bytes. Returns the next start index.
    fn pull(&mut self, dst: &mut [u8], start: usize, end: usize) -> usize;
}

/// Consumer of bus-format pixels sampled by the read path.
pub trait PixelSink {
    /// Bits per pixel on the bus, 16 or 24.
    fn bits(&self) -> u8;

    /// Store pixels `start..end` from the raw bytes in `src`. Returns the next
    /// start index.
    fn pull(&mut self, start: usize, end: usize, src: &[u8]) -> usize;
}

/// RGB565 pixels sent high byte first.
pub struct Rgb565Pixels<'a>(pub &'a [Rgb565]);

impl PixelSource for Rgb565Pixels<'_> {
    fn bits(&self) -> u8 {
        16
    }

    fn pull(&mut self, dst: &mut [u8], start: usize, end: usize) -> usize {
        for (chunk, color) in dst.chunks_exact_mut(2).zip(&self.0[start..end]) {
            chunk.copy_from_slice(&color.into_storage().to_be_bytes());
        }
        end
    }
}

/// RGB888 pixels sent as red, green, blue.
pub struct Rgb888Pixels<'a>(pub &'a [Rgb888]);

impl PixelSource for Rgb888Pixels<'_> {
    fn bits(&self) -> u8 {
        24
    }

    fn pull(&mut self, dst: &mut [u8], start: usize, end: usize) -> usize {
        for (chunk, color) in dst.chunks_exact_mut(3).zip(&self.0[start..end]) {
            chunk.copy_from_slice(&[color.r(), color.g(), color.b()]);
        }
        end
    }
}

/// Frame memory read back into RGB565, from either a 16-bit or an 18/24-bit
/// bus pixel format.
pub struct Rgb565Buffer<'a> {
    dst: &'a mut [Rgb565],
    bus_bits: u8,
}

impl<'a> Rgb565Buffer<'a> {
    pub fn new(dst: &'a mut [Rgb565], bus_bits: u8) -> Self {
        Self { dst, bus_bits }
    }
}

impl PixelSink for Rgb565Buffer<'_> {
    fn bits(&self) -> u8 {
        self.bus_bits
    }

    fn pull(&mut self, start: usize, end: usize, src: &[u8]) -> usize {
        let dst = &mut self.dst[start..end];
        if self.bus_bits == 16 {
            for (color, raw) in dst.iter_mut().zip(src.chunks_exact(2)) {
                *color = RawU16::new(u16::from_be_bytes([raw[0], raw[1]])).into();
            }
        } else {
            for (color, raw) in dst.iter_mut().zip(src.chunks_exact(3)) {
                *color = Rgb565::new(raw[0] >> 3, raw[1] >> 2, raw[2] >> 3);
            }
        }
        end
    }
}
