//! Descriptor-driven transmit storage.
//!
//! The I2S out-link engine walks a chain of `lldesc_t` descriptors. The bus
//! only ever needs one, pointed in turn at the two halves of a flip buffer so
//! the next chunk can be assembled while the previous one drains.

use bitfield_struct::bitfield;
use core::sync::atomic::{compiler_fence, Ordering};

/// Capacity of one flip-buffer half, in 32-bit FIFO words.
pub const FLIP_WORDS: usize = 128;
/// Capacity of one flip-buffer half, in bytes.
pub const FLIP_BYTES: usize = FLIP_WORDS * 4;

/// First word of a descriptor.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct DescriptorHeader {
    /// Buffer size in bytes, word aligned.
    #[bits(12)]
    pub size: u16,
    /// Number of valid bytes in the buffer.
    #[bits(12)]
    pub length: u16,
    #[bits(5)]
    pub offset: u8,
    pub sosf: bool,
    /// Last descriptor of the chain.
    pub eof: bool,
    /// Set while the descriptor belongs to the DMA engine.
    pub owner: bool,
}

impl DescriptorHeader {
    /// Header of a final, hardware-owned descriptor covering `words` words.
    pub const fn for_words(words: usize) -> Self {
        let bytes = (words * 4) as u16;
        Self::new()
            .with_size((bytes + 3) & !3)
            .with_length(bytes)
            .with_eof(true)
            .with_owner(true)
    }
}

/// Hardware descriptor, laid out as `lldesc_t`.
#[repr(C, align(4))]
#[derive(Debug)]
pub struct Descriptor {
    header: DescriptorHeader,
    buf: *const u8,
    next: *const Descriptor,
}

impl Descriptor {
    pub const fn new() -> Self {
        Self {
            header: DescriptorHeader::new(),
            buf: core::ptr::null(),
            next: core::ptr::null(),
        }
    }

    pub fn header(&self) -> DescriptorHeader {
        // SAFETY: `self.header` is a valid, aligned reference.
        unsafe { core::ptr::read_volatile(&self.header) }
    }

    pub fn buffer(&self) -> *const u8 {
        // SAFETY: as above.
        unsafe { core::ptr::read_volatile(&self.buf) }
    }

    pub fn next(&self) -> *const Descriptor {
        // SAFETY: as above.
        unsafe { core::ptr::read_volatile(&self.next) }
    }

    fn load(&mut self, buf: *const u8, header: DescriptorHeader) {
        // SAFETY: plain field writes; volatile so the engine sees them in order.
        unsafe {
            core::ptr::write_volatile(&mut self.buf, buf);
            core::ptr::write_volatile(&mut self.next, core::ptr::null());
            core::ptr::write_volatile(&mut self.header, header);
        }
    }

    fn clear(&mut self) {
        self.load(core::ptr::null(), DescriptorHeader::new());
    }
}

impl Default for Descriptor {
    fn default() -> Self {
        Self::new()
    }
}

/// DMA-capable memory owned by one bus: the descriptor plus a flip buffer.
///
/// Must live in internal RAM; use [`dma_storage!`](crate::dma_storage) or
/// any other `'static` placement in `.bss`.
#[repr(C, align(4))]
pub struct DmaStorage {
    descriptor: Descriptor,
    buffers: [[u32; FLIP_WORDS]; 2],
    current: usize,
}

// SAFETY: the raw pointers inside only ever refer to `self.buffers`, and the
// storage is handed to exactly one bus.
unsafe impl Send for DmaStorage {}

impl DmaStorage {
    pub const fn new() -> Self {
        Self {
            descriptor: Descriptor::new(),
            buffers: [[0; FLIP_WORDS]; 2],
            current: 0,
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Flip to the half not referenced by the last armed descriptor and hand
    /// it out for filling.
    pub fn next_buffer(&mut self) -> &mut [u32; FLIP_WORDS] {
        self.current ^= 1;
        &mut self.buffers[self.current]
    }

    /// Point the descriptor at the first `words` words of the current half
    /// and hand it to the engine. The caller must have waited for the
    /// previous transfer to finish.
    pub fn arm(&mut self, words: usize) -> *const Descriptor {
        debug_assert!(words > 0 && words <= FLIP_WORDS);
        let words = words.min(FLIP_WORDS);
        let buf = self.buffers[self.current].as_ptr().cast::<u8>();
        self.descriptor.load(buf, DescriptorHeader::for_words(words));
        compiler_fence(Ordering::SeqCst);
        &self.descriptor
    }

    pub fn reset(&mut self) {
        self.descriptor.clear();
        self.current = 0;
    }
}

impl Default for DmaStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Place a [`DmaStorage`] in a `static` and return a `&'static mut` to it.
///
/// Each expansion creates its own static, so it panics if the same call site
/// runs twice.
#[macro_export]
macro_rules! dma_storage {
    () => {{
        static STORAGE: $crate::static_cell::StaticCell<$crate::dma::DmaStorage> =
            $crate::static_cell::StaticCell::new();
        STORAGE.init($crate::dma::DmaStorage::new())
    }};
}
