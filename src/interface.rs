//! `display-interface` glue, so panel drivers written against
//! [`WriteOnlyDataCommand`] can talk over the parallel bus.

use display_interface::{DataFormat, DisplayError, WriteOnlyDataCommand};

use crate::bus::Parallel8;
use crate::hal::{Platform, PollStrategy};

const CHUNK: usize = 64;

/// Borrows an initialised bus; every call is one bus transaction.
pub struct Parallel8Interface<'a, 'd, P: Platform, W: PollStrategy> {
    bus: &'a mut Parallel8<'d, P, W>,
}

impl<'a, 'd, P: Platform, W: PollStrategy> Parallel8Interface<'a, 'd, P, W> {
    pub fn new(bus: &'a mut Parallel8<'d, P, W>) -> Self {
        Self { bus }
    }
}

/// Flatten `data` to bytes in bus order and hand them out in bounded chunks.
fn for_each_chunk(data: DataFormat<'_>, mut f: impl FnMut(&[u8])) -> Result<(), DisplayError> {
    let mut buf = heapless::Vec::<u8, CHUNK>::new();
    let mut push = |bytes: &[u8], f: &mut dyn FnMut(&[u8])| {
        if buf.len() + bytes.len() > CHUNK {
            f(buf.as_slice());
            buf.clear();
        }
        // never overflows after the flush above
        let _ = buf.extend_from_slice(bytes);
    };

    match data {
        DataFormat::U8(items) => {
            for chunk in items.chunks(CHUNK) {
                f(chunk);
            }
            return Ok(());
        }
        DataFormat::U16(items) => {
            for item in items {
                push(&item.to_ne_bytes(), &mut f);
            }
        }
        DataFormat::U16BE(items) => {
            for item in items.iter() {
                push(&item.to_be_bytes(), &mut f);
            }
        }
        DataFormat::U16LE(items) => {
            for item in items.iter() {
                push(&item.to_le_bytes(), &mut f);
            }
        }
        DataFormat::U8Iter(iter) => {
            for item in iter {
                push(&[item], &mut f);
            }
        }
        DataFormat::U16BEIter(iter) => {
            for item in iter {
                push(&item.to_be_bytes(), &mut f);
            }
        }
        DataFormat::U16LEIter(iter) => {
            for item in iter {
                push(&item.to_le_bytes(), &mut f);
            }
        }
        _ => return Err(DisplayError::DataFormatNotImplemented),
    }
    if !buf.is_empty() {
        f(buf.as_slice());
    }
    Ok(())
}

impl<P: Platform, W: PollStrategy> WriteOnlyDataCommand for Parallel8Interface<'_, '_, P, W> {
    fn send_commands(&mut self, cmd: DataFormat<'_>) -> Result<(), DisplayError> {
        let bus = &mut *self.bus;
        bus.begin_transaction();
        let result = for_each_chunk(cmd, |bytes| {
            for &b in bytes {
                bus.write_command(u32::from(b), 8);
            }
        });
        bus.end_transaction();
        result
    }

    fn send_data(&mut self, buf: DataFormat<'_>) -> Result<(), DisplayError> {
        let bus = &mut *self.bus;
        bus.begin_transaction();
        let result = match buf {
            DataFormat::U8(items) => {
                bus.write_bytes(items, true);
                Ok(())
            }
            other => for_each_chunk(other, |bytes| bus.write_bytes(bytes, false)),
        };
        bus.end_transaction();
        result
    }
}
