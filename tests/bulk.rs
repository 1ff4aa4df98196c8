//! Buffer writes through the FIFO and the descriptor engine.

mod common;

use common::ready;
use i2s_parallel8::regs::*;
use i2s_parallel8::TransferMode;

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

#[test]
fn fifo_batches() {
    let (mut bus, sim) = ready();
    let data = pattern(100);
    bus.write_bytes(&data, false);

    let sim = sim.borrow();
    assert_eq!(sim.data_bytes(), data);
    // 50 words as 18 + 32
    assert_eq!(sim.starts, 2);
    assert_eq!(sim.writes_to(Reg::FifoWr).len(), 50);
    assert_eq!(sim.writes_to(Reg::FifoWr)[0], 0x0100_0100 | 3 << 16 | 10);
    assert!(sim.dma_chunks.is_empty());
    assert_eq!(bus.mode(), TransferMode::Bulk16);
}

#[test]
fn odd_length_leads_with_scalar() {
    let (mut bus, sim) = ready();
    bus.write_bytes(&[0xA0, 0xA1, 0xA2, 0xA3, 0xA4], false);

    let sim = sim.borrow();
    assert_eq!(sim.data_bytes(), vec![0xA0, 0xA1, 0xA2, 0xA3, 0xA4]);
    assert_eq!(sim.writes_to(Reg::FifoWr)[0], (0x100 | 0xA0) << 16);
    assert_eq!(sim.starts, 2);
    assert!(sim.violations.is_empty());
}

#[test]
fn single_and_empty() {
    let (mut bus, sim) = ready();
    bus.write_bytes(&[], true);
    assert!(sim.borrow().writes.is_empty());

    bus.write_bytes(&[0x77], true);
    assert_eq!(sim.borrow().bus, vec![(true, 0x77)]);
    assert_eq!(bus.mode(), TransferMode::Scalar32);
}

#[test]
fn dma_ramps_descriptor_sizes() {
    let (mut bus, sim) = ready();
    let data = pattern(1000);
    bus.write_bytes(&data, true);

    let sim = sim.borrow();
    assert_eq!(sim.data_bytes(), data);
    // 40 bytes through the FIFO first
    assert_eq!(sim.writes_to(Reg::FifoWr).len(), 20);
    assert_eq!(sim.dma_chunks, vec![64, 128, 256, 256, 256]);
    assert!(sim.violations.is_empty());
    assert_eq!(sim.overlaps, 0);
    assert_eq!(bus.mode(), TransferMode::Bulk16Dma);
}

#[test]
fn dma_flips_buffers() {
    let (mut bus, sim) = ready();
    bus.write_bytes(&pattern(2000), true);

    let sim = sim.borrow();
    let bufs = &sim.dma_buffers;
    assert!(bufs.len() > 2);
    for pair in bufs.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
    assert_eq!(bufs[0], bufs[2]);
}

#[test]
fn dma_link_and_fifo_config() {
    let (mut bus, sim) = ready();
    bus.write_bytes(&pattern(200), true);

    let sim = sim.borrow();
    for link in sim.writes_to(Reg::OutLink) {
        let link = OutLink::from_bits(link);
        assert!(link.start());
        assert_ne!(link.addr(), 0);
    }
    assert_eq!(sim.writes_to(Reg::FifoConf).last(), Some(&FIFO_CONF_DMA));
    // the engine is restarted after each descriptor is linked
    let tail: Vec<_> = sim
        .writes
        .iter()
        .rev()
        .take(4)
        .map(|(reg, _)| *reg)
        .collect();
    assert_eq!(tail, vec![Reg::Conf, Reg::FifoConf, Reg::Conf, Reg::OutLink]);
    assert_eq!(sim.writes.last(), Some(&(Reg::Conf, CONF_START)));
}

#[test]
fn radio_keeps_fifo_path() {
    let (mut bus, sim) = ready();
    sim.borrow_mut().radio = true;
    let data = pattern(1000);
    bus.write_bytes(&data, true);

    let sim = sim.borrow();
    assert_eq!(sim.data_bytes(), data);
    assert!(sim.dma_chunks.is_empty());
    assert!(sim.writes_to(Reg::OutLink).is_empty());
    assert_eq!(sim.writes_to(Reg::FifoWr).len(), 500);
    assert_eq!(bus.mode(), TransferMode::Bulk16);
}

#[test]
fn dma_not_requested() {
    let (mut bus, sim) = ready();
    bus.write_bytes(&pattern(1000), false);

    let sim = sim.borrow();
    assert!(sim.dma_chunks.is_empty());
    assert_eq!(sim.starts, 16);
}

#[test]
fn scalar_after_dma_leaves_descriptor_mode() {
    let (mut bus, sim) = ready();
    bus.write_bytes(&pattern(600), true);
    sim.borrow_mut().clear();
    bus.write_command(0x29, 8);

    let sim = sim.borrow();
    assert_eq!(sim.writes_to(Reg::FifoConf), vec![FIFO_CONF_DEFAULT]);
    assert_eq!(sim.writes_to(Reg::SampleRateConf), vec![SAMPLE_RATE_32BIT]);
    assert_eq!(sim.bus, vec![(false, 0x29)]);
    assert!(sim.violations.is_empty());
    assert_eq!(bus.mode(), TransferMode::Scalar32);
}

#[test]
fn bulk_after_dma_reprograms_fifo() {
    let (mut bus, sim) = ready();
    bus.write_bytes(&pattern(600), true);
    sim.borrow_mut().clear();
    let data = pattern(10);
    bus.write_bytes(&data, false);

    let sim = sim.borrow();
    assert_eq!(sim.writes_to(Reg::FifoConf), vec![FIFO_CONF_DEFAULT]);
    assert_eq!(sim.data_bytes(), data);
}
