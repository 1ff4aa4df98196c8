//! Write clock derivation.

use fugit::HertzU32;

use crate::regs::ClkmConf;

const DIV_MIN: u32 = 4;
const DIV_MAX: u32 = 32;

/// Integer master-clock divider for the requested write frequency.
///
/// With an 80 MHz bus clock: 4 = 20 MHz, 5 = 16 MHz, 8 = 10 MHz, 10 = 8 MHz.
pub fn divider(apb: HertzU32, freq_write: HertzU32) -> u32 {
    let div = 1 + apb.raw() / freq_write.raw().saturating_add(1);
    div.clamp(DIV_MIN, DIV_MAX)
}

/// CLKM_CONF value for the requested write frequency.
pub fn clkm_conf(apb: HertzU32, freq_write: HertzU32) -> u32 {
    ClkmConf::new()
        .with_clka_ena(true)
        .with_clk_en(true)
        .with_div_a(1)
        .with_div_b(0)
        .with_div_num(divider(apb, freq_write) as u8)
        .into_bits()
}

/// Last observed bus clock and the CLKM_CONF value derived from it.
#[derive(Copy, Clone, Debug, Default)]
pub struct ClockCache {
    last_apb: u32,
    clkm_conf: u32,
}

impl ClockCache {
    pub const fn new() -> Self {
        Self {
            last_apb: 0,
            clkm_conf: 0,
        }
    }

    /// Forget the cached value, forcing the next lookup to recompute it.
    pub fn invalidate(&mut self) {
        self.last_apb = 0;
    }

    /// CLKM_CONF value for `apb`, recomputed only when `apb` changed.
    pub fn get(&mut self, apb: HertzU32, freq_write: HertzU32) -> u32 {
        if self.last_apb != apb.raw() {
            self.last_apb = apb.raw();
            self.clkm_conf = clkm_conf(apb, freq_write);
            log::debug!(
                "write clock: apb {} Hz, divider {}",
                apb.raw(),
                divider(apb, freq_write)
            );
        }
        self.clkm_conf
    }
}
