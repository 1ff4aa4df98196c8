//! I2S register map, as far as the parallel bus needs it.
//!
//! Offsets and bit positions follow the ESP32 technical reference manual. The
//! multi-bit registers are described with `bitfield-struct` images so the
//! driver can assemble their values in `const` context.

use bitfield_struct::bitfield;

/// The I2S registers touched by the bus driver.
#[allow(dead_code)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reg {
    FifoWr,
    Conf,
    IntRaw,
    IntEna,
    IntClr,
    Timing,
    FifoConf,
    ConfChan,
    OutLink,
    InLink,
    LcConf,
    Conf1,
    Conf2,
    ClkmConf,
    SampleRateConf,
    State,
}

impl Reg {
    /// Byte offset from the peripheral base address.
    pub const fn offset(self) -> usize {
        match self {
            Reg::FifoWr => 0x000,
            Reg::Conf => 0x008,
            Reg::IntRaw => 0x00C,
            Reg::IntEna => 0x014,
            Reg::IntClr => 0x018,
            Reg::Timing => 0x01C,
            Reg::FifoConf => 0x020,
            Reg::ConfChan => 0x02C,
            Reg::OutLink => 0x030,
            Reg::InLink => 0x034,
            Reg::LcConf => 0x060,
            Reg::Conf1 => 0x0A0,
            Reg::Conf2 => 0x0A8,
            Reg::ClkmConf => 0x0AC,
            Reg::SampleRateConf => 0x0B0,
            Reg::State => 0x0BC,
        }
    }
}

// CONF
pub const CONF_TX_RESET: u32 = 1 << 0;
pub const CONF_RX_RESET: u32 = 1 << 1;
pub const CONF_TX_FIFO_RESET: u32 = 1 << 2;
pub const CONF_RX_FIFO_RESET: u32 = 1 << 3;
pub const CONF_TX_START: u32 = 1 << 4;
pub const CONF_TX_RIGHT_FIRST: u32 = 1 << 8;
pub const CONF_RX_RIGHT_FIRST: u32 = 1 << 9;
pub const CONF_TX_MSB_RIGHT: u32 = 1 << 16;

// INT_RAW / INT_ENA / INT_CLR share bit positions
pub const INT_TX_PUT_DATA: u32 = 1 << 1;
pub const INT_TX_WFULL: u32 = 1 << 4;
pub const INT_TX_REMPTY: u32 = 1 << 5;

// STATE
pub const STATE_TX_IDLE: u32 = 1 << 0;

// LC_CONF
pub const LC_CONF_IN_RST: u32 = 1 << 0;
pub const LC_CONF_OUT_RST: u32 = 1 << 1;
pub const LC_CONF_AHBM_FIFO_RST: u32 = 1 << 2;
pub const LC_CONF_AHBM_RST: u32 = 1 << 3;
pub const LC_CONF_OUT_EOF_MODE: u32 = 1 << 8;

// CONF1
pub const CONF1_TX_PCM_BYPASS: u32 = 1 << 3;
pub const CONF1_TX_STOP_EN: u32 = 1 << 8;

// CONF2
pub const CONF2_LCD_EN: u32 = 1 << 5;

// CONF_CHAN
pub const CONF_CHAN_TX_CHAN_MOD_S: u32 = 0;
pub const CONF_CHAN_RX_CHAN_MOD_S: u32 = 3;

/// CLKM_CONF: master clock divider.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct ClkmConf {
    #[bits(8)]
    pub div_num: u8,
    #[bits(6)]
    pub div_b: u8,
    #[bits(6)]
    pub div_a: u8,
    pub clk_en: bool,
    pub clka_ena: bool,
    #[bits(10)]
    __: u16,
}

/// SAMPLE_RATE_CONF: bit clock divider and sample width.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct SampleRateConf {
    #[bits(6)]
    pub tx_bck_div_num: u8,
    #[bits(6)]
    pub rx_bck_div_num: u8,
    #[bits(6)]
    pub tx_bits_mod: u8,
    #[bits(6)]
    pub rx_bits_mod: u8,
    #[bits(8)]
    __: u8,
}

/// FIFO_CONF: FIFO thresholds, channel packing and descriptor fetch.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct FifoConf {
    #[bits(6)]
    pub rx_data_num: u8,
    #[bits(6)]
    pub tx_data_num: u8,
    pub dscr_en: bool,
    #[bits(3)]
    pub tx_fifo_mod: u8,
    #[bits(3)]
    pub rx_fifo_mod: u8,
    pub tx_fifo_mod_force_en: bool,
    pub rx_fifo_mod_force_en: bool,
    #[bits(11)]
    __: u16,
}

/// OUT_LINK: outbound descriptor address and engine control.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct OutLink {
    #[bits(20)]
    pub addr: u32,
    #[bits(8)]
    __: u8,
    pub stop: bool,
    pub start: bool,
    pub restart: bool,
    pub park: bool,
}

/// Resting CONF value: LSB-right, right channel first.
pub const CONF_DEFAULT: u32 = CONF_TX_MSB_RIGHT | CONF_TX_RIGHT_FIRST | CONF_RX_RIGHT_FIRST;
/// CONF value that starts transmission.
pub const CONF_START: u32 = CONF_DEFAULT | CONF_TX_START;
/// CONF value written once the transmitter went idle.
pub const CONF_STOP: u32 = CONF_DEFAULT | CONF_TX_RESET | CONF_RX_RESET | CONF_RX_FIFO_RESET;

pub const SAMPLE_RATE_32BIT: u32 = SampleRateConf::new()
    .with_tx_bck_div_num(1)
    .with_rx_bck_div_num(1)
    .with_tx_bits_mod(32)
    .with_rx_bits_mod(32)
    .into_bits();

pub const SAMPLE_RATE_16BIT: u32 = SampleRateConf::new()
    .with_tx_bck_div_num(1)
    .with_rx_bck_div_num(1)
    .with_tx_bits_mod(16)
    .with_rx_bits_mod(16)
    .into_bits();

/// FIFO packing used for CPU-fed transfers: two 16-bit samples per FIFO word.
pub const FIFO_CONF_DEFAULT: u32 = FifoConf::new()
    .with_rx_data_num(32)
    .with_tx_data_num(32)
    .into_bits();

/// Same packing, with the FIFO fed from the descriptor engine.
pub const FIFO_CONF_DMA: u32 = FifoConf::from_bits(FIFO_CONF_DEFAULT)
    .with_dscr_en(true)
    .into_bits();

/// Register-select bit of a 32-bit sample: data when set, command when clear.
pub const SAMPLE32_DATA: u32 = 0x100 << 16;
/// Register-select bits of both halves of a packed pair of 16-bit samples.
pub const SAMPLE16_DATA_PAIR: u32 = 0x0100_0100;
