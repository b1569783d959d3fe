//! SX127x general device definitions
//!
// Copyright 2018 Ryan Kurte

use core::convert::TryFrom;

pub mod regs;

pub mod lora;
use self::lora::{CodingRate, Ldr, SpreadingFactor};

/// Expected contents of the version register
pub const SILICON_VERSION: u8 = 0x12;

/// Crystal oscillator frequency
pub const XTAL_FREQ: u32 = 32_000_000;

/// Frequency synthesizer step in Hz (XTAL_FREQ / 2^19)
pub const FREQ_STEP: f32 = 61.03515625;

/// Below this carrier frequency the low frequency register page is selected
pub const LF_THRESHOLD_HZ: u32 = 600_000_000;

/// At or above this carrier frequency the HF RSSI offset applies
pub const RSSI_HF_THRESHOLD_HZ: u32 = 868_000_000;

/// Offset for LF RSSI calculation
pub const RSSI_OFFSET_LF: i16 = -164;

/// Offset for HF RSSI calculation
pub const RSSI_OFFSET_HF: i16 = -157;

/// Largest packet the FIFO can stage
pub const MAX_PKT_LENGTH: usize = 255;

pub const FIFO_TX_BASE_ADDR: u8 = 0x00;
pub const FIFO_RX_BASE_ADDR: u8 = 0x00;

pub const OPMODE_STATE_MASK: u8 = 0b0000_0111;

/// Sx127x radio state enumeration
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum State {
    Sleep = 0x00,
    Standby = 0x01,
    FsTx = 0x02,
    Tx = 0x03,
    FsRx = 0x04,
    Rx = 0x05,

    /// Lora specific single receive mode
    RxOnce = 0x06,
    /// Lora specific channel activity detection mode
    Cad = 0x07,
}

impl TryFrom<u8> for State {
    type Error = ();

    fn try_from(v: u8) -> Result<Self, ()> {
        match v {
            v if v == State::Sleep as u8 => Ok(State::Sleep),
            v if v == State::Standby as u8 => Ok(State::Standby),
            v if v == State::FsTx as u8 => Ok(State::FsTx),
            v if v == State::Tx as u8 => Ok(State::Tx),
            v if v == State::FsRx as u8 => Ok(State::FsRx),
            v if v == State::Rx as u8 => Ok(State::Rx),
            v if v == State::RxOnce as u8 => Ok(State::RxOnce),
            v if v == State::Cad as u8 => Ok(State::Cad),
            _ => Err(()),
        }
    }
}

/// OPMODE register LowFrequencyModeOn bit mask
pub const OPMODE_LF_MASK: u8 = 0b0000_1000;

/// Frequency dependent register page selection
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum FrequencyMode {
    /// High frequency mode
    Hf = 0x00,
    /// Low frequency mode
    Lf = 0x08,
}

impl FrequencyMode {
    pub fn for_frequency(hz: u32) -> Self {
        if hz < LF_THRESHOLD_HZ {
            FrequencyMode::Lf
        } else {
            FrequencyMode::Hf
        }
    }
}

pub const OPMODE_LONGRANGEMODE_MASK: u8 = 0b1000_0000;

pub const OPMODE_MODTYPE_MASK: u8 = 0b0110_0000;

/// Modulation selection, LoRa uses the long range bit, FSK and OOK the modulation type field
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Modulation {
    LoRa,
    Fsk,
    Ook,
}

impl Modulation {
    /// Modulation type field value (only meaningful with long range disabled)
    pub(crate) fn mod_type(self) -> u8 {
        match self {
            Modulation::LoRa | Modulation::Fsk => 0b0000_0000,
            Modulation::Ook => 0b0010_0000,
        }
    }
}

pub const PASELECT_MASK: u8 = 0b1000_0000;
pub const PASELECT_RFO: u8 = 0b0000_0000;
pub const PASELECT_PA_BOOST: u8 = 0b1000_0000;

/// RFO max power field, fixed at its maximum
pub const RFO_MAXPOWER: u8 = 0b0111_0000;

/// Select the power amplifier output configuration
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum PaSelect {
    /// RFO pin, output power 0..14 dBm
    Rfo,
    /// PA_BOOST pin, output power 2..17 dBm
    Boost,
}

impl PaSelect {
    /// PA_CONFIG register value for the requested output power, clamped to the output's range
    pub fn pa_config(self, power: i8) -> u8 {
        match self {
            PaSelect::Rfo => {
                let level = power.max(0).min(14) as u8;
                PASELECT_RFO | RFO_MAXPOWER | level
            }
            PaSelect::Boost => {
                let level = power.max(2).min(17) as u8;
                PASELECT_PA_BOOST | (level - 2)
            }
        }
    }
}

pub const LNA_BOOST_HF_MASK: u8 = 0b0000_0011;
pub const LNA_BOOST_HF_ON: u8 = 0b0000_0011;

/// DIO0 mapping field, bits 5..0 hold the DIO1..DIO3 mappings
pub const DIOMAPPING1_DIO0_MASK: u8 = 0b1100_0000;
/// DIO0 mapped to RxDone in LoRa mode
pub const DIOMAPPING1_DIO0_RXDONE: u8 = 0b0000_0000;

/// Sx127x radio configuration
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Carrier frequency, kHz part (defaults to 433000)
    pub freq_khz: u32,
    /// Carrier frequency, additional Hz (defaults to 0)
    pub freq_hz: u32,
    /// Output power in dBm (defaults to 10dBm)
    pub power: i8,
    /// Power amplifier output selection (defaults to PA_BOOST output)
    pub pa_output: PaSelect,
    /// Requested signal bandwidth in Hz, rounded up to a supported bin (defaults to 125kHz)
    pub bandwidth: u32,
    /// Spreading factor (defaults to SF10)
    pub sf: SpreadingFactor,
    /// Low data rate optimisation (defaults to automatic, on for SF10 and above)
    pub ldr: Ldr,
    /// Coding rate (defaults to 4/5)
    pub coding_rate: CodingRate,
    /// Preamble length in symbols (defaults to 8)
    pub preamble_len: u16,
    /// Implicit header mode (defaults to explicit headers)
    pub implicit_header: bool,
    /// Sync word (defaults to 0x12)
    pub sync_word: u8,
    /// Payload CRC (defaults to disabled)
    pub crc: bool,
    /// Bound on the wait for TxDone in milliseconds (defaults to 10s)
    pub tx_timeout_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            freq_khz: 433_000,
            freq_hz: 0,
            power: 10,
            pa_output: PaSelect::Boost,
            bandwidth: 125_000,
            sf: SpreadingFactor::Sf10,
            ldr: Ldr::Auto,
            coding_rate: CodingRate::Cr4_5,
            preamble_len: 8,
            implicit_header: false,
            sync_word: 0x12,
            crc: false,
            tx_timeout_ms: 10_000,
        }
    }
}

/// Supported carrier range across the SX1276/77/78/79 parts
pub const FREQ_MIN_HZ: u32 = 137_000_000;
pub const FREQ_MAX_HZ: u32 = 1_020_000_000;

/// Shortest preamble the modem accepts
pub const PREAMBLE_MIN: u16 = 6;

impl Config {
    /// Carrier frequency in Hz
    pub fn frequency(&self) -> u32 {
        self.freq_khz.saturating_mul(1000).saturating_add(self.freq_hz)
    }

    /// Check the configuration is usable before touching the device
    pub fn validate(&self) -> Result<(), ConfigError> {
        let freq = self.frequency();
        if freq < FREQ_MIN_HZ || freq > FREQ_MAX_HZ {
            return Err(ConfigError::Frequency(freq));
        }
        if self.bandwidth == 0 {
            return Err(ConfigError::Bandwidth);
        }
        if self.preamble_len < PREAMBLE_MIN {
            return Err(ConfigError::PreambleLength(self.preamble_len));
        }
        if self.tx_timeout_ms == 0 {
            return Err(ConfigError::TxTimeout);
        }
        Ok(())
    }
}

/// Reason a configuration was rejected
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum ConfigError {
    Frequency(u32),
    Bandwidth,
    PreambleLength(u16),
    TxTimeout,
}
