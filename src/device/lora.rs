//! Sx127x LoRa mode definitions
//!
//! Copyright 2019 Ryan Kurte

use core::convert::TryFrom;

use bitflags::bitflags;

pub const BANDWIDTH_MASK: u8 = 0b1111_0000;

/// LoRa channel bandwidth
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Bandwidth {
    Bw7_8kHz = 0b0000_0000,
    Bw10_4kHz = 0b0001_0000,
    Bw15_6kHz = 0b0010_0000,
    Bw20_8kHz = 0b0011_0000,
    Bw31_25kHz = 0b0100_0000,
    Bw41_7kHz = 0b0101_0000,
    Bw62_5kHz = 0b0110_0000,
    Bw125kHz = 0b0111_0000,
    Bw250kHz = 0b1000_0000,
    Bw500kHz = 0b1001_0000,
}

/// Supported bandwidths in ascending order with their width in Hz
const BANDWIDTHS: [(Bandwidth, u32); 10] = [
    (Bandwidth::Bw7_8kHz, 7_800),
    (Bandwidth::Bw10_4kHz, 10_400),
    (Bandwidth::Bw15_6kHz, 15_600),
    (Bandwidth::Bw20_8kHz, 20_800),
    (Bandwidth::Bw31_25kHz, 31_250),
    (Bandwidth::Bw41_7kHz, 41_700),
    (Bandwidth::Bw62_5kHz, 62_500),
    (Bandwidth::Bw125kHz, 125_000),
    (Bandwidth::Bw250kHz, 250_000),
    (Bandwidth::Bw500kHz, 500_000),
];

impl Bandwidth {
    /// Select the narrowest bandwidth at least as wide as the request,
    /// requests wider than every bin select 500kHz
    pub fn from_hz(hz: u32) -> Self {
        BANDWIDTHS
            .iter()
            .find(|(_, width)| hz <= *width)
            .map(|(bw, _)| *bw)
            .unwrap_or(Bandwidth::Bw500kHz)
    }

    /// Bandwidth in Hz
    pub fn hz(self) -> u32 {
        BANDWIDTHS
            .iter()
            .find(|(bw, _)| *bw == self)
            .map(|(_, width)| *width)
            .unwrap_or(500_000)
    }
}

pub const SPREADING_FACTOR_MASK: u8 = 0b1111_0000;

/// LoRa spreading factor in chips / symbol
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum SpreadingFactor {
    /// Sf6: 64 chips / symbol
    Sf6 = 0b0110_0000,
    /// Sf7: 128 chips / symbol
    Sf7 = 0b0111_0000,
    /// Sf8: 256 chips / symbol
    Sf8 = 0b1000_0000,
    /// Sf9: 512 chips / symbol
    Sf9 = 0b1001_0000,
    /// Sf10: 1024 chips / symbol
    Sf10 = 0b1010_0000,
    /// Sf11: 2048 chips / symbol
    Sf11 = 0b1011_0000,
    /// Sf12: 4096 chips / symbol
    Sf12 = 0b1100_0000,
}

impl SpreadingFactor {
    /// Numeric spreading factor
    pub fn value(self) -> u8 {
        (self as u8) >> 4
    }
}

impl TryFrom<u8> for SpreadingFactor {
    type Error = u8;

    fn try_from(sf: u8) -> Result<Self, u8> {
        use SpreadingFactor::*;
        match sf {
            6 => Ok(Sf6),
            7 => Ok(Sf7),
            8 => Ok(Sf8),
            9 => Ok(Sf9),
            10 => Ok(Sf10),
            11 => Ok(Sf11),
            12 => Ok(Sf12),
            _ => Err(sf),
        }
    }
}

pub const CODERATE_MASK: u8 = 0b0000_1110;

#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CodingRate {
    /// LoRa Coding rate 4/5
    Cr4_5 = 0b0000_0010,
    /// LoRa Coding rate 4/6
    Cr4_6 = 0b0000_0100,
    /// LoRa Coding rate 4/7
    Cr4_7 = 0b0000_0110,
    /// LoRa Coding rate 4/8
    Cr4_8 = 0b0000_1000,
}

impl CodingRate {
    /// Coding rate denominator (5..8)
    pub fn denominator(self) -> u8 {
        ((self as u8) >> 1) + 4
    }
}

impl TryFrom<u8> for CodingRate {
    type Error = u8;

    /// Build from the coding rate denominator
    fn try_from(denominator: u8) -> Result<Self, u8> {
        match denominator {
            5 => Ok(CodingRate::Cr4_5),
            6 => Ok(CodingRate::Cr4_6),
            7 => Ok(CodingRate::Cr4_7),
            8 => Ok(CodingRate::Cr4_8),
            _ => Err(denominator),
        }
    }
}

pub const IMPLICITHEADER_MASK: u8 = 0b0000_0001;
pub const IMPLICITHEADER_ENABLE: u8 = 0b0000_0001;
pub const IMPLICITHEADER_DISABLE: u8 = 0b0000_0000;

pub const RXPAYLOADCRC_MASK: u8 = 0b0000_0100;
pub const RXPAYLOADCRC_ON: u8 = 0b0000_0100;
pub const RXPAYLOADCRC_OFF: u8 = 0b0000_0000;

pub const ACG_AUTO_ON_MASK: u8 = 0b0000_0100;
pub const ACG_AUTO_ON_ENABLED: u8 = 0b0000_0100;

pub const LOWDATARATEOPTIMIZE_MASK: u8 = 0b0000_1000;
pub const LOWDATARATEOPTIMIZE_ON: u8 = 0b0000_1000;
pub const LOWDATARATEOPTIMIZE_OFF: u8 = 0b0000_0000;

/// Low datarate optimisation setting
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Ldr {
    /// Enabled for spreading factors of 10 and above
    Auto,
    On,
    Off,
}

impl Ldr {
    pub fn enabled(self, sf: SpreadingFactor) -> bool {
        match self {
            Ldr::Auto => sf.value() >= 10,
            Ldr::On => true,
            Ldr::Off => false,
        }
    }
}

pub const DETECTIONOPTIMIZE_MASK: u8 = 0b0000_0111;

/// LoRa detection optimization mode
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum DetectionOptimize {
    /// Optimised for Sf7 to Sf12
    Sf7To12 = 0x03,
    /// Optimised for Sf6
    Sf6 = 0x05,
}

/// LoRa detection threshold
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum DetectionThreshold {
    Sf7To12 = 0x0A,
    Sf6 = 0x0C,
}

bitflags! {
    /// Interrupt flags register
    pub struct Irq: u8 {
        /// Timeout interrupt, manually cleared
        const RX_TIMEOUT        = 0b1000_0000;
        /// Packet receipt complete
        const RX_DONE           = 0b0100_0000;
        /// Indicates an invalid CRC was received
        const CRC_ERROR         = 0b0010_0000;
        /// Indicates a valid header has been received
        const VALID_HEADER      = 0b0001_0000;
        /// Packet sending complete
        const TX_DONE           = 0b0000_1000;
        /// Channel activity detection complete
        const CAD_DONE          = 0b0000_0100;
        /// FHSS channel change
        const FHSS_CHANGE_CHANNEL = 0b0000_0010;
        /// Channel activity detected
        const CAD_DETECTED      = 0b0000_0001;
    }
}

bitflags! {
    /// Modem Status flags
    pub struct ModemStatus: u8 {
        const MODEM_CLEAR         = 0b0001_0000;
        const HEADER_VALID        = 0b0000_1000;
        const RX_ONGOING          = 0b0000_0100;
        const SIGNAL_SYNCHRONIZED = 0b0000_0010;
        const SIGNAL_DETECTED     = 0b0000_0001;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandwidth_ceiling_selection() {
        assert_eq!(Bandwidth::from_hz(100_000), Bandwidth::Bw125kHz);
        assert_eq!(Bandwidth::from_hz(125_000), Bandwidth::Bw125kHz);
        assert_eq!(Bandwidth::from_hz(125_001), Bandwidth::Bw250kHz);
        assert_eq!(Bandwidth::from_hz(500_000), Bandwidth::Bw500kHz);
        assert_eq!(Bandwidth::from_hz(600_000), Bandwidth::Bw500kHz);
        assert_eq!(Bandwidth::from_hz(1), Bandwidth::Bw7_8kHz);
        assert_eq!(Bandwidth::from_hz(7_801), Bandwidth::Bw10_4kHz);
        assert_eq!(Bandwidth::from_hz(31_000), Bandwidth::Bw31_25kHz);
    }

    #[test]
    fn bandwidth_is_smallest_bin_not_below_request() {
        for hz in (0..600_000u32).step_by(997) {
            let bw = Bandwidth::from_hz(hz);
            if hz > 500_000 {
                assert_eq!(bw, Bandwidth::Bw500kHz);
                continue;
            }
            assert!(bw.hz() >= hz);
            // No narrower bin also satisfies the request
            for (other, width) in BANDWIDTHS.iter() {
                if *width < bw.hz() {
                    assert!(*width < hz, "{:?} also fits {}", other, hz);
                }
            }
        }
    }

    #[test]
    fn bandwidth_register_index() {
        assert_eq!((Bandwidth::Bw125kHz as u8) >> 4, 7);
        assert_eq!((Bandwidth::Bw500kHz as u8) >> 4, 9);
    }

    #[test]
    fn spreading_factor_conversion() {
        for sf in 6..=12u8 {
            assert_eq!(SpreadingFactor::try_from(sf).unwrap().value(), sf);
        }
        assert_eq!(SpreadingFactor::try_from(5), Err(5));
        assert_eq!(SpreadingFactor::try_from(13), Err(13));
    }

    #[test]
    fn coding_rate_conversion() {
        for d in 5..=8u8 {
            let cr = CodingRate::try_from(d).unwrap();
            assert_eq!(cr.denominator(), d);
            assert_eq!(cr as u8, (d - 4) << 1);
        }
        assert!(CodingRate::try_from(4).is_err());
    }

    #[test]
    fn ldr_auto() {
        assert!(!Ldr::Auto.enabled(SpreadingFactor::Sf9));
        assert!(Ldr::Auto.enabled(SpreadingFactor::Sf10));
        assert!(Ldr::Auto.enabled(SpreadingFactor::Sf12));
        assert!(Ldr::On.enabled(SpreadingFactor::Sf7));
        assert!(!Ldr::Off.enabled(SpreadingFactor::Sf12));
    }
}
