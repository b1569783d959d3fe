//! SX127x Register Definitions
//!
//! Copyright 2019 Ryan Kurte

/// Register address, either shared by both modems or LoRa specific
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Register {
    Common(Common),
    LoRa(LoRa),
}

impl From<Register> for u8 {
    fn from(r: Register) -> u8 {
        match r {
            Register::Common(c) => c as u8,
            Register::LoRa(l) => l as u8,
        }
    }
}

impl From<Common> for u8 {
    fn from(c: Common) -> u8 {
        c as u8
    }
}

impl From<LoRa> for u8 {
    fn from(l: LoRa) -> u8 {
        l as u8
    }
}

impl From<Common> for Register {
    fn from(common: Common) -> Register {
        Register::Common(common)
    }
}

impl From<LoRa> for Register {
    fn from(lora: LoRa) -> Register {
        Register::LoRa(lora)
    }
}

/// Registers available in both FSK/OOK and LoRa modes
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Common {
    /// FIFO read/write access
    Fifo = 0x00,
    /// Operating mode and modem selection
    OpMode = 0x01,
    /// RF carrier frequency
    FrfMsb = 0x06,
    FrfMid = 0x07,
    FrfLsb = 0x08,
    /// PA selection and output power
    PaConfig = 0x09,
    PaRamp = 0x0A,
    Ocp = 0x0B,
    Lna = 0x0C,
    /// DIO0..DIO3 function mapping
    DioMapping1 = 0x40,
    DioMapping2 = 0x41,
    /// Silicon revision
    Version = 0x42,
    Tcxo = 0x4B,
    PaDac = 0x4D,
    FormerTemp = 0x5B,
    /// The 0x61.. block differs between LF and HF access modes
    AgcRef = 0x61,
    AgcThresh1 = 0x62,
    AgcThresh2 = 0x63,
    AgcThresh3 = 0x64,
    Pll = 0x70,
}

/// LoRa mode register page
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum LoRa {
    FifoAddrPtr = 0x0D,
    FifoTxBaseAddr = 0x0E,
    FifoRxBaseAddr = 0x0F,
    FifoRxCurrentAddr = 0x10,
    IrqFlagsMask = 0x11,
    IrqFlags = 0x12,
    RxNbBytes = 0x13,
    RxHeaderCntValueMsb = 0x14,
    RxHeaderCntValueLsb = 0x15,
    RxPacketCntValueMsb = 0x16,
    RxPacketCntValueLsb = 0x17,
    ModemStat = 0x18,
    PktSnrValue = 0x19,
    PktRssiValue = 0x1A,
    RssiValue = 0x1B,
    HopChannel = 0x1C,
    ModemConfig1 = 0x1D,
    ModemConfig2 = 0x1E,
    SymbTimeoutLsb = 0x1F,
    PreambleMsb = 0x20,
    PreambleLsb = 0x21,
    PayloadLength = 0x22,
    PayloadMaxLength = 0x23,
    HopPeriod = 0x24,
    FifoRxByteAddr = 0x25,
    ModemConfig3 = 0x26,
    RssiWideband = 0x2C,
    DetectOptimize = 0x31,
    InvertIq = 0x33,
    DetectionThreshold = 0x37,
    SyncWord = 0x39,
}

/// Number of addressable registers (7-bit address space)
pub const REGISTER_COUNT: usize = 0x80;

/// Address bit selecting a write access
pub const WRITE_FLAG: u8 = 0x80;

/// Address bits carrying the register index
pub const ADDRESS_MASK: u8 = 0x7F;
