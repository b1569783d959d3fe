use std::convert::TryFrom;

use humantime::Duration as HumanDuration;
use simplelog::LevelFilter;
use structopt::StructOpt;

use radio_sx127x_lora::prelude::*;

#[derive(StructOpt)]
#[structopt(name = "Sx127x-util")]
/// A Command Line Interface (CLI) for interacting with a local Sx127x radio device
pub struct Options {
    #[structopt(subcommand)]
    /// Subcommand to execute
    pub command: Command,

    /// SPI device for radio connection
    #[structopt(long = "spi", default_value = "/dev/spidev0.0", env = "SX127X_SPI")]
    pub spi: String,

    /// Reset (output) pin
    #[structopt(long = "rst-pin", default_value = "17", env = "SX127X_RST")]
    pub rst: u64,

    /// DIO0 (interrupt input) pin
    #[structopt(long = "dio0-pin", default_value = "25", env = "SX127X_DIO0")]
    pub dio0: u64,

    /// Baud rate setting
    #[structopt(long = "baud", default_value = "1000000", env = "SX127X_BAUD")]
    pub baud: u32,

    /// Log verbosity setting
    #[structopt(long = "log-level", default_value = "info")]
    pub level: LevelFilter,
}

#[derive(StructOpt, PartialEq, Debug)]
pub enum Command {
    #[structopt(name = "chip-version")]
    /// Fetch the device silicon/firmware version
    SiliconVersion,

    #[structopt(name = "dump-registers")]
    /// Print the device register file
    DumpRegisters,

    #[structopt(name = "lora")]
    /// LoRa mode configuration and operations
    LoRa(LoRaCommand),
}

#[derive(StructOpt, PartialEq, Debug)]
pub enum Operation {
    #[structopt(name = "tx")]
    /// Transmit a (string) packet
    Transmit(Transmit),

    #[structopt(name = "rx")]
    /// Receive a (string) packet using single receive polling
    Receive(Receive),

    #[structopt(name = "listen")]
    /// Receive packets using the DIO0 interrupt
    Listen(Listen),

    #[structopt(name = "rssi")]
    /// Poll for RSSI on the specified channel
    Rssi(Rssi),

    #[structopt(name = "repeat")]
    /// Repeat received messages
    Repeat(Repeat),
}

#[derive(StructOpt, PartialEq, Debug)]
pub struct LoRaCommand {
    /// Carrier frequency in kHz
    #[structopt(long = "freq-khz", default_value = "433000")]
    pub freq_khz: u32,

    /// Additional carrier frequency offset in Hz
    #[structopt(long = "freq-hz", default_value = "0")]
    pub freq_hz: u32,

    /// Signal bandwidth in Hz, rounded up to the next supported bandwidth
    #[structopt(long = "bandwidth", default_value = "125000")]
    pub bandwidth: u32,

    /// Spreading factor (6..12)
    #[structopt(long = "sf", default_value = "10", parse(try_from_str = parse_sf))]
    pub sf: SpreadingFactor,

    /// Low data rate optimisation (auto, on, off)
    #[structopt(long = "ldr", default_value = "auto", parse(try_from_str = parse_ldr))]
    pub ldr: Ldr,

    /// Coding rate denominator (5..8)
    #[structopt(long = "coding-rate", default_value = "5", parse(try_from_str = parse_cr))]
    pub coding_rate: CodingRate,

    /// Transmit power in dBm, clamped to the selected output's range
    #[structopt(long = "power", default_value = "10", allow_hyphen_values = true)]
    pub power: i8,

    /// Power amplifier output (boost, rfo)
    #[structopt(long = "pa-output", default_value = "boost", parse(try_from_str = parse_pa))]
    pub pa_output: PaSelect,

    /// Preamble length in symbols
    #[structopt(long = "preamble", default_value = "8")]
    pub preamble_len: u16,

    /// Sync word
    #[structopt(long = "sync-word", default_value = "18")]
    pub sync_word: u8,

    /// Enable payload CRC
    #[structopt(long = "crc")]
    pub crc: bool,

    /// Use implicit (fixed length) headers
    #[structopt(long = "implicit-header")]
    pub implicit_header: bool,

    /// Bound on waiting for transmit completion
    #[structopt(long = "tx-timeout", default_value = "10s")]
    pub tx_timeout: HumanDuration,

    #[structopt(subcommand)]
    /// Operation to execute
    pub operation: Operation,
}

impl LoRaCommand {
    /// Build a radio configuration from the command options
    pub fn config(&self) -> Config {
        Config {
            freq_khz: self.freq_khz,
            freq_hz: self.freq_hz,
            bandwidth: self.bandwidth,
            sf: self.sf,
            ldr: self.ldr,
            coding_rate: self.coding_rate,
            power: self.power,
            pa_output: self.pa_output,
            preamble_len: self.preamble_len,
            sync_word: self.sync_word,
            crc: self.crc,
            implicit_header: self.implicit_header,
            tx_timeout_ms: self.tx_timeout.as_millis() as u32,
        }
    }
}

fn parse_sf(s: &str) -> Result<SpreadingFactor, String> {
    let v = s.parse::<u8>().map_err(|e| e.to_string())?;
    SpreadingFactor::try_from(v).map_err(|v| format!("unsupported spreading factor: {}", v))
}

fn parse_cr(s: &str) -> Result<CodingRate, String> {
    let v = s.parse::<u8>().map_err(|e| e.to_string())?;
    CodingRate::try_from(v).map_err(|v| format!("unsupported coding rate: 4/{}", v))
}

fn parse_ldr(s: &str) -> Result<Ldr, String> {
    match s {
        "auto" => Ok(Ldr::Auto),
        "on" => Ok(Ldr::On),
        "off" => Ok(Ldr::Off),
        _ => Err(format!("unrecognised ldr setting: {}", s)),
    }
}

fn parse_pa(s: &str) -> Result<PaSelect, String> {
    match s {
        "boost" => Ok(PaSelect::Boost),
        "rfo" => Ok(PaSelect::Rfo),
        _ => Err(format!("unrecognised pa output: {}", s)),
    }
}

#[derive(StructOpt, PartialEq, Debug)]
pub struct Transmit {
    /// Data to be transmitted
    #[structopt(long = "data")]
    pub data: String,

    /// Run continuously
    #[structopt(long = "continuous")]
    pub continuous: bool,

    /// Override the configured transmit power (dBm)
    #[structopt(long = "power", allow_hyphen_values = true)]
    pub power: Option<i8>,

    /// Specify period for transmission
    #[structopt(long = "period", default_value = "1s")]
    pub period: HumanDuration,
}

#[derive(StructOpt, PartialEq, Debug)]
pub struct Receive {
    /// Fixed payload length for implicit header mode
    #[structopt(long = "size", default_value = "0")]
    pub size: u8,

    /// Run continuously
    #[structopt(long = "continuous")]
    pub continuous: bool,

    /// Specify period for polling for device status
    #[structopt(long = "poll-interval", default_value = "10ms")]
    pub poll_interval: HumanDuration,
}

#[derive(StructOpt, PartialEq, Debug)]
pub struct Listen {
    /// Run continuously
    #[structopt(long = "continuous")]
    pub continuous: bool,

    /// Timeout for each wait on the interrupt line
    #[structopt(long = "poll-timeout", default_value = "1s")]
    pub poll_timeout: HumanDuration,
}

#[derive(StructOpt, PartialEq, Debug)]
pub struct Rssi {
    /// Specify period for RSSI polling
    #[structopt(long = "period", default_value = "1s")]
    pub period: HumanDuration,

    /// Run continuously
    #[structopt(long = "continuous")]
    pub continuous: bool,
}

#[derive(StructOpt, PartialEq, Debug)]
pub struct Repeat {
    /// Run continuously
    #[structopt(long = "continuous")]
    pub continuous: bool,

    /// Override the configured transmit power (dBm)
    #[structopt(long = "power", allow_hyphen_values = true)]
    pub power: Option<i8>,

    /// Specify period for polling for device status
    #[structopt(long = "poll-interval", default_value = "1ms")]
    pub poll_interval: HumanDuration,

    /// Specify delay for response message
    #[structopt(long = "delay", default_value = "100ms")]
    pub delay: HumanDuration,
}
