//! Sx127x command line utility
//!
//! Provides mechanisms for command line interaction with Sx127x devices using linux spidev and sysfs_gpio
//!
//! Copyright 2019 Ryan Kurte

#[macro_use]
extern crate log;

use simplelog::{TermLogger, TerminalMode};
use structopt::StructOpt;

use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{Delay, SPIError, SpidevDevice};

use radio_sx127x_lora::prelude::*;

mod gpio;
use gpio::{Dio0Pin, GpioError, ResetPin};

mod options;
use options::*;

mod operations;
use operations::*;

pub type Radio = Sx127x<Sx127xSpi<SpidevDevice, ResetPin, Dio0Pin, Delay>, SPIError, GpioError>;
pub type RadioError = Error<SPIError, GpioError>;

fn main() {
    // Load options
    let opts = Options::from_args();

    // Setup logging
    TermLogger::init(opts.level, simplelog::Config::default(), TerminalMode::Mixed)
        .expect("error initialising logger");

    debug!("Connecting to SPI device");

    // Connect to hardware
    let mut spi = SpidevDevice::open(&opts.spi).expect("error opening spi device");
    let config = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(opts.baud)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.configure(&config).expect("error configuring spi device");

    debug!("Configuring I/O pins");

    let rst = ResetPin::open(opts.rst).expect("error opening rst pin");
    let dio0 = Dio0Pin::open(opts.dio0).expect("error opening dio0 pin");
    let poller = dio0.poller().expect("error creating dio0 poller");

    let config = match &opts.command {
        Command::LoRa(lora_config) => lora_config.config(),
        _ => Config::default(),
    };

    debug!("Creating radio instance");
    let mut radio: Radio = Sx127x::spi(spi, rst, dio0, Delay {}, &config).expect("error creating device");

    debug!("Executing command");
    match opts.command {
        Command::SiliconVersion => {
            let version = radio.silicon_version().expect("error fetching chip version");
            info!("Silicon version: 0x{:X}", version);
        }
        Command::DumpRegisters => {
            let mut regs = [0u8; 128];
            let n = radio.read_registers(&mut regs).expect("error reading registers");
            for (addr, v) in regs[..n].iter().enumerate() {
                info!("0x{:02X}: {:02X}", addr, v);
            }
        }
        Command::LoRa(lora_config) => {
            let implicit_header = lora_config.implicit_header;
            do_operation(radio, poller, implicit_header, lora_config.operation)
                .expect("error executing command");
        }
    }
}

fn do_operation(
    mut radio: Radio,
    poller: linux_embedded_hal::sysfs_gpio::PinPoller,
    implicit_header: bool,
    operation: Operation,
) -> Result<(), RadioError> {
    let mut buff = [0u8; 255];

    match operation {
        Operation::Transmit(config) => do_transmit(
            &mut radio,
            config.data.as_bytes(),
            config.power,
            implicit_header,
            config.continuous,
            *config.period,
        )?,
        Operation::Receive(config) => {
            do_receive(
                &mut radio,
                &mut buff,
                config.size,
                config.continuous,
                *config.poll_interval,
            )?;
        }
        Operation::Listen(config) => {
            radio = do_listen(radio, poller, config.continuous, *config.poll_timeout)?;
        }
        Operation::Rssi(config) => {
            let (min, max) = do_rssi(&mut radio, config.continuous, *config.period)?;
            debug!("RSSI range: {} to {} dBm", min, max);
        }
        Operation::Repeat(config) => {
            do_repeat(
                &mut radio,
                &mut buff,
                config.power,
                config.continuous,
                *config.delay,
                *config.poll_interval,
            )?;
        }
    }

    radio.free()?;

    Ok(())
}
