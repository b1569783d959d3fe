//! Sx127x Rust Radio Driver
//!
//! Register control, operating mode handling and LoRa packet transmit/receive for the
//! Semtech SX1276/77/78/79 family, including an interrupt driven receive path.
//!
//! Copyright 2019 Ryan Kurte

#![cfg_attr(not(any(test, feature = "std")), no_std)]

use core::convert::TryFrom;
use core::marker::PhantomData;

#[macro_use]
extern crate log;

pub mod base;
use base::{Base, InterruptPin, Sx127xSpi};

pub mod device;
use device::regs::{self, Common, LoRa};
use device::*;

pub mod lora;
pub mod packet;
pub mod shared;

pub mod prelude;

#[cfg(test)]
pub(crate) mod sim;

/// Receive handler, called from [`Sx127x::handle_interrupt`] with the driver and the payload
pub type ReceiveHandler<Base, CommsError, PinError> =
    fn(&mut Sx127x<Base, CommsError, PinError>, &[u8]);

/// Sx127x device object
pub struct Sx127x<Base, CommsError, PinError> {
    pub(crate) hal: Base,
    pub(crate) config: Config,

    /// Configured carrier frequency in Hz
    pub(crate) frequency: u32,
    /// Header mode last written to the device, None until the first write
    pub(crate) implicit_header: Option<bool>,
    pub(crate) on_receive: Option<ReceiveHandler<Base, CommsError, PinError>>,

    _ce: PhantomData<CommsError>,
    _pe: PhantomData<PinError>,
}

/// Sx127x error type
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Error<CommsError, PinError> {
    /// Communications (SPI) error
    Comms(CommsError),
    /// Pin control error
    Pin(PinError),
    /// Unsupported silicon revision
    InvalidDevice(u8),
    /// Configuration rejected before touching the device
    InvalidConfiguration(ConfigError),
    /// Timeout waiting for the device
    Timeout,
    /// Received packet failed CRC
    Crc,
    /// Provided buffer too small for the received packet
    BufferSize,
}

impl<Spi, Reset, Dio, Delay, CommsError, PinError>
    Sx127x<Sx127xSpi<Spi, Reset, Dio, Delay>, CommsError, PinError>
where
    Spi: embedded_hal::spi::SpiDevice<u8, Error = CommsError>,
    Reset: embedded_hal::digital::OutputPin<Error = PinError>,
    Dio: InterruptPin<Error = PinError>,
    Delay: embedded_hal::delay::DelayNs,
{
    /// Create an Sx127x over an SPI device with reset, DIO0 and delay peripherals
    pub fn spi(
        spi: Spi,
        reset: Reset,
        dio0: Dio,
        delay: Delay,
        config: &Config,
    ) -> Result<Self, Error<CommsError, PinError>> {
        let hal = Sx127xSpi::new(spi, reset, dio0, delay);
        Self::new(hal, config)
    }
}

impl<Hal, CommsError, PinError> Sx127x<Hal, CommsError, PinError>
where
    Hal: Base<CommsError, PinError>,
{
    /// Create a new radio instance over an arbitrary hal backend, resetting and
    /// configuring the device
    pub fn new(hal: Hal, config: &Config) -> Result<Self, Error<CommsError, PinError>> {
        config.validate().map_err(Error::InvalidConfiguration)?;

        let mut sx127x = Self::build(hal, config);

        debug!("Resetting radio");
        sx127x.hal.reset()?;

        let version = sx127x.silicon_version()?;
        debug!("SX127x silicon revision: 0x{:02X}", version);
        if version != SILICON_VERSION {
            warn!("Unexpected silicon revision 0x{:02X}", version);
            return Err(Error::InvalidDevice(version));
        }

        sx127x.configure(config)?;

        Ok(sx127x)
    }

    pub(crate) fn build(hal: Hal, config: &Config) -> Self {
        Sx127x {
            hal,
            config: *config,
            frequency: config.frequency(),
            implicit_header: None,
            on_receive: None,
            _ce: PhantomData,
            _pe: PhantomData,
        }
    }

    /// Detach the receive handler and interrupt, returning the hal backend
    pub fn free(mut self) -> Result<Hal, Error<CommsError, PinError>> {
        self.on_receive = None;
        self.hal.unlisten()?;
        Ok(self.hal)
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read the silicon version register
    pub fn silicon_version(&mut self) -> Result<u8, Error<CommsError, PinError>> {
        self.read_reg(Common::Version)
    }

    /// Read a single register
    pub fn read_reg<R>(&mut self, reg: R) -> Result<u8, Error<CommsError, PinError>>
    where
        R: Copy + Clone + Into<u8>,
    {
        self.hal.read_reg(reg.into())
    }

    /// Write a single register
    pub fn write_reg<R>(&mut self, reg: R, value: u8) -> Result<(), Error<CommsError, PinError>>
    where
        R: Copy + Clone + Into<u8>,
    {
        self.hal.write_reg(reg.into(), value)
    }

    /// Read-modify-write the bits selected by `mask`, leaving the rest of the register intact
    pub fn update_reg<R>(
        &mut self,
        reg: R,
        mask: u8,
        value: u8,
    ) -> Result<u8, Error<CommsError, PinError>>
    where
        R: Copy + Clone + Into<u8>,
    {
        self.hal.update_reg(reg.into(), mask, value)
    }

    /// Read consecutive registers starting at 0x00 into `buff` (at most the full register file)
    pub fn read_registers(&mut self, buff: &mut [u8]) -> Result<usize, Error<CommsError, PinError>> {
        let n = core::cmp::min(buff.len(), regs::REGISTER_COUNT);
        for (addr, b) in buff[..n].iter_mut().enumerate() {
            *b = self.hal.read_reg(addr as u8)?;
        }
        Ok(n)
    }

    /// Set the operating mode, only the mode selector bits are touched
    pub fn set_state(&mut self, state: State) -> Result<(), Error<CommsError, PinError>> {
        trace!("Set state: {:?}", state);
        self.update_reg(Common::OpMode, OPMODE_STATE_MASK, state as u8)?;
        Ok(())
    }

    /// Fetch the current operating mode
    pub fn get_state(&mut self) -> Result<State, Error<CommsError, PinError>> {
        let mode = self.read_reg(Common::OpMode)?;
        // Every 3-bit selector value decodes
        let state = State::try_from(mode & OPMODE_STATE_MASK).unwrap_or(State::Standby);
        Ok(state)
    }

    pub fn sleep(&mut self) -> Result<(), Error<CommsError, PinError>> {
        self.set_state(State::Sleep)
    }

    pub fn standby(&mut self) -> Result<(), Error<CommsError, PinError>> {
        self.set_state(State::Standby)
    }

    /// Enable or disable LoRa (long range) mode
    ///
    /// The long range bit can only be changed in sleep, so the device is put to sleep, the bit
    /// switched, then the previous mode restored.
    pub fn set_long_range(&mut self, enabled: bool) -> Result<(), Error<CommsError, PinError>> {
        let mode = self.read_reg(Common::OpMode)?;

        let mut sleep = (mode & !OPMODE_STATE_MASK) | State::Sleep as u8;
        self.write_reg(Common::OpMode, sleep)?;

        let mut restore = mode;
        if enabled {
            sleep |= OPMODE_LONGRANGEMODE_MASK;
            restore |= OPMODE_LONGRANGEMODE_MASK;
        } else {
            sleep &= !OPMODE_LONGRANGEMODE_MASK;
            restore &= !OPMODE_LONGRANGEMODE_MASK;
        }
        self.write_reg(Common::OpMode, sleep)?;
        self.write_reg(Common::OpMode, restore)?;

        debug!("Long range mode {}", if enabled { "enabled" } else { "disabled" });

        Ok(())
    }

    /// Select LoRa, FSK or OOK modulation
    pub fn set_modulation(&mut self, modulation: Modulation) -> Result<(), Error<CommsError, PinError>> {
        match modulation {
            Modulation::LoRa => self.set_long_range(true)?,
            Modulation::Fsk | Modulation::Ook => {
                self.set_long_range(false)?;
                self.update_reg(Common::OpMode, OPMODE_MODTYPE_MASK, modulation.mod_type())?;
            }
        }
        Ok(())
    }

    /// Set the carrier frequency in Hz
    ///
    /// This also selects the LF or HF register page, the 0x61.. registers differ between them.
    /// Frequencies outside the supported band are rejected without touching the device.
    pub fn set_frequency(&mut self, freq: u32) -> Result<(), Error<CommsError, PinError>> {
        if freq < FREQ_MIN_HZ || freq > FREQ_MAX_HZ {
            return Err(Error::InvalidConfiguration(ConfigError::Frequency(freq)));
        }

        let frf = ((freq as u64) << 19) / XTAL_FREQ as u64;

        trace!("Set frequency: {} Hz (frf: 0x{:06X})", freq, frf);

        self.write_reg(Common::FrfMsb, (frf >> 16) as u8)?;
        self.write_reg(Common::FrfMid, (frf >> 8) as u8)?;
        self.write_reg(Common::FrfLsb, frf as u8)?;

        let fm = FrequencyMode::for_frequency(freq);
        self.update_reg(Common::OpMode, OPMODE_LF_MASK, fm as u8)?;

        self.frequency = freq;

        Ok(())
    }

    /// Set the carrier frequency from kHz and Hz parts
    pub fn set_frequency_khz(&mut self, khz: u32, hz: u32) -> Result<(), Error<CommsError, PinError>> {
        self.set_frequency(khz.saturating_mul(1000).saturating_add(hz))
    }

    /// Read back the programmed carrier frequency in Hz
    pub fn frequency(&mut self) -> Result<u32, Error<CommsError, PinError>> {
        let msb = self.read_reg(Common::FrfMsb)? as u64;
        let mid = self.read_reg(Common::FrfMid)? as u64;
        let lsb = self.read_reg(Common::FrfLsb)? as u64;

        let frf = (msb << 16) | (mid << 8) | lsb;
        Ok(((frf * XTAL_FREQ as u64) >> 19) as u32)
    }

    /// Set transmit power, out of range requests are clamped to the output's limits
    pub fn set_tx_power(&mut self, power: i8, output: PaSelect) -> Result<(), Error<CommsError, PinError>> {
        // PA_CONFIG is wholly owned by output selection and power
        let v = output.pa_config(power);
        self.write_reg(Common::PaConfig, v)?;

        debug!("Updated PA_CONFIG ({:?}) for: {} dBm to: {:08b}", output, power, v);

        self.config.power = power;
        self.config.pa_output = output;

        Ok(())
    }

    /// Enable or disable the RxDone interrupt source
    pub fn enable_rx_irq(&mut self, enabled: bool) -> Result<(), Error<CommsError, PinError>> {
        let mask = device::lora::Irq::RX_DONE.bits();
        // A set bit in the mask register disables the source
        let value = if enabled { 0 } else { mask };
        self.update_reg(LoRa::IrqFlagsMask, mask, value)?;
        Ok(())
    }
}
