//! Basic HAL functions for communicating with the radio device
//!
//! This provides decoupling between embedded hal traits and the RF device implementation.
// Copyright 2019 Ryan Kurte

use core::marker::PhantomData;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;

use crate::device::regs::{ADDRESS_MASK, WRITE_FLAG};
use crate::Error;

/// Interrupt trigger edge
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Edge {
    Rising,
    Falling,
}

/// Interrupt capable input line (DIO0)
///
/// Implementations attach or detach the platform interrupt, the platform handler then
/// calls [`crate::Sx127x::handle_interrupt`].
pub trait InterruptPin {
    type Error;

    /// Enable the interrupt on the specified edge
    fn listen(&mut self, edge: Edge) -> Result<(), Self::Error>;

    /// Disable the interrupt
    fn unlisten(&mut self) -> Result<(), Self::Error>;
}

/// Placeholder for setups without an interrupt line, receive by polling only
pub struct NoInterrupt<E> {
    _e: PhantomData<E>,
}

impl<E> NoInterrupt<E> {
    pub fn new() -> Self {
        NoInterrupt { _e: PhantomData }
    }
}

impl<E> Default for NoInterrupt<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> InterruptPin for NoInterrupt<E> {
    type Error = E;

    fn listen(&mut self, _edge: Edge) -> Result<(), E> {
        Ok(())
    }

    fn unlisten(&mut self) -> Result<(), E> {
        Ok(())
    }
}

/// Base implementation can be generic over SPI or other byte transports
pub trait Base<CommsError, PinError> {
    /// Exchange one address byte and one data byte with chip select held for the pair,
    /// returning the byte clocked out alongside the data byte
    fn transfer(&mut self, addr: u8, value: u8) -> Result<u8, Error<CommsError, PinError>>;

    /// Reset the device
    fn reset(&mut self) -> Result<(), Error<CommsError, PinError>>;

    /// Delay for the specified time
    fn delay_ms(&mut self, ms: u32);

    /// Attach the DIO0 interrupt on the given edge
    fn listen(&mut self, edge: Edge) -> Result<(), Error<CommsError, PinError>>;

    /// Detach the DIO0 interrupt
    fn unlisten(&mut self) -> Result<(), Error<CommsError, PinError>>;

    /// Read a single u8 value from the specified register
    fn read_reg(&mut self, reg: u8) -> Result<u8, Error<CommsError, PinError>> {
        self.transfer(reg & ADDRESS_MASK, 0x00)
    }

    /// Write a single u8 value to the specified register
    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), Error<CommsError, PinError>> {
        self.transfer(reg | WRITE_FLAG, value)?;
        Ok(())
    }

    /// Update the specified register with the provided value & mask
    fn update_reg(
        &mut self,
        reg: u8,
        mask: u8,
        value: u8,
    ) -> Result<u8, Error<CommsError, PinError>> {
        let existing = self.read_reg(reg)?;
        let updated = (existing & !mask) | (value & mask);
        self.write_reg(reg, updated)?;
        Ok(updated)
    }
}

/// SPI connected Sx127x, chip select is handled by the `SpiDevice`
pub struct Sx127xSpi<Spi, Reset, Dio, Delay> {
    spi: Spi,
    reset: Reset,
    dio0: Dio,
    delay: Delay,
}

impl<Spi, Reset, Dio, Delay> Sx127xSpi<Spi, Reset, Dio, Delay> {
    pub fn new(spi: Spi, reset: Reset, dio0: Dio, delay: Delay) -> Self {
        Self {
            spi,
            reset,
            dio0,
            delay,
        }
    }

    /// Release the underlying peripherals
    pub fn free(self) -> (Spi, Reset, Dio, Delay) {
        (self.spi, self.reset, self.dio0, self.delay)
    }
}

/// Implement HAL for embedded-hal peripherals
impl<Spi, Reset, Dio, Delay, CommsError, PinError> Base<CommsError, PinError>
    for Sx127xSpi<Spi, Reset, Dio, Delay>
where
    Spi: SpiDevice<u8, Error = CommsError>,
    Reset: OutputPin<Error = PinError>,
    Dio: InterruptPin<Error = PinError>,
    Delay: DelayNs,
{
    fn transfer(&mut self, addr: u8, value: u8) -> Result<u8, Error<CommsError, PinError>> {
        let mut buff = [addr, value];
        self.spi.transfer_in_place(&mut buff).map_err(Error::Comms)?;
        Ok(buff[1])
    }

    /// Reset the radio
    fn reset(&mut self) -> Result<(), Error<CommsError, PinError>> {
        self.reset.set_low().map_err(Error::Pin)?;
        self.delay.delay_ms(1);
        self.reset.set_high().map_err(Error::Pin)?;
        self.delay.delay_ms(10);

        Ok(())
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    fn listen(&mut self, edge: Edge) -> Result<(), Error<CommsError, PinError>> {
        self.dio0.listen(edge).map_err(Error::Pin)
    }

    fn unlisten(&mut self) -> Result<(), Error<CommsError, PinError>> {
        self.dio0.unlisten().map_err(Error::Pin)
    }
}
