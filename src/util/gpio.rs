//! sysfs GPIO wrappers for the reset and DIO0 lines

use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin};
use linux_embedded_hal::sysfs_gpio::{self, Direction, Pin, PinPoller};

use radio_sx127x_lora::base::{Edge, InterruptPin};

/// sysfs GPIO failure
#[derive(Debug)]
pub struct GpioError(pub sysfs_gpio::Error);

impl digital::Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl From<sysfs_gpio::Error> for GpioError {
    fn from(e: sysfs_gpio::Error) -> Self {
        GpioError(e)
    }
}

/// Reset output, idles high
pub struct ResetPin(Pin);

impl ResetPin {
    pub fn open(num: u64) -> Result<Self, GpioError> {
        let pin = Pin::new(num);
        pin.export()?;
        pin.set_direction(Direction::High)?;
        Ok(ResetPin(pin))
    }
}

impl ErrorType for ResetPin {
    type Error = GpioError;
}

impl OutputPin for ResetPin {
    fn set_low(&mut self) -> Result<(), GpioError> {
        self.0.set_value(0)?;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), GpioError> {
        self.0.set_value(1)?;
        Ok(())
    }
}

/// DIO0 input with sysfs edge detection
pub struct Dio0Pin(Pin);

impl Dio0Pin {
    pub fn open(num: u64) -> Result<Self, GpioError> {
        let pin = Pin::new(num);
        pin.export()?;
        pin.set_direction(Direction::In)?;
        Ok(Dio0Pin(pin))
    }

    /// Create a poller to wait for edges armed by `listen`
    pub fn poller(&self) -> Result<PinPoller, GpioError> {
        Ok(self.0.get_poller()?)
    }
}

impl InterruptPin for Dio0Pin {
    type Error = GpioError;

    fn listen(&mut self, edge: Edge) -> Result<(), GpioError> {
        let edge = match edge {
            Edge::Rising => sysfs_gpio::Edge::RisingEdge,
            Edge::Falling => sysfs_gpio::Edge::FallingEdge,
        };
        self.0.set_edge(edge)?;
        Ok(())
    }

    fn unlisten(&mut self) -> Result<(), GpioError> {
        self.0.set_edge(sysfs_gpio::Edge::NoInterrupt)?;
        Ok(())
    }
}
