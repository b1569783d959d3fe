//! Common requirements for crate consumers

pub use crate::base::{Base, Edge, InterruptPin, NoInterrupt, Sx127xSpi};
pub use crate::device::lora::{Bandwidth, CodingRate, Irq, Ldr, ModemStatus, SpreadingFactor};
pub use crate::device::{Config, ConfigError, Modulation, PaSelect, State};
pub use crate::lora::PacketInfo;
pub use crate::shared::Shared;
pub use crate::{Error, ReceiveHandler, Sx127x};
