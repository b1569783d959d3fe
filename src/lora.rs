//! Sx127x LoRa mode RF implementation
//!
//! Modem parameter configuration for LoRa mode, along with the `radio` trait
//! implementations built on the packet layer.
//!
//! Copyright 2019 Ryan Kurte

use core::fmt::Debug;

use crate::base::Base as Sx127xBase;
use crate::device::lora::*;
use crate::device::regs::{Common, LoRa};
use crate::device::{
    Config, Modulation, FIFO_RX_BASE_ADDR, FIFO_TX_BASE_ADDR, LNA_BOOST_HF_MASK, LNA_BOOST_HF_ON,
    MAX_PKT_LENGTH,
};
use crate::{Error, Sx127x};

/// Received packet information
#[derive(Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PacketInfo {
    /// Packet RSSI in dBm
    pub rssi: i16,
    /// Packet SNR in dB
    pub snr: f32,
}

impl radio::ReceiveInfo for PacketInfo {
    fn rssi(&self) -> i16 {
        self.rssi
    }
}

impl<Base, CommsError, PinError> Sx127x<Base, CommsError, PinError>
where
    Base: Sx127xBase<CommsError, PinError>,
{
    /// Configure the radio in lora mode with the provided configuration
    pub fn configure(&mut self, config: &Config) -> Result<(), Error<CommsError, PinError>> {
        debug!("Configuring lora mode");

        // Setters below record the values actually applied
        self.config = *config;

        // Switch to LoRa mode, this passes through sleep
        self.set_modulation(Modulation::LoRa)?;

        self.set_frequency(config.frequency())?;

        // Boost LNA current
        self.update_reg(Common::Lna, LNA_BOOST_HF_MASK, LNA_BOOST_HF_ON)?;

        self.set_signal_bandwidth(config.bandwidth)?;
        self.set_tx_power(config.power, config.pa_output)?;

        // Force the header mode write
        self.implicit_header = None;
        self.set_implicit_header(config.implicit_header)?;

        self.set_spreading_factor(config.sf)?;
        self.set_ldr(config.ldr.enabled(config.sf))?;
        self.set_coding_rate(config.coding_rate)?;
        self.set_preamble_length(config.preamble_len)?;
        self.set_sync_word(config.sync_word)?;
        self.enable_crc(config.crc)?;

        self.write_reg(LoRa::FifoTxBaseAddr, FIFO_TX_BASE_ADDR)?;
        self.write_reg(LoRa::FifoRxBaseAddr, FIFO_RX_BASE_ADDR)?;

        self.standby()?;

        Ok(())
    }

    /// Set the signal bandwidth, rounding up to the next supported bandwidth
    pub fn set_signal_bandwidth(&mut self, hz: u32) -> Result<Bandwidth, Error<CommsError, PinError>> {
        let bw = Bandwidth::from_hz(hz);
        debug!("Requested bandwidth {} Hz, using {:?}", hz, bw);

        self.update_reg(LoRa::ModemConfig1, BANDWIDTH_MASK, bw as u8)?;
        self.config.bandwidth = bw.hz();

        Ok(bw)
    }

    /// Set the spreading factor along with the detection settings it requires
    pub fn set_spreading_factor(&mut self, sf: SpreadingFactor) -> Result<(), Error<CommsError, PinError>> {
        let (optimize, threshold) = match sf {
            SpreadingFactor::Sf6 => (DetectionOptimize::Sf6, DetectionThreshold::Sf6),
            _ => (DetectionOptimize::Sf7To12, DetectionThreshold::Sf7To12),
        };

        self.update_reg(LoRa::DetectOptimize, DETECTIONOPTIMIZE_MASK, optimize as u8)?;
        self.write_reg(LoRa::DetectionThreshold, threshold as u8)?;

        self.update_reg(LoRa::ModemConfig2, SPREADING_FACTOR_MASK, sf as u8)?;

        // Internal AGC loop
        self.update_reg(LoRa::ModemConfig3, ACG_AUTO_ON_MASK, ACG_AUTO_ON_ENABLED)?;

        self.config.sf = sf;

        Ok(())
    }

    /// Enable or disable low data rate optimisation
    pub fn set_ldr(&mut self, enabled: bool) -> Result<(), Error<CommsError, PinError>> {
        let v = if enabled {
            LOWDATARATEOPTIMIZE_ON
        } else {
            LOWDATARATEOPTIMIZE_OFF
        };
        self.update_reg(LoRa::ModemConfig3, LOWDATARATEOPTIMIZE_MASK, v)?;
        Ok(())
    }

    pub fn set_coding_rate(&mut self, cr: CodingRate) -> Result<(), Error<CommsError, PinError>> {
        self.update_reg(LoRa::ModemConfig1, CODERATE_MASK, cr as u8)?;
        self.config.coding_rate = cr;
        Ok(())
    }

    /// Set preamble length in symbols (hardware adds four more)
    pub fn set_preamble_length(&mut self, len: u16) -> Result<(), Error<CommsError, PinError>> {
        self.write_reg(LoRa::PreambleMsb, (len >> 8) as u8)?;
        self.write_reg(LoRa::PreambleLsb, (len & 0xFF) as u8)?;
        self.config.preamble_len = len;
        Ok(())
    }

    pub fn set_sync_word(&mut self, sync_word: u8) -> Result<(), Error<CommsError, PinError>> {
        self.write_reg(LoRa::SyncWord, sync_word)?;
        self.config.sync_word = sync_word;
        Ok(())
    }

    /// Enable or disable payload CRC generation and checking
    pub fn enable_crc(&mut self, enabled: bool) -> Result<(), Error<CommsError, PinError>> {
        let v = if enabled { RXPAYLOADCRC_ON } else { RXPAYLOADCRC_OFF };
        self.update_reg(LoRa::ModemConfig2, RXPAYLOADCRC_MASK, v)?;
        self.config.crc = enabled;
        Ok(())
    }

    /// Select implicit (fixed length, no header) or explicit header mode
    ///
    /// The register is only written when the mode differs from the last one written.
    pub fn set_implicit_header(&mut self, enabled: bool) -> Result<(), Error<CommsError, PinError>> {
        if self.implicit_header == Some(enabled) {
            return Ok(());
        }

        let v = if enabled {
            IMPLICITHEADER_ENABLE
        } else {
            IMPLICITHEADER_DISABLE
        };
        self.update_reg(LoRa::ModemConfig1, IMPLICITHEADER_MASK, v)?;
        self.implicit_header = Some(enabled);

        Ok(())
    }

    /// Whether implicit header mode is active
    pub fn implicit_header(&self) -> bool {
        self.implicit_header.unwrap_or(false)
    }
}

impl<Base, CommsError, PinError> radio::Interrupts for Sx127x<Base, CommsError, PinError>
where
    Base: Sx127xBase<CommsError, PinError>,
    CommsError: Debug,
    PinError: Debug,
{
    type Irq = Irq;
    type Error = Error<CommsError, PinError>;

    /// Fetch pending LoRa mode interrupts from the device
    /// If the clear option is set, this will also clear any pending flags
    fn get_interrupts(&mut self, clear: bool) -> Result<Self::Irq, Self::Error> {
        if clear {
            return self.irq_flags();
        }

        let reg = self.read_reg(LoRa::IrqFlags)?;
        Ok(Irq::from_bits_truncate(reg))
    }
}

impl<Base, CommsError, PinError> radio::Power for Sx127x<Base, CommsError, PinError>
where
    Base: Sx127xBase<CommsError, PinError>,
    CommsError: Debug,
    PinError: Debug,
{
    type Error = Error<CommsError, PinError>;

    /// Set transmit power on the configured PA output
    fn set_power(&mut self, power: i8) -> Result<(), Error<CommsError, PinError>> {
        let output = self.config.pa_output;
        self.set_tx_power(power, output)
    }
}

impl<Base, CommsError, PinError> radio::Transmit for Sx127x<Base, CommsError, PinError>
where
    Base: Sx127xBase<CommsError, PinError>,
    CommsError: Debug,
    PinError: Debug,
{
    type Error = Error<CommsError, PinError>;

    /// Start sending a packet
    fn start_transmit(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        debug!("Starting send (data: {:?})", data);

        if data.len() > MAX_PKT_LENGTH - FIFO_TX_BASE_ADDR as usize {
            return Err(Error::BufferSize);
        }

        let implicit = self.config.implicit_header;
        self.begin_packet(implicit)?;
        self.write(data)?;

        self.set_state(crate::device::State::Tx)?;

        Ok(())
    }

    /// Check for transmission completion
    /// This method should be polled (or checked following and interrupt) to indicate sending
    /// has completed
    fn check_transmit(&mut self) -> Result<bool, Error<CommsError, PinError>> {
        let irq = self.irq_flags()?;
        debug!("Poll check send, irq: {:?}", irq);

        if irq.contains(Irq::TX_DONE) {
            debug!("Send complete!");
            Ok(true)
        } else {
            debug!("Send pending");
            Ok(false)
        }
    }
}

impl<Base, CommsError, PinError> radio::Receive for Sx127x<Base, CommsError, PinError>
where
    Base: Sx127xBase<CommsError, PinError>,
    CommsError: Debug,
    PinError: Debug,
{
    type Info = PacketInfo;
    type Error = Error<CommsError, PinError>;

    /// Enter continuous receive with explicit headers
    fn start_receive(&mut self) -> Result<(), Self::Error> {
        debug!("Starting receive");
        self.receive(0)
    }

    /// Check receive state
    ///
    /// This returns true if a boolean indicating whether a packet has been received.
    /// The restart option specifies whether transient timeout or CRC errors should be
    /// internally handled (returning Ok(false)) or passed back to the caller as errors.
    fn check_receive(&mut self, restart: bool) -> Result<bool, Self::Error> {
        let irq = self.irq_flags()?;

        if !irq.is_empty() {
            debug!("Poll check receive, irq: {:?}", irq);
        }

        let res = if irq.contains(Irq::CRC_ERROR) {
            debug!("RX CRC error");
            Err(Error::Crc)
        } else if irq.contains(Irq::RX_DONE) {
            debug!("RX complete");
            Ok(true)
        } else if irq.contains(Irq::RX_TIMEOUT) {
            debug!("RX timeout");
            Err(Error::Timeout)
        } else {
            trace!("RX poll");
            Ok(false)
        };

        match (restart, res) {
            (true, Err(_)) => {
                debug!("RX restarting");
                self.start_receive()?;
                Ok(false)
            }
            (_, r) => r,
        }
    }

    /// Fetch a received message
    ///
    /// This copies data into the provided slice and returns the number of bytes received
    /// along with the packet information
    fn get_received(&mut self, buff: &mut [u8]) -> Result<(usize, Self::Info), Self::Error> {
        let n = self.read_payload(buff)?;

        let info = PacketInfo {
            rssi: self.packet_rssi()?,
            snr: self.packet_snr()?,
        };

        debug!("Read data: {:?} info: {:?}", &buff[..n], info);

        Ok((n, info))
    }
}

impl<Base, CommsError, PinError> radio::Rssi for Sx127x<Base, CommsError, PinError>
where
    Base: Sx127xBase<CommsError, PinError>,
    CommsError: Debug,
    PinError: Debug,
{
    type Error = Error<CommsError, PinError>;

    /// Poll for the current channel RSSI
    /// This should only be called in receive mode
    fn poll_rssi(&mut self) -> Result<i16, Error<CommsError, PinError>> {
        self.rssi()
    }
}
