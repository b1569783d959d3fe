//! Sx127x LoRa packet layer
//!
//! FIFO staging and transmission, single and continuous receive, payload extraction
//! and the interrupt driven receive path.
//!
//! Copyright 2019 Ryan Kurte

use core::cmp;

use crate::base::{Base as Sx127xBase, Edge};
use crate::device::lora::{Irq, ModemStatus};
use crate::device::regs::{Common, LoRa};
use crate::device::{
    State, DIOMAPPING1_DIO0_MASK, DIOMAPPING1_DIO0_RXDONE, FIFO_RX_BASE_ADDR, FIFO_TX_BASE_ADDR,
    MAX_PKT_LENGTH, RSSI_HF_THRESHOLD_HZ, RSSI_OFFSET_HF, RSSI_OFFSET_LF,
};
use crate::{Error, ReceiveHandler, Sx127x};

impl<Base, CommsError, PinError> Sx127x<Base, CommsError, PinError>
where
    Base: Sx127xBase<CommsError, PinError>,
{
    /// Prepare for a new outgoing packet, resetting the FIFO pointer and payload length
    pub fn begin_packet(&mut self, implicit_header: bool) -> Result<(), Error<CommsError, PinError>> {
        self.standby()?;
        self.set_implicit_header(implicit_header)?;

        self.write_reg(LoRa::FifoAddrPtr, FIFO_TX_BASE_ADDR)?;
        self.write_reg(LoRa::PayloadLength, 0)?;

        Ok(())
    }

    /// Append data to the packet being built, returning the number of bytes accepted
    ///
    /// Data past the remaining FIFO capacity is dropped.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, Error<CommsError, PinError>> {
        let queued = self.read_reg(LoRa::PayloadLength)? as usize;
        let capacity = MAX_PKT_LENGTH.saturating_sub(FIFO_TX_BASE_ADDR as usize + queued);
        let n = cmp::min(data.len(), capacity);

        if n < data.len() {
            debug!("Packet full, accepted {} of {} bytes", n, data.len());
        }

        for b in &data[..n] {
            self.write_reg(Common::Fifo, *b)?;
        }

        self.write_reg(LoRa::PayloadLength, (queued + n) as u8)?;

        Ok(n)
    }

    /// Send the staged packet and wait for completion
    ///
    /// The device returns to standby on TxDone. If TxDone is not raised within the
    /// configured timeout the device is forced to standby and `Error::Timeout` returned.
    pub fn end_packet(&mut self) -> Result<(), Error<CommsError, PinError>> {
        self.set_state(State::Tx)?;

        let mut waited = 0;
        loop {
            let irq = Irq::from_bits_truncate(self.read_reg(LoRa::IrqFlags)?);
            if irq.contains(Irq::TX_DONE) {
                break;
            }

            if waited >= self.config.tx_timeout_ms {
                warn!("Transmit timeout after {} ms", waited);
                self.standby()?;
                return Err(Error::Timeout);
            }

            self.hal.delay_ms(1);
            waited += 1;
        }

        trace!("Transmit complete after {} ms", waited);

        self.write_reg(LoRa::IrqFlags, Irq::TX_DONE.bits())?;

        Ok(())
    }

    /// Send a complete packet, returning the number of bytes sent
    pub fn transmit(&mut self, data: &[u8], implicit_header: bool) -> Result<usize, Error<CommsError, PinError>> {
        self.begin_packet(implicit_header)?;
        let n = self.write(data)?;
        self.end_packet()?;
        Ok(n)
    }

    /// Apply the receive header mode, a non-zero size selects implicit headers
    fn receive_header_mode(&mut self, size: u8) -> Result<(), Error<CommsError, PinError>> {
        self.set_implicit_header(size > 0)?;
        if size > 0 {
            self.write_reg(LoRa::PayloadLength, size)?;
        }
        Ok(())
    }

    /// Enter continuous receive
    ///
    /// `size` is the fixed payload length in implicit header mode, or 0 for explicit headers.
    pub fn receive(&mut self, size: u8) -> Result<(), Error<CommsError, PinError>> {
        self.receive_header_mode(size)?;

        // The last packet always starts at the current RX address, no FIFO pointer reset
        self.set_state(State::Rx)
    }

    /// Poll for a received packet, arming single receive when none is pending
    ///
    /// Returns true when a packet is ready to be read with [`Sx127x::read_payload`].
    pub fn received_packet(&mut self, size: u8) -> Result<bool, Error<CommsError, PinError>> {
        let irq = self.irq_flags()?;

        self.receive_header_mode(size)?;

        if irq.contains(Irq::RX_DONE) && !irq.intersects(Irq::CRC_ERROR | Irq::RX_TIMEOUT) {
            // Device returns to standby on RxDone
            return Ok(true);
        }

        if !irq.is_empty() {
            debug!("Packet not ready, irq: {:?}", irq);
        }

        if self.get_state()? != State::RxOnce {
            self.write_reg(LoRa::FifoAddrPtr, FIFO_RX_BASE_ADDR)?;
            self.set_state(State::RxOnce)?;
        }

        Ok(false)
    }

    /// Read and clear pending interrupt flags
    pub fn irq_flags(&mut self) -> Result<Irq, Error<CommsError, PinError>> {
        let reg = self.read_reg(LoRa::IrqFlags)?;
        self.write_reg(LoRa::IrqFlags, reg)?;
        Ok(Irq::from_bits_truncate(reg))
    }

    /// Fetch the modem status flags
    pub fn modem_status(&mut self) -> Result<ModemStatus, Error<CommsError, PinError>> {
        let reg = self.read_reg(LoRa::ModemStat)?;
        Ok(ModemStatus::from_bits_truncate(reg))
    }

    /// Copy the last received packet into `buff`, returning its length
    pub fn read_payload(&mut self, buff: &mut [u8]) -> Result<usize, Error<CommsError, PinError>> {
        let current = self.read_reg(LoRa::FifoRxCurrentAddr)?;
        self.write_reg(LoRa::FifoAddrPtr, current)?;

        let len = if self.implicit_header() {
            self.read_reg(LoRa::PayloadLength)?
        } else {
            self.read_reg(LoRa::RxNbBytes)?
        } as usize;

        if buff.len() < len {
            debug!("Receive buffer too small ({} < {})", buff.len(), len);
            return Err(Error::BufferSize);
        }

        for b in buff[..len].iter_mut() {
            *b = self.read_reg(Common::Fifo)?;
        }

        debug!("FIFO RX {} bytes from fifo ptr: {}", len, current);

        Ok(len)
    }

    /// Register or clear the receive handler
    ///
    /// Registering maps DIO0 to RxDone and arms the interrupt on the rising edge,
    /// clearing disarms it. The platform interrupt should call [`Sx127x::handle_interrupt`].
    pub fn on_receive(
        &mut self,
        handler: Option<ReceiveHandler<Base, CommsError, PinError>>,
    ) -> Result<(), Error<CommsError, PinError>> {
        self.on_receive = handler;

        match handler {
            Some(_) => {
                self.update_reg(Common::DioMapping1, DIOMAPPING1_DIO0_MASK, DIOMAPPING1_DIO0_RXDONE)?;
                self.hal.listen(Edge::Rising)
            }
            None => self.hal.unlisten(),
        }
    }

    /// Service a DIO0 interrupt, returning whether the receive handler was called
    ///
    /// Packets failing CRC are dropped without reading the FIFO.
    pub fn handle_interrupt(&mut self) -> Result<bool, Error<CommsError, PinError>> {
        let irq = self.irq_flags()?;
        trace!("Interrupt, irq: {:?}", irq);

        if irq.contains(Irq::CRC_ERROR) {
            debug!("RX CRC error, dropping packet");
            return Ok(false);
        }

        let handler = match self.on_receive {
            Some(h) => h,
            None => return Ok(false),
        };

        let mut buff = [0u8; MAX_PKT_LENGTH];
        let n = self.read_payload(&mut buff)?;

        handler(self, &buff[..n]);

        Ok(true)
    }

    fn rssi_offset(&self) -> i16 {
        if self.frequency < RSSI_HF_THRESHOLD_HZ {
            RSSI_OFFSET_LF
        } else {
            RSSI_OFFSET_HF
        }
    }

    /// RSSI of the last received packet in dBm
    pub fn packet_rssi(&mut self) -> Result<i16, Error<CommsError, PinError>> {
        let raw = self.read_reg(LoRa::PktRssiValue)? as i16;
        Ok(raw + self.rssi_offset())
    }

    /// SNR of the last received packet in dB
    pub fn packet_snr(&mut self) -> Result<f32, Error<CommsError, PinError>> {
        let raw = self.read_reg(LoRa::PktSnrValue)? as i8;
        Ok(raw as f32 * 0.25)
    }

    /// Current channel RSSI in dBm
    pub fn rssi(&mut self) -> Result<i16, Error<CommsError, PinError>> {
        let raw = self.read_reg(LoRa::RssiValue)? as i16;
        Ok(raw + self.rssi_offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Config;
    use crate::sim::{Sim, SimRadio};

    use std::cell::RefCell;
    use std::vec::Vec;

    thread_local! {
        static RECEIVED: RefCell<Vec<Vec<u8>>> = RefCell::new(Vec::new());
    }

    fn record(_radio: &mut SimRadio, data: &[u8]) {
        RECEIVED.with(|r| r.borrow_mut().push(data.to_vec()));
    }

    fn record_and_restart(radio: &mut SimRadio, data: &[u8]) {
        record(radio, data);
        radio.receive(0).unwrap();
    }

    fn received() -> Vec<Vec<u8>> {
        RECEIVED.with(|r| r.borrow().clone())
    }

    fn radio() -> SimRadio {
        SimRadio::new(Sim::new(), &Config::default()).unwrap()
    }

    #[test]
    fn loopback_polled() {
        let mut tx = radio();
        let mut rx = radio();

        let n = tx.transmit(b"hello world", false).unwrap();
        assert_eq!(n, 11);
        assert_eq!(tx.get_state().unwrap(), State::Standby);
        assert_eq!(tx.hal.reg(LoRa::IrqFlags), 0);

        rx.receive(0).unwrap();
        assert_eq!(rx.get_state().unwrap(), State::Rx);
        assert!(!rx.received_packet(0).unwrap());

        let sent = tx.hal.sent.pop().unwrap();
        rx.hal.deliver(&sent, Irq::RX_DONE | Irq::VALID_HEADER);
        assert!(rx.received_packet(0).unwrap());

        let mut buff = [0u8; 32];
        let n = rx.read_payload(&mut buff).unwrap();
        assert_eq!(&buff[..n], b"hello world");
    }

    #[test]
    fn loopback_interrupt() {
        let mut tx = radio();
        let mut rx = radio();

        rx.on_receive(Some(record_and_restart)).unwrap();
        assert_eq!(rx.hal.writes_to(Common::DioMapping1), vec![DIOMAPPING1_DIO0_RXDONE]);
        assert_eq!(rx.hal.armed, Some(Edge::Rising));
        rx.receive(0).unwrap();

        for msg in [&b"one"[..], &b"two"[..]].iter() {
            tx.transmit(msg, false).unwrap();
            let sent = tx.hal.sent.pop().unwrap();
            rx.hal.deliver(&sent, Irq::RX_DONE | Irq::VALID_HEADER);

            assert!(rx.handle_interrupt().unwrap());
            assert_eq!(rx.hal.reg(LoRa::IrqFlags), 0);
            assert_eq!(rx.get_state().unwrap(), State::Rx);
        }

        assert_eq!(received(), vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn on_receive_keeps_other_dio_mappings() {
        let mut rx = radio();
        rx.hal.set_reg(Common::DioMapping1, 0xDA);

        rx.on_receive(Some(record)).unwrap();
        assert_eq!(rx.hal.reg(Common::DioMapping1), 0x1A);

        rx.on_receive(None).unwrap();
        assert_eq!(rx.hal.reg(Common::DioMapping1), 0x1A);
    }

    #[test]
    fn interrupt_crc_error_drops_packet() {
        let mut rx = radio();
        rx.on_receive(Some(record)).unwrap();
        rx.receive(0).unwrap();

        rx.hal.deliver(b"corrupt", Irq::RX_DONE | Irq::CRC_ERROR);
        rx.hal.clear_log();

        assert!(!rx.handle_interrupt().unwrap());
        assert!(received().is_empty());
        assert_eq!(rx.hal.reads_of(Common::Fifo), 0);
        assert_eq!(rx.hal.reads_of(LoRa::FifoRxCurrentAddr), 0);
        assert_eq!(rx.hal.reg(LoRa::IrqFlags), 0);
    }

    #[test]
    fn interrupt_without_handler() {
        let mut rx = radio();
        rx.on_receive(Some(record)).unwrap();
        rx.on_receive(None).unwrap();
        assert_eq!(rx.hal.armed, None);

        rx.hal.deliver(b"ignored", Irq::RX_DONE);
        rx.hal.clear_log();

        assert!(!rx.handle_interrupt().unwrap());
        assert!(received().is_empty());
        assert_eq!(rx.hal.reads_of(Common::Fifo), 0);
    }

    #[test]
    fn write_limited_to_capacity() {
        let mut r = radio();
        r.begin_packet(false).unwrap();

        assert_eq!(r.write(&[0xAA; 200]).unwrap(), 200);
        assert_eq!(r.hal.reg(LoRa::PayloadLength), 200);

        assert_eq!(r.write(&[0x55; 100]).unwrap(), 55);
        assert_eq!(r.hal.reg(LoRa::PayloadLength), 255);

        assert_eq!(r.write(&[0x11; 4]).unwrap(), 0);
        assert_eq!(r.hal.reg(LoRa::PayloadLength), 255);

        r.end_packet().unwrap();
        let sent = &r.hal.sent[0];
        assert_eq!(sent.len(), 255);
        assert!(sent[..200].iter().all(|b| *b == 0xAA));
        assert!(sent[200..].iter().all(|b| *b == 0x55));
    }

    #[test]
    fn begin_packet_resets_staging() {
        let mut r = radio();
        r.begin_packet(false).unwrap();
        r.write(b"stale").unwrap();

        r.begin_packet(false).unwrap();
        assert_eq!(r.hal.reg(LoRa::PayloadLength), 0);
        assert_eq!(r.hal.reg(LoRa::FifoAddrPtr), FIFO_TX_BASE_ADDR);
        assert_eq!(r.get_state().unwrap(), State::Standby);

        r.write(b"new").unwrap();
        r.end_packet().unwrap();
        assert_eq!(r.hal.sent, vec![b"new".to_vec()]);
    }

    #[test]
    fn end_packet_times_out() {
        let config = Config { tx_timeout_ms: 20, ..Config::default() };
        let mut r = SimRadio::new(Sim::new(), &config).unwrap();
        r.hal.tx_completes = false;

        r.begin_packet(false).unwrap();
        r.write(b"lost").unwrap();
        let elapsed = r.hal.elapsed_ms;

        assert_eq!(r.end_packet(), Err(Error::Timeout));
        assert_eq!(r.hal.elapsed_ms - elapsed, 20);
        assert_eq!(r.get_state().unwrap(), State::Standby);
        assert!(r.hal.sent.is_empty());
    }

    #[test]
    fn implicit_header_payload_length() {
        let mut r = radio();
        r.receive(5).unwrap();
        assert!(r.implicit_header());
        assert_eq!(r.hal.reg(LoRa::PayloadLength), 5);

        r.hal.deliver(b"fixed", Irq::RX_DONE);
        r.hal.set_reg(LoRa::RxNbBytes, 9);

        let mut buff = [0u8; 16];
        let n = r.read_payload(&mut buff).unwrap();
        assert_eq!(&buff[..n], b"fixed");

        r.receive(0).unwrap();
        assert!(!r.implicit_header());
    }

    #[test]
    fn implicit_header_transmit() {
        let mut r = radio();
        r.transmit(b"abc", true).unwrap();
        assert!(r.implicit_header());
        assert_eq!(r.hal.reg(LoRa::ModemConfig1) & 0x01, 0x01);
        assert_eq!(r.hal.sent, vec![b"abc".to_vec()]);
    }

    #[test]
    fn read_payload_buffer_too_small() {
        let mut r = radio();
        r.receive(0).unwrap();
        r.hal.deliver(b"too long", Irq::RX_DONE);

        let mut buff = [0u8; 4];
        assert_eq!(r.read_payload(&mut buff), Err(Error::BufferSize));
    }

    #[test]
    fn received_packet_arms_single_receive() {
        let mut r = radio();
        r.hal.set_reg(LoRa::FifoAddrPtr, 0x33);

        assert!(!r.received_packet(0).unwrap());
        assert_eq!(r.get_state().unwrap(), State::RxOnce);
        assert_eq!(r.hal.reg(LoRa::FifoAddrPtr), FIFO_RX_BASE_ADDR);

        // Already armed, no mode change
        r.hal.clear_log();
        assert!(!r.received_packet(0).unwrap());
        assert!(r.hal.writes_to(Common::OpMode).is_empty());
    }

    #[test]
    fn received_packet_flag_handling() {
        let cases = [
            (Irq::RX_DONE, true),
            (Irq::RX_DONE | Irq::VALID_HEADER, true),
            (Irq::RX_DONE | Irq::CRC_ERROR, false),
            (Irq::RX_DONE | Irq::RX_TIMEOUT, false),
            (Irq::RX_TIMEOUT, false),
            (Irq::VALID_HEADER, false),
        ];

        for (flags, ready) in cases.iter() {
            let mut r = radio();
            r.hal.deliver(b"x", *flags);

            assert_eq!(r.received_packet(0).unwrap(), *ready, "flags: {:?}", flags);
            assert_eq!(r.hal.reg(LoRa::IrqFlags), 0);

            let state = r.get_state().unwrap();
            if *ready {
                assert_eq!(state, State::Standby);
            } else {
                assert_eq!(state, State::RxOnce);
            }
        }
    }

    #[test]
    fn irq_flags_clears_only_read_bits() {
        let mut r = radio();
        r.hal.set_reg(LoRa::IrqFlags, 0x48);

        let irq = r.irq_flags().unwrap();
        assert_eq!(irq, Irq::RX_DONE | Irq::TX_DONE);
        assert_eq!(r.hal.writes_to(LoRa::IrqFlags), vec![0x48]);
        assert_eq!(r.hal.reg(LoRa::IrqFlags), 0);
    }

    #[test]
    fn packet_rssi_offsets() {
        let mut r = radio();
        r.hal.set_reg(LoRa::PktRssiValue, 100);
        r.hal.set_reg(LoRa::RssiValue, 40);
        assert_eq!(r.packet_rssi().unwrap(), -64);
        assert_eq!(r.rssi().unwrap(), -124);

        r.set_frequency(867_999_999).unwrap();
        assert_eq!(r.packet_rssi().unwrap(), -64);

        r.set_frequency(868_000_000).unwrap();
        assert_eq!(r.packet_rssi().unwrap(), -57);
        assert_eq!(r.rssi().unwrap(), -117);
    }

    #[test]
    fn packet_snr_is_signed_quarter_db() {
        let mut r = radio();

        r.hal.set_reg(LoRa::PktSnrValue, 0x14);
        assert_eq!(r.packet_snr().unwrap(), 5.0);

        r.hal.set_reg(LoRa::PktSnrValue, 0xEC);
        assert_eq!(r.packet_snr().unwrap(), -5.0);

        r.hal.set_reg(LoRa::PktSnrValue, 0x01);
        assert_eq!(r.packet_snr().unwrap(), 0.25);
    }

    #[test]
    fn modem_status_flags() {
        let mut r = radio();
        r.hal.set_reg(LoRa::ModemStat, 0x0B);
        let status = r.modem_status().unwrap();
        assert!(status.contains(ModemStatus::HEADER_VALID | ModemStatus::SIGNAL_DETECTED));
        assert!(!status.contains(ModemStatus::RX_ONGOING));
    }
}
