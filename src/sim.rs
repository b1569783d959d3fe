//! Simulated Sx127x register file for driver tests
//!
//! Models the parts of the device the driver relies on: the FIFO and its address pointer,
//! write-to-clear IRQ flags, transmit completion and the sleep-only long range bit.

use std::vec::Vec;

use crate::base::{Base, Edge};
use crate::device::regs::{Common, LoRa, ADDRESS_MASK, REGISTER_COUNT, WRITE_FLAG};
use crate::device::{
    State, OPMODE_LONGRANGEMODE_MASK, OPMODE_STATE_MASK, SILICON_VERSION,
};
use crate::device::lora::Irq;
use crate::{Error, Sx127x};

pub type SimRadio = Sx127x<Sim, (), ()>;

pub struct Sim {
    pub regs: [u8; REGISTER_COUNT],
    pub fifo: [u8; 256],

    /// (register, value) for every write
    pub writes: Vec<(u8, u8)>,
    /// Register index for every read
    pub reads: Vec<u8>,

    /// Packets transmitted
    pub sent: Vec<Vec<u8>>,
    /// Whether entering TX completes immediately
    pub tx_completes: bool,

    /// Fail every transfer once this many have succeeded
    pub fail_after: Option<usize>,
    pub transfers: usize,

    pub resets: usize,
    pub elapsed_ms: u64,
    pub armed: Option<Edge>,
}

impl Sim {
    pub fn new() -> Self {
        let mut s = Sim {
            regs: [0u8; REGISTER_COUNT],
            fifo: [0u8; 256],
            writes: Vec::new(),
            reads: Vec::new(),
            sent: Vec::new(),
            tx_completes: true,
            fail_after: None,
            transfers: 0,
            resets: 0,
            elapsed_ms: 0,
            armed: None,
        };

        // Power on defaults
        s.set_reg(Common::OpMode, 0x09);
        s.set_reg(Common::PaConfig, 0x4F);
        s.set_reg(Common::Lna, 0x20);
        s.set_reg(Common::Version, SILICON_VERSION);
        s.set_reg(LoRa::ModemConfig1, 0x72);
        s.set_reg(LoRa::ModemConfig2, 0x70);
        s.set_reg(LoRa::ModemConfig3, 0x04);
        s.set_reg(LoRa::PreambleLsb, 0x08);
        s.set_reg(LoRa::PayloadLength, 0x01);
        s.set_reg(LoRa::PayloadMaxLength, 0xFF);
        s.set_reg(LoRa::DetectOptimize, 0xC3);
        s.set_reg(LoRa::DetectionThreshold, 0x0A);
        s.set_reg(LoRa::SyncWord, 0x12);

        s
    }

    pub fn reg<R: Into<u8>>(&self, reg: R) -> u8 {
        self.regs[reg.into() as usize]
    }

    pub fn set_reg<R: Into<u8>>(&mut self, reg: R, value: u8) {
        self.regs[reg.into() as usize] = value;
    }

    pub fn state(&self) -> u8 {
        self.reg(Common::OpMode) & OPMODE_STATE_MASK
    }

    pub fn clear_log(&mut self) {
        self.writes.clear();
        self.reads.clear();
    }

    /// Values written to a register, in order
    pub fn writes_to<R: Into<u8>>(&self, reg: R) -> Vec<u8> {
        let reg = reg.into();
        self.writes.iter().filter(|(r, _)| *r == reg).map(|(_, v)| *v).collect()
    }

    /// Number of reads of a register
    pub fn reads_of<R: Into<u8>>(&self, reg: R) -> usize {
        let reg = reg.into();
        self.reads.iter().filter(|r| **r == reg).count()
    }

    /// Place a received packet in the FIFO at the RX base address and raise `flags`
    pub fn deliver(&mut self, payload: &[u8], flags: Irq) {
        let base = self.reg(LoRa::FifoRxBaseAddr);
        for (i, b) in payload.iter().enumerate() {
            self.fifo[base.wrapping_add(i as u8) as usize] = *b;
        }
        self.set_reg(LoRa::FifoRxCurrentAddr, base);
        self.set_reg(LoRa::RxNbBytes, payload.len() as u8);
        self.regs[LoRa::IrqFlags as usize] |= flags.bits();
    }

    fn write(&mut self, reg: u8, value: u8) {
        self.writes.push((reg, value));

        match reg {
            r if r == Common::Fifo as u8 => {
                let ptr = self.reg(LoRa::FifoAddrPtr);
                self.fifo[ptr as usize] = value;
                self.set_reg(LoRa::FifoAddrPtr, ptr.wrapping_add(1));
            }
            r if r == LoRa::IrqFlags as u8 => {
                self.regs[r as usize] &= !value;
            }
            r if r == Common::OpMode as u8 => {
                let current = self.reg(Common::OpMode);
                if (current ^ value) & OPMODE_LONGRANGEMODE_MASK != 0 {
                    assert_eq!(
                        current & OPMODE_STATE_MASK,
                        State::Sleep as u8,
                        "long range bit changed outside sleep (0x{:02x} -> 0x{:02x})",
                        current,
                        value
                    );
                }
                self.regs[r as usize] = value;

                if value & OPMODE_STATE_MASK == State::Tx as u8 && self.tx_completes {
                    self.complete_tx();
                }
            }
            r => self.regs[r as usize] = value,
        }
    }

    fn complete_tx(&mut self) {
        let base = self.reg(LoRa::FifoTxBaseAddr);
        let len = self.reg(LoRa::PayloadLength);
        let packet = (0..len)
            .map(|i| self.fifo[base.wrapping_add(i) as usize])
            .collect();
        self.sent.push(packet);

        self.regs[LoRa::IrqFlags as usize] |= Irq::TX_DONE.bits();

        let mode = self.reg(Common::OpMode);
        self.set_reg(Common::OpMode, (mode & !OPMODE_STATE_MASK) | State::Standby as u8);
    }

    fn read(&mut self, reg: u8) -> u8 {
        self.reads.push(reg);

        if reg == Common::Fifo as u8 {
            let ptr = self.reg(LoRa::FifoAddrPtr);
            self.set_reg(LoRa::FifoAddrPtr, ptr.wrapping_add(1));
            return self.fifo[ptr as usize];
        }

        self.regs[reg as usize]
    }
}

impl Base<(), ()> for Sim {
    fn transfer(&mut self, addr: u8, value: u8) -> Result<u8, Error<(), ()>> {
        if let Some(n) = self.fail_after {
            if self.transfers >= n {
                return Err(Error::Comms(()));
            }
        }
        self.transfers += 1;

        let reg = addr & ADDRESS_MASK;
        if addr & WRITE_FLAG != 0 {
            self.write(reg, value);
            Ok(0)
        } else {
            Ok(self.read(reg))
        }
    }

    fn reset(&mut self) -> Result<(), Error<(), ()>> {
        self.resets += 1;
        Ok(())
    }

    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_ms += ms as u64;
    }

    fn listen(&mut self, edge: Edge) -> Result<(), Error<(), ()>> {
        self.armed = Some(edge);
        Ok(())
    }

    fn unlisten(&mut self) -> Result<(), Error<(), ()>> {
        self.armed = None;
        Ok(())
    }
}
