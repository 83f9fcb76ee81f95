//! Simulated I2C bus
//!
//! Routes each transaction to the modelled chip answering on the address, and
//! NACKs addresses nobody answers on, like a real bus would.

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use log::trace;

/// A modelled chip on the bus.
pub trait Device {
    /// 7-bit address the chip answers on.
    fn address(&self) -> u8;

    /// Bytes the controller wrote in one write operation.
    fn write(&mut self, bytes: &[u8]) -> Result<(), ErrorKind>;

    /// Fill `buffer` with the chip's response.
    fn read(&mut self, buffer: &mut [u8]) -> Result<(), ErrorKind>;
}

#[derive(Default)]
pub struct SimulatedBus {
    devices: Vec<Box<dyn Device + Send>>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a chip. Panics if the address is already taken, since two
    /// chips on one address is a wiring mistake.
    pub fn with(mut self, device: impl Device + Send + 'static) -> Self {
        assert!(
            self.devices.iter().all(|d| d.address() != device.address()),
            "address {:#04x} already in use",
            device.address()
        );
        self.devices.push(Box::new(device));
        self
    }
}

impl ErrorType for SimulatedBus {
    type Error = ErrorKind;
}

impl I2c for SimulatedBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let device = self
            .devices
            .iter_mut()
            .find(|d| d.address() == address)
            .ok_or(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))?;

        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    trace!("{:#04x} <- {:02x?}", address, bytes);
                    device.write(bytes)?;
                }
                Operation::Read(buffer) => {
                    device.read(buffer)?;
                    trace!("{:#04x} -> {:02x?}", address, buffer);
                }
            }
        }
        Ok(())
    }
}

/// Byte-addressed register file with an auto-incrementing pointer, the
/// layout most of the modelled chips share.
pub struct RegisterFile {
    pub registers: [u8; 256],
    pub pointer: u8,
}

impl RegisterFile {
    pub const fn new() -> Self {
        Self {
            registers: [0; 256],
            pointer: 0,
        }
    }

    /// Read consecutive registers starting at the pointer.
    pub fn read(&mut self, buffer: &mut [u8]) {
        for byte in buffer {
            *byte = self.registers[self.pointer as usize];
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}
