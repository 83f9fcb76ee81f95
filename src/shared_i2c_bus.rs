//! Blocking I2C bus sharing
//!
//! Several chips of this crate sit on one physical bus. [`SharedI2cBus`] owns
//! the bus behind an `embassy_sync` blocking mutex and hands out
//! [`SharedI2cDevice`] handles that each implement the blocking
//! `embedded_hal::i2c::I2c` trait, locking the bus for the duration of one
//! transaction.
//!
//! Locking is per transaction. Callers that need a whole acquisition to be
//! exclusive (no foreign transaction between reset and the last sample) run
//! acquisitions from a single owner, which [`Environment`](crate::Environment)
//! enforces through `&mut self`.
//!
//! # Example
//!
//! ```ignore
//! use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
//!
//! let bus: SharedI2cBus<CriticalSectionRawMutex, _> = SharedI2cBus::new(i2c);
//! let mut climate = Environment::new(bus.device(), delay);
//! let mut light = bus.device();
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::i2c::{ErrorType, I2c, Operation};

/// A bus shared by several device handles.
pub struct SharedI2cBus<M: RawMutex, T> {
    bus: Mutex<M, RefCell<T>>,
}

impl<M: RawMutex, T> SharedI2cBus<M, T> {
    pub const fn new(bus: T) -> Self {
        Self {
            bus: Mutex::new(RefCell::new(bus)),
        }
    }

    /// New handle onto the bus.
    #[inline]
    pub fn device(&self) -> SharedI2cDevice<'_, M, T> {
        SharedI2cDevice { bus: &self.bus }
    }

    /// Give the bus back once every handle is gone.
    pub fn into_inner(self) -> T {
        self.bus.into_inner().into_inner()
    }
}

/// One device's view of a [`SharedI2cBus`].
pub struct SharedI2cDevice<'a, M: RawMutex, T> {
    bus: &'a Mutex<M, RefCell<T>>,
}

impl<M: RawMutex, T> SharedI2cDevice<'_, M, T> {
    #[inline]
    fn with_bus<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        self.bus.lock(|bus| f(&mut bus.borrow_mut()))
    }
}

impl<M: RawMutex, T> ErrorType for SharedI2cDevice<'_, M, T>
where
    T: ErrorType,
{
    type Error = T::Error;
}

impl<M: RawMutex, T> I2c for SharedI2cDevice<'_, M, T>
where
    T: I2c,
{
    #[inline]
    fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        self.with_bus(|bus| bus.read(address, read))
    }

    #[inline]
    fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        self.with_bus(|bus| bus.write(address, write))
    }

    #[inline]
    fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.with_bus(|bus| bus.write_read(address, write, read))
    }

    #[inline]
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.with_bus(|bus| bus.transaction(address, operations))
    }
}
