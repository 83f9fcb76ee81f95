//! Public acquisition API
//!
//! [`Environment`] owns the bus handle, the delay source and the
//! per-measurement configuration. Each reading method runs one complete
//! acquisition and borrows `self` mutably, so acquisitions never interleave on
//! the bus.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::config::EnvironmentConfig;
use crate::error::AcquisitionResult;
use crate::sensors::{Hdc2010, Mpl3115a2, Sht21, Tsl2561};
use crate::sequencer::{Acquisition, acquire};
use crate::statistics::AveragingMode;

pub struct Environment<I2C, D> {
    i2c: I2C,
    delay: D,
    config: EnvironmentConfig,
}

impl<I2C, D> Environment<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Environment with the shipped default settings.
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_config(i2c, delay, EnvironmentConfig::DEFAULT)
    }

    pub fn with_config(i2c: I2C, delay: D, config: EnvironmentConfig) -> Self {
        Self { i2c, delay, config }
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Settings changes take effect on the next acquisition.
    pub fn config_mut(&mut self) -> &mut EnvironmentConfig {
        &mut self.config
    }

    /// Hand back the bus and delay.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Run an arbitrary acquisition on the owned bus.
    pub fn acquire<A: Acquisition>(
        &mut self,
        device: &A,
        count: u8,
        mode: impl Into<AveragingMode>,
    ) -> AcquisitionResult<f32> {
        acquire(device, &mut self.i2c, &mut self.delay, count, mode.into())
    }

    /// SHT21 temperature in °C.
    pub fn sht21_temperature(
        &mut self,
        count: u8,
        mode: impl Into<AveragingMode>,
    ) -> AcquisitionResult<f32> {
        let device = Sht21::temperature(self.config.sht21_temperature);
        self.acquire(&device, count, mode)
    }

    /// SHT21 relative humidity in %.
    pub fn sht21_humidity(
        &mut self,
        count: u8,
        mode: impl Into<AveragingMode>,
    ) -> AcquisitionResult<f32> {
        let device = Sht21::humidity(self.config.sht21_humidity);
        self.acquire(&device, count, mode)
    }

    /// HDC2010 temperature in °C.
    pub fn hdc2010_temperature(
        &mut self,
        count: u8,
        mode: impl Into<AveragingMode>,
    ) -> AcquisitionResult<f32> {
        let device = Hdc2010::temperature(self.config.hdc2010_temperature);
        self.acquire(&device, count, mode)
    }

    /// HDC2010 relative humidity in %.
    pub fn hdc2010_humidity(
        &mut self,
        count: u8,
        mode: impl Into<AveragingMode>,
    ) -> AcquisitionResult<f32> {
        let device = Hdc2010::humidity(self.config.hdc2010_humidity);
        self.acquire(&device, count, mode)
    }

    /// MPL3115A2 pressure in hPa.
    pub fn mpl3115a2_pressure(
        &mut self,
        count: u8,
        mode: impl Into<AveragingMode>,
    ) -> AcquisitionResult<f32> {
        let device = Mpl3115a2::new(self.config.mpl3115a2_pressure);
        self.acquire(&device, count, mode)
    }

    /// TSL2561 illuminance in lux.
    pub fn tsl2561_light(
        &mut self,
        count: u8,
        mode: impl Into<AveragingMode>,
    ) -> AcquisitionResult<f32> {
        let device = Tsl2561::new(self.config.tsl2561_light);
        self.acquire(&device, count, mode)
    }
}
