//! HDC2010 temperature / humidity sensor
//!
//! Measurements are started on demand by setting the trigger bit of the
//! measurement configuration register; results are read back one byte at a
//! time after a fixed settle delay.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use serde::{Deserialize, Serialize};

use super::Chip;
use crate::calibration::{Calibration, CalibrationOrder, Finalizer, Range, RangeCheck};
use crate::error::{AcquisitionResult, Phase};
use crate::sequencer::{Acquisition, RegisterBus};

pub const ADDRESS: u8 = 0x40;

mod register {
    pub const TEMPERATURE_LOW: u8 = 0x00;
    pub const TEMPERATURE_HIGH: u8 = 0x01;
    pub const HUMIDITY_LOW: u8 = 0x02;
    pub const HUMIDITY_HIGH: u8 = 0x03;
    pub const RESET_DRDY_INT_CONF: u8 = 0x0E;
    pub const MEASUREMENT_CONF: u8 = 0x0F;
}

const SOFT_RESET: u8 = 0x80;
const MEASUREMENT_TRIGGER: u8 = 0x01;

const RESET_SETTLE_MS: u32 = 10;
const REGISTER_SETTLE_MS: u32 = 5;

/// Automatic measurement rate, bits 6:4 of `RESET_DRDY_INT_CONF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum MeasurementRate {
    #[default]
    Manual = 0,
    /// One measurement every 2 minutes
    Every120s = 1,
    /// One measurement every minute
    Every60s = 2,
    Hz0_1 = 3,
    Hz0_2 = 4,
    Hz1 = 5,
    Hz2 = 6,
    Hz5 = 7,
}

impl From<u8> for MeasurementRate {
    fn from(code: u8) -> Self {
        match code {
            1 => MeasurementRate::Every120s,
            2 => MeasurementRate::Every60s,
            3 => MeasurementRate::Hz0_1,
            4 => MeasurementRate::Hz0_2,
            5 => MeasurementRate::Hz1,
            6 => MeasurementRate::Hz2,
            7 => MeasurementRate::Hz5,
            _ => MeasurementRate::Manual,
        }
    }
}

/// Conversion resolution, shared by the temperature and humidity fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    Bits14,
    Bits11,
    Bits9,
}

impl Resolution {
    /// Unknown bit counts fall back to 14 bit.
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            11 => Resolution::Bits11,
            9 => Resolution::Bits9,
            _ => Resolution::Bits14,
        }
    }
}

/// Quantity measured by an [`Hdc2010`] acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Temperature,
    Humidity,
}

impl Quantity {
    /// Low and high data registers
    const fn data_registers(self) -> (u8, u8) {
        match self {
            Quantity::Temperature => (register::TEMPERATURE_LOW, register::TEMPERATURE_HIGH),
            Quantity::Humidity => (register::HUMIDITY_LOW, register::HUMIDITY_HIGH),
        }
    }
}

/// Settings for one HDC2010 measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hdc2010Config {
    pub rate: MeasurementRate,
    pub temperature_resolution: Resolution,
    pub humidity_resolution: Resolution,
    /// Soft-reset the chip before configuring it.
    pub reset: bool,
    pub range: Range,
    pub calibration: Calibration,
}

impl Hdc2010Config {
    pub const DEFAULT_TEMPERATURE: Self = Self {
        rate: MeasurementRate::Manual,
        temperature_resolution: Resolution::Bits9,
        humidity_resolution: Resolution::Bits9,
        reset: true,
        range: Range::new(-40.0, 125.0),
        calibration: Calibration::IDENTITY,
    };

    pub const DEFAULT_HUMIDITY: Self = Self {
        rate: MeasurementRate::Hz1,
        temperature_resolution: Resolution::Bits14,
        humidity_resolution: Resolution::Bits14,
        reset: true,
        range: Range::new(0.0, 100.0),
        calibration: Calibration::IDENTITY,
    };
}

/// Merge the measurement rate into the stored `RESET_DRDY_INT_CONF` byte.
pub const fn encode_rate(current: u8, rate: MeasurementRate) -> u8 {
    (current & 0x8F) | ((rate as u8) << 4)
}

/// Build the `MEASUREMENT_CONF` byte, trigger bit included, from the stored
/// byte.
pub const fn encode_measurement(current: u8, quantity: Quantity, config: &Hdc2010Config) -> u8 {
    let mut value = match quantity {
        Quantity::Temperature => (current & 0xFC) | 0x02,
        Quantity::Humidity => (current & 0xFD) | 0x04,
    };

    value = match config.temperature_resolution {
        Resolution::Bits14 => value & 0x3F,
        Resolution::Bits11 => (value & 0x7F) | 0x40,
        Resolution::Bits9 => (value & 0xBF) | 0x80,
    };

    value = match config.humidity_resolution {
        Resolution::Bits14 => value & 0xCF,
        Resolution::Bits11 => (value & 0xDF) | 0x10,
        Resolution::Bits9 => (value & 0xEF) | 0x20,
    };

    value | MEASUREMENT_TRIGGER
}

/// Temperature in °C from a raw word.
pub fn temperature_celsius(raw: u16) -> f32 {
    raw as f32 * 165.0 / 65536.0 - 40.0
}

/// Relative humidity in % from a raw word.
pub fn humidity_percent(raw: u16) -> f32 {
    raw as f32 / 65536.0 * 100.0
}

/// One HDC2010 measurement path.
#[derive(Debug, Clone, Copy)]
pub struct Hdc2010 {
    pub quantity: Quantity,
    pub config: Hdc2010Config,
}

impl Hdc2010 {
    pub const fn temperature(config: Hdc2010Config) -> Self {
        Self::new(Quantity::Temperature, config)
    }

    pub const fn humidity(config: Hdc2010Config) -> Self {
        Self::new(Quantity::Humidity, config)
    }

    const fn new(quantity: Quantity, config: Hdc2010Config) -> Self {
        Self { quantity, config }
    }

    fn decode(&self, raw: u16) -> f32 {
        match self.quantity {
            Quantity::Temperature => temperature_celsius(raw),
            Quantity::Humidity => humidity_percent(raw),
        }
    }
}

impl Acquisition for Hdc2010 {
    const CHIP: Chip = Chip::Hdc2010;
    const ADDRESS: u8 = ADDRESS;
    const RANGE_CHECK: RangeCheck = RangeCheck::Closed;
    const ORDER: CalibrationOrder = CalibrationOrder::ValidateThenCalibrate;

    /// `MEASUREMENT_CONF` byte written before every sample, built from the
    /// value read during configuration.
    type State = u8;

    fn reset<I: I2c, D: DelayNs>(
        &self,
        bus: &mut RegisterBus<'_, I>,
        delay: &mut D,
    ) -> AcquisitionResult<()> {
        if !self.config.reset {
            return Ok(());
        }

        let current = bus.read_register(register::RESET_DRDY_INT_CONF, Phase::Reset)?;
        bus.write_register(register::RESET_DRDY_INT_CONF, current | SOFT_RESET, Phase::Reset)?;
        delay.delay_ms(RESET_SETTLE_MS);
        Ok(())
    }

    fn configure<I: I2c, D: DelayNs>(
        &self,
        bus: &mut RegisterBus<'_, I>,
        delay: &mut D,
    ) -> AcquisitionResult<u8> {
        let interrupt_conf = bus.read_register(register::RESET_DRDY_INT_CONF, Phase::ReadConfig)?;
        delay.delay_ms(REGISTER_SETTLE_MS);
        let measurement_conf = bus.read_register(register::MEASUREMENT_CONF, Phase::ReadConfig)?;

        bus.write_if_changed(
            register::RESET_DRDY_INT_CONF,
            interrupt_conf,
            encode_rate(interrupt_conf, self.config.rate),
            Phase::WriteConfig,
        )?;
        Ok(encode_measurement(measurement_conf, self.quantity, &self.config))
    }

    fn sample<I: I2c, D: DelayNs>(
        &self,
        measurement: &u8,
        bus: &mut RegisterBus<'_, I>,
        delay: &mut D,
    ) -> AcquisitionResult<f32> {
        delay.delay_ms(REGISTER_SETTLE_MS);
        bus.write_register(register::MEASUREMENT_CONF, *measurement, Phase::Trigger)?;
        delay.delay_ms(REGISTER_SETTLE_MS);

        let (low_register, high_register) = self.quantity.data_registers();
        let low = bus.read_register(low_register, Phase::ReadSample)?;
        let high = bus.read_register(high_register, Phase::ReadSampleHigh)?;

        Ok(self.decode(u16::from_le_bytes([low, high])))
    }

    fn finalizer(&self) -> Finalizer {
        Finalizer {
            chip: Self::CHIP,
            range: self.config.range,
            check: Self::RANGE_CHECK,
            calibration: self.config.calibration,
            order: Self::ORDER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AcquisitionError;
    use crate::sequencer::acquire;
    use crate::statistics::AveragingMode;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    #[test]
    fn test_conversion_formulas() {
        assert_eq!(temperature_celsius(0), -40.0);
        assert_eq!(temperature_celsius(0x8000), 42.5);
        assert_eq!(humidity_percent(0), 0.0);
        assert_eq!(humidity_percent(0x8000), 50.0);
    }

    #[test]
    fn test_rate_encoding_preserves_other_bits() {
        assert_eq!(encode_rate(0xFF, MeasurementRate::Manual), 0x8F);
        assert_eq!(encode_rate(0x8A, MeasurementRate::Hz5), 0xFA);
        assert_eq!(MeasurementRate::from(9), MeasurementRate::Manual);
    }

    #[test]
    fn test_every_rate_code() {
        let table = [
            (0, MeasurementRate::Manual, 0x00),
            (1, MeasurementRate::Every120s, 0x10),
            (2, MeasurementRate::Every60s, 0x20),
            (3, MeasurementRate::Hz0_1, 0x30),
            (4, MeasurementRate::Hz0_2, 0x40),
            (5, MeasurementRate::Hz1, 0x50),
            (6, MeasurementRate::Hz2, 0x60),
            (7, MeasurementRate::Hz5, 0x70),
        ];
        for (code, rate, bits) in table {
            assert_eq!(MeasurementRate::from(code), rate);
            assert_eq!(encode_rate(0x00, rate), bits, "{:?}", rate);
        }
    }

    #[test]
    fn test_measurement_encoding() {
        let humidity = Hdc2010Config::DEFAULT_HUMIDITY;
        assert_eq!(encode_measurement(0x00, Quantity::Humidity, &humidity), 0x05);

        let temperature = Hdc2010Config::DEFAULT_TEMPERATURE;
        // T9 -> 0x80, H9 -> 0x20, temperature mode 0x02, trigger 0x01
        assert_eq!(encode_measurement(0x00, Quantity::Temperature, &temperature), 0xA3);

        let mixed = Hdc2010Config {
            temperature_resolution: Resolution::Bits11,
            humidity_resolution: Resolution::Bits11,
            ..humidity
        };
        assert_eq!(encode_measurement(0xFF, Quantity::Temperature, &mixed), 0x5F);
    }

    #[test]
    fn test_unknown_resolution_falls_back_to_14_bit() {
        assert_eq!(Resolution::from_bits(12), Resolution::Bits14);
        assert_eq!(Resolution::from_bits(11), Resolution::Bits11);
        assert_eq!(Resolution::from_bits(9), Resolution::Bits9);
    }

    #[test]
    fn test_humidity_acquisition_with_calibration() {
        let expectations = [
            I2cTransaction::write_read(ADDRESS, vec![0x0E], vec![0x00]),
            I2cTransaction::write(ADDRESS, vec![0x0E, 0x80]),
            I2cTransaction::write_read(ADDRESS, vec![0x0E], vec![0x00]),
            I2cTransaction::write_read(ADDRESS, vec![0x0F], vec![0x00]),
            I2cTransaction::write(ADDRESS, vec![0x0E, 0x50]),
            I2cTransaction::write(ADDRESS, vec![0x0F, 0x05]),
            I2cTransaction::write_read(ADDRESS, vec![0x02], vec![0x00]),
            I2cTransaction::write_read(ADDRESS, vec![0x03], vec![0x00]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let sensor = Hdc2010::humidity(Hdc2010Config {
            calibration: Calibration::new(1.02, 0.5),
            ..Hdc2010Config::DEFAULT_HUMIDITY
        });

        let reading = acquire(&sensor, &mut i2c, &mut NoopDelay, 1, AveragingMode::Arithmetic);

        assert_eq!(reading, Ok(0.5));
        i2c.done();
    }

    #[test]
    fn test_temperature_without_reset_reads_low_then_high() {
        let config = Hdc2010Config {
            reset: false,
            ..Hdc2010Config::DEFAULT_TEMPERATURE
        };
        let expectations = [
            I2cTransaction::write_read(ADDRESS, vec![0x0E], vec![0x00]),
            I2cTransaction::write_read(ADDRESS, vec![0x0F], vec![0xA2]),
            I2cTransaction::write(ADDRESS, vec![0x0F, 0xA3]),
            I2cTransaction::write_read(ADDRESS, vec![0x00], vec![0x00]),
            I2cTransaction::write_read(ADDRESS, vec![0x01], vec![0x80]),
            I2cTransaction::write(ADDRESS, vec![0x0F, 0xA3]),
            I2cTransaction::write_read(ADDRESS, vec![0x00], vec![0x00]),
            I2cTransaction::write_read(ADDRESS, vec![0x01], vec![0x40]),
        ];
        let mut i2c = I2cMock::new(&expectations);

        let reading = acquire(
            &Hdc2010::temperature(config),
            &mut i2c,
            &mut NoopDelay,
            2,
            AveragingMode::Arithmetic,
        );

        // 42.5 °C and 1.25 °C
        assert_eq!(reading, Ok(21.875));
        i2c.done();
    }

    #[test]
    fn test_high_byte_failure_has_own_phase() {
        let config = Hdc2010Config {
            reset: false,
            ..Hdc2010Config::DEFAULT_HUMIDITY
        };
        let expectations = [
            I2cTransaction::write_read(ADDRESS, vec![0x0E], vec![0x50]),
            I2cTransaction::write_read(ADDRESS, vec![0x0F], vec![0x04]),
            I2cTransaction::write(ADDRESS, vec![0x0F, 0x05]),
            I2cTransaction::write_read(ADDRESS, vec![0x02], vec![0x00]),
            I2cTransaction::write_read(ADDRESS, vec![0x03], vec![0x00])
                .with_error(embedded_hal::i2c::ErrorKind::Other),
        ];
        let mut i2c = I2cMock::new(&expectations);

        let err = acquire(
            &Hdc2010::humidity(config),
            &mut i2c,
            &mut NoopDelay,
            3,
            AveragingMode::Arithmetic,
        )
        .unwrap_err();

        assert_eq!(
            err,
            AcquisitionError::Transport {
                chip: Chip::Hdc2010,
                phase: Phase::ReadSampleHigh,
            }
        );
        assert_eq!(err.sentinel(), -105.0);
        i2c.done();
    }
}
