//! SHT21 temperature / humidity sensor
//!
//! Commands are single bytes; measurements use hold-master mode so the chip
//! stretches the clock until the conversion is done and no polling is needed.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use serde::{Deserialize, Serialize};

use super::Chip;
use crate::calibration::{Calibration, CalibrationOrder, Finalizer, Range, RangeCheck};
use crate::error::{AcquisitionResult, Phase};
use crate::sequencer::{Acquisition, RegisterBus};

pub const ADDRESS: u8 = 0x40;

mod command {
    pub const SOFT_RESET: u8 = 0xFE;
    pub const WRITE_USER_REGISTER: u8 = 0xE6;
    pub const READ_USER_REGISTER: u8 = 0xE7;
    pub const MEASURE_TEMPERATURE_HOLD: u8 = 0xE3;
    pub const MEASURE_HUMIDITY_HOLD: u8 = 0xE5;
}

const RESET_SETTLE_MS: u32 = 15;

/* User register
 * B7    B6   B5   B4   B3   B2    B1         B0
 * RES1  EoB  --   --   --   HTR   OTP-off    RES0
 */
mod user_register {
    pub const RESOLUTION_HIGH: u8 = 1 << 7;
    pub const END_OF_BATTERY: u8 = 1 << 6;
    pub const HEATER: u8 = 1 << 2;
    pub const DISABLE_OTP_RELOAD: u8 = 1 << 1;
    pub const RESOLUTION_LOW: u8 = 1 << 0;
}

/// Measurement resolution. Humidity and temperature resolutions are coupled
/// on this chip, so each variant names both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    /// RH 12 bit, T 14 bit
    #[default]
    Rh12T14,
    /// RH 8 bit, T 12 bit
    Rh8T12,
    /// RH 10 bit, T 13 bit
    Rh10T13,
    /// RH 11 bit, T 11 bit
    Rh11T11,
}

impl Resolution {
    /// Resolution row selected by a temperature bit count. Unknown counts
    /// give the default row.
    pub fn from_temperature_bits(bits: u8) -> Self {
        match bits {
            12 => Resolution::Rh8T12,
            13 => Resolution::Rh10T13,
            11 => Resolution::Rh11T11,
            _ => Resolution::Rh12T14,
        }
    }

    /// Resolution row selected by a humidity bit count. Unknown counts give
    /// the default row.
    pub fn from_humidity_bits(bits: u8) -> Self {
        match bits {
            8 => Resolution::Rh8T12,
            10 => Resolution::Rh10T13,
            11 => Resolution::Rh11T11,
            _ => Resolution::Rh12T14,
        }
    }

    /// User register bits 7 and 0.
    pub const fn register_bits(self) -> u8 {
        match self {
            Resolution::Rh12T14 => 0,
            Resolution::Rh8T12 => user_register::RESOLUTION_LOW,
            Resolution::Rh10T13 => user_register::RESOLUTION_HIGH,
            Resolution::Rh11T11 => {
                user_register::RESOLUTION_HIGH | user_register::RESOLUTION_LOW
            }
        }
    }

    /// Status bits cleared from a temperature word before conversion.
    pub const fn temperature_status_mask(self) -> u16 {
        match self {
            Resolution::Rh12T14 => 0x0003,
            Resolution::Rh10T13 => 0x0004,
            Resolution::Rh8T12 => 0x0005,
            Resolution::Rh11T11 => 0x0006,
        }
    }
}

/// Settings for one SHT21 measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sht21Config {
    pub resolution: Resolution,
    pub end_of_battery: bool,
    pub heater: bool,
    pub disable_otp_reload: bool,
    pub range: Range,
    pub calibration: Calibration,
}

impl Sht21Config {
    pub const DEFAULT_TEMPERATURE: Self = Self {
        resolution: Resolution::Rh12T14,
        end_of_battery: false,
        heater: false,
        disable_otp_reload: true,
        range: Range::new(-40.0, 100.0),
        calibration: Calibration::IDENTITY,
    };

    pub const DEFAULT_HUMIDITY: Self = Self {
        resolution: Resolution::Rh12T14,
        end_of_battery: false,
        heater: false,
        disable_otp_reload: false,
        range: Range::new(0.0, 100.0),
        calibration: Calibration::IDENTITY,
    };

    /// User register byte for these settings.
    pub const fn user_register(&self) -> u8 {
        let mut value = self.resolution.register_bits();
        if self.end_of_battery {
            value |= user_register::END_OF_BATTERY;
        }
        if self.heater {
            value |= user_register::HEATER;
        }
        if self.disable_otp_reload {
            value |= user_register::DISABLE_OTP_RELOAD;
        }
        value
    }
}

/// Clear the status bits the chip leaves in the low end of a temperature word.
pub const fn mask_status_bits(raw: u16, resolution: Resolution) -> u16 {
    raw & !resolution.temperature_status_mask()
}

/// Temperature in °C from a (masked) raw word.
pub fn temperature_celsius(raw: u16) -> f32 {
    -46.85 + 175.72 * raw as f32 / 65536.0
}

/// Relative humidity in % from a raw word.
pub fn humidity_percent(raw: u16) -> f32 {
    -6.0 + 125.0 * raw as f32 / 65536.0
}

/// Quantity measured by an [`Sht21`] acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Temperature,
    Humidity,
}

/// One SHT21 measurement path.
#[derive(Debug, Clone, Copy)]
pub struct Sht21 {
    pub quantity: Quantity,
    pub config: Sht21Config,
}

impl Sht21 {
    pub const fn temperature(config: Sht21Config) -> Self {
        Self {
            quantity: Quantity::Temperature,
            config,
        }
    }

    pub const fn humidity(config: Sht21Config) -> Self {
        Self {
            quantity: Quantity::Humidity,
            config,
        }
    }

    fn decode(&self, raw: u16) -> f32 {
        match self.quantity {
            Quantity::Temperature => {
                temperature_celsius(mask_status_bits(raw, self.config.resolution))
            }
            Quantity::Humidity => humidity_percent(raw),
        }
    }
}

impl Acquisition for Sht21 {
    const CHIP: Chip = Chip::Sht21;
    const ADDRESS: u8 = ADDRESS;
    const RANGE_CHECK: RangeCheck = RangeCheck::Closed;
    const ORDER: CalibrationOrder = CalibrationOrder::ValidateThenCalibrate;

    type State = ();

    fn reset<I: I2c, D: DelayNs>(
        &self,
        bus: &mut RegisterBus<'_, I>,
        delay: &mut D,
    ) -> AcquisitionResult<()> {
        bus.command(&[command::SOFT_RESET], Phase::Reset)?;
        delay.delay_ms(RESET_SETTLE_MS);
        Ok(())
    }

    fn configure<I: I2c, D: DelayNs>(
        &self,
        bus: &mut RegisterBus<'_, I>,
        _delay: &mut D,
    ) -> AcquisitionResult<()> {
        // The user register is read and written through different commands.
        let current = bus.read_register(command::READ_USER_REGISTER, Phase::ReadConfig)?;
        bus.write_if_changed(
            command::WRITE_USER_REGISTER,
            current,
            self.config.user_register(),
            Phase::WriteConfig,
        )?;
        Ok(())
    }

    fn sample<I: I2c, D: DelayNs>(
        &self,
        _state: &(),
        bus: &mut RegisterBus<'_, I>,
        _delay: &mut D,
    ) -> AcquisitionResult<f32> {
        let trigger = match self.quantity {
            Quantity::Temperature => command::MEASURE_TEMPERATURE_HOLD,
            Quantity::Humidity => command::MEASURE_HUMIDITY_HOLD,
        };
        bus.command(&[trigger], Phase::Trigger)?;

        // MSB, LSB, CRC
        let mut data = [0u8; 3];
        bus.read(&mut data, Phase::ReadSample)?;

        Ok(self.decode(u16::from_be_bytes([data[0], data[1]])))
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
