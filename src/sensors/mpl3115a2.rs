//! MPL3115A2 barometric pressure sensor
//!
//! Runs in barometer mode. The chip converts continuously once active, and each
//! sample waits for the pressure-data-ready flag before reading the 20-bit
//! result.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::warn;
use serde::{Deserialize, Serialize};

use super::Chip;
use crate::calibration::{Calibration, CalibrationOrder, Finalizer, Range, RangeCheck};
use crate::error::{AcquisitionError, AcquisitionResult, Phase};
use crate::sequencer::{Acquisition, ReadyPoll, RegisterBus};

pub const ADDRESS: u8 = 0x60;

/// Expected `WHO_AM_I` value
pub const DEVICE_ID: u8 = 0xC4;

mod register {
    pub const STATUS: u8 = 0x00;
    pub const OUT_P_MSB: u8 = 0x01;
    pub const WHO_AM_I: u8 = 0x0C;
    pub const PT_DATA_CFG: u8 = 0x13;
    pub const CTRL_REG1: u8 = 0x26;
}

/// `STATUS` pressure data ready
const PDR: u8 = 1 << 2;
/// `CTRL_REG1` active mode
const SBYB: u8 = 1 << 0;
/// Data-ready event flags for pressure and temperature
const DATA_EVENT_FLAGS: u8 = 0x07;

const READY_POLL: ReadyPoll = ReadyPoll {
    attempts: 50,
    interval_ms: 50,
};

/// Wait after each sample so consecutive reads see a fresh conversion.
const SAMPLE_SPACING_MS: u32 = 512;

/// Oversampling ratio, `CTRL_REG1` bits 5:3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Oversampling {
    X1 = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
    X32 = 5,
    X64 = 6,
    #[default]
    X128 = 7,
}

impl From<u8> for Oversampling {
    /// Takes the ratio itself (1, 2, ... 128). Anything else selects 128×.
    fn from(ratio: u8) -> Self {
        match ratio {
            1 => Oversampling::X1,
            2 => Oversampling::X2,
            4 => Oversampling::X4,
            8 => Oversampling::X8,
            16 => Oversampling::X16,
            32 => Oversampling::X32,
            64 => Oversampling::X64,
            _ => Oversampling::X128,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mpl3115a2Config {
    pub oversampling: Oversampling,
    pub range: Range,
    pub calibration: Calibration,
}

impl Mpl3115a2Config {
    pub const DEFAULT: Self = Self {
        oversampling: Oversampling::X128,
        range: Range::new(500.0, 11000.0),
        calibration: Calibration::IDENTITY,
    };
}

impl Default for Mpl3115a2Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// `CTRL_REG1` for barometer mode at the given oversampling.
pub const fn encode_control(oversampling: Oversampling) -> u8 {
    ((oversampling as u8) << 3) | SBYB
}

/// 20-bit pressure word from the three `OUT_P` bytes.
pub const fn raw_pressure(data: [u8; 3]) -> u32 {
    u32::from_be_bytes([0, data[0], data[1], data[2]]) >> 4
}

/// Pressure in hPa from a 20-bit word (Q18.2 Pascal).
pub fn pressure_hpa(raw: u32) -> f32 {
    (raw as f32 / 4.0) / 100.0
}

#[derive(Debug, Clone, Copy)]
pub struct Mpl3115a2 {
    pub config: Mpl3115a2Config,
}

impl Mpl3115a2 {
    pub const fn new(config: Mpl3115a2Config) -> Self {
        Self { config }
    }
}

impl Acquisition for Mpl3115a2 {
    const CHIP: Chip = Chip::Mpl3115a2;
    const ADDRESS: u8 = ADDRESS;
    const RANGE_CHECK: RangeCheck = RangeCheck::Open;
    const ORDER: CalibrationOrder = CalibrationOrder::CalibrateThenValidate;

    type State = ();

    fn identify<I: I2c>(&self, bus: &mut RegisterBus<'_, I>) -> AcquisitionResult<()> {
        let id = bus.read_register(register::WHO_AM_I, Phase::Identify)?;
        if id != DEVICE_ID {
            warn!("{}: WHO_AM_I is {:#04x}, expected {:#04x}", Self::CHIP, id, DEVICE_ID);
            return Err(AcquisitionError::UnknownDevice {
                chip: Self::CHIP,
                id,
            });
        }
        Ok(())
    }

    fn configure<I: I2c, D: DelayNs>(
        &self,
        bus: &mut RegisterBus<'_, I>,
        _delay: &mut D,
    ) -> AcquisitionResult<()> {
        let control = bus.read_register(register::CTRL_REG1, Phase::ReadConfig)?;
        bus.write_if_changed(
            register::CTRL_REG1,
            control,
            encode_control(self.config.oversampling),
            Phase::WriteConfig,
        )?;

        let data_config = bus.read_register(register::PT_DATA_CFG, Phase::ReadConfig)?;
        bus.write_if_changed(
            register::PT_DATA_CFG,
            data_config,
            DATA_EVENT_FLAGS,
            Phase::WriteDataConfig,
        )?;
        Ok(())
    }

    fn sample<I: I2c, D: DelayNs>(
        &self,
        _state: &(),
        bus: &mut RegisterBus<'_, I>,
        delay: &mut D,
    ) -> AcquisitionResult<f32> {
        bus.poll_ready(register::STATUS, PDR, READY_POLL, delay)?;

        let mut data = [0u8; 3];
        bus.read_into(register::OUT_P_MSB, &mut data, Phase::ReadSample)?;

        delay.delay_ms(SAMPLE_SPACING_MS);
        Ok(pressure_hpa(raw_pressure(data)))
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
