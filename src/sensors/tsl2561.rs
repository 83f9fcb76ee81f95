//! TSL2561 ambient light sensor
//!
//! Two photodiode channels (visible + IR, IR only) are integrated over a
//! programmable window and combined into lux with the fixed-point
//! approximation from the datasheet.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::warn;
use serde::{Deserialize, Serialize};

use super::Chip;
use crate::calibration::{Calibration, CalibrationOrder, Finalizer, Range, RangeCheck};
use crate::error::{AcquisitionError, AcquisitionResult, Phase};
use crate::sequencer::{Acquisition, RegisterBus};

pub const ADDRESS: u8 = 0x39;

/// Accepted `ID` register values
pub const DEVICE_IDS: [u8; 2] = [0x50, 0xFF];

/// Every register access goes through the command register.
const COMMAND: u8 = 0x80;

mod register {
    pub const CONTROL: u8 = 0x00;
    pub const TIMING: u8 = 0x01;
    pub const ID: u8 = 0x0A;
    pub const DATA0_LOW: u8 = 0x0C;
    pub const DATA0_HIGH: u8 = 0x0D;
    pub const DATA1_LOW: u8 = 0x0E;
    pub const DATA1_HIGH: u8 = 0x0F;
}

const POWER_ON: u8 = 0x03;
const POWER_OFF: u8 = 0x00;

const TIMING_INTEGRATION_MASK: u8 = 0b0000_0011;
const TIMING_GAIN: u8 = 0b0001_0000;

const SETTLE_MS: u32 = 50;

// Fixed-point lux approximation
const LUX_SCALE: u32 = 14;
const RATIO_SCALE: u32 = 9;
const CH_SCALE: u32 = 10;
const CH_SCALE_13MS: u64 = 0x7517;
const CH_SCALE_101MS: u64 = 0x0FE7;

/// `(ratio upper bound, B, M)` per band; ratios above the last bound give 0.
const LUX_BANDS: [(u64, i64, i64); 7] = [
    (0x0040, 0x01F2, 0x01BE),
    (0x0080, 0x0214, 0x02D1),
    (0x00C0, 0x023F, 0x037B),
    (0x0100, 0x0270, 0x03FE),
    (0x0138, 0x016F, 0x01FC),
    (0x019A, 0x00D2, 0x00FB),
    (0x029A, 0x0018, 0x0012),
];

/// ADC integration window, `TIMING` bits 1:0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Integration {
    #[default]
    Ms13_7,
    Ms101,
    Ms402,
}

impl Integration {
    const fn bits(self) -> u8 {
        match self {
            Integration::Ms13_7 => 0b00,
            Integration::Ms101 => 0b01,
            Integration::Ms402 => 0b10,
        }
    }

    /// Time to wait for one full integration cycle.
    pub const fn wait_ms(self) -> u32 {
        match self {
            Integration::Ms13_7 => 14,
            Integration::Ms101 => 102,
            Integration::Ms402 => 403,
        }
    }

    /// Channel normalisation to the 402 ms window, Q10.
    const fn channel_scale(self) -> u64 {
        match self {
            Integration::Ms13_7 => CH_SCALE_13MS,
            Integration::Ms101 => CH_SCALE_101MS,
            Integration::Ms402 => 1 << CH_SCALE,
        }
    }
}

impl From<u8> for Integration {
    /// Codes 1..=3 select 13.7 / 101 / 402 ms. Anything else is 13.7 ms.
    fn from(code: u8) -> Self {
        match code {
            2 => Integration::Ms101,
            3 => Integration::Ms402,
            _ => Integration::Ms13_7,
        }
    }
}

/// Analog gain, `TIMING` bit 4.
///
/// Only programs the chip. [`lux`] applies the same channel scale whichever
/// gain is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gain {
    /// 1×
    Low,
    /// 16×
    #[default]
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tsl2561Config {
    pub integration: Integration,
    pub gain: Gain,
    pub range: Range,
    pub calibration: Calibration,
}

impl Tsl2561Config {
    pub const DEFAULT: Self = Self {
        integration: Integration::Ms13_7,
        gain: Gain::High,
        range: Range::new(0.0, 40000.0),
        calibration: Calibration::IDENTITY,
    };
}

impl Default for Tsl2561Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Merge integration time and gain into the stored `TIMING` byte.
pub const fn encode_timing(current: u8, integration: Integration, gain: Gain) -> u8 {
    let mut value = (current & !(TIMING_INTEGRATION_MASK | TIMING_GAIN)) | integration.bits();
    if let Gain::High = gain {
        value |= TIMING_GAIN;
    }
    value
}

/// `(B, M)` coefficients for a rounded channel ratio.
fn coefficients(ratio: u64) -> (i64, i64) {
    LUX_BANDS
        .iter()
        .find(|(bound, _, _)| ratio <= *bound)
        .map_or((0, 0), |&(_, b, m)| (b, m))
}

/// Lux from the raw channel counts.
pub fn lux(ch0: u16, ch1: u16, integration: Integration) -> u32 {
    let scale = integration.channel_scale();
    let channel0 = (u64::from(ch0) * scale) >> CH_SCALE;
    let channel1 = (u64::from(ch1) * scale) >> CH_SCALE;

    let ratio1 = if channel0 == 0 {
        0
    } else {
        (channel1 << (RATIO_SCALE + 1)) / channel0
    };
    let ratio = (ratio1 + 1) >> 1;

    let (b, m) = coefficients(ratio);

    let temp = (channel0 as i64 * b - channel1 as i64 * m).max(0);
    ((temp + (1 << (LUX_SCALE - 1))) >> LUX_SCALE) as u32
}

#[derive(Debug, Clone, Copy)]
pub struct Tsl2561 {
    pub config: Tsl2561Config,
}

impl Tsl2561 {
    pub const fn new(config: Tsl2561Config) -> Self {
        Self { config }
    }
}

impl Acquisition for Tsl2561 {
    const CHIP: Chip = Chip::Tsl2561;
    const ADDRESS: u8 = ADDRESS;
    const RANGE_CHECK: RangeCheck = RangeCheck::Closed;
    const ORDER: CalibrationOrder = CalibrationOrder::ValidateThenCalibrate;

    type State = ();

    fn identify<I: I2c>(&self, bus: &mut RegisterBus<'_, I>) -> AcquisitionResult<()> {
        let id = bus.read_register(COMMAND | register::ID, Phase::Identify)?;
        if !DEVICE_IDS.contains(&id) {
            warn!("{}: unrecognised ID {:#04x}", Self::CHIP, id);
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
        delay: &mut D,
    ) -> AcquisitionResult<()> {
        let timing = bus.read_register(COMMAND | register::TIMING, Phase::ReadConfig)?;
        let desired = encode_timing(timing, self.config.integration, self.config.gain);
        let written =
            bus.write_if_changed(COMMAND | register::TIMING, timing, desired, Phase::WriteConfig)?;
        if written {
            delay.delay_ms(SETTLE_MS);
        }

        bus.write_register(COMMAND | register::CONTROL, POWER_ON, Phase::PowerUp)
    }

    fn sample<I: I2c, D: DelayNs>(
        &self,
        _state: &(),
        bus: &mut RegisterBus<'_, I>,
        delay: &mut D,
    ) -> AcquisitionResult<f32> {
        delay.delay_ms(self.config.integration.wait_ms());

        let mut bytes = [0u8; 4];
        let registers = [
            register::DATA0_LOW,
            register::DATA0_HIGH,
            register::DATA1_LOW,
            register::DATA1_HIGH,
        ];
        for (byte, data_register) in bytes.iter_mut().zip(registers) {
            *byte = bus.read_register(COMMAND | data_register, Phase::ReadSample)?;
        }

        let ch0 = u16::from_le_bytes([bytes[0], bytes[1]]);
        let ch1 = u16::from_le_bytes([bytes[2], bytes[3]]);
        Ok(lux(ch0, ch1, self.config.integration) as f32)
    }

    fn finish<I: I2c, D: DelayNs>(
        &self,
        bus: &mut RegisterBus<'_, I>,
        delay: &mut D,
    ) -> AcquisitionResult<()> {
        bus.write_register(COMMAND | register::CONTROL, POWER_OFF, Phase::PowerDown)?;
        delay.delay_ms(SETTLE_MS);
        Ok(())
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
    use crate::sequencer::acquire;
    use crate::statistics::AveragingMode;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    fn channel_reads(ch0: u16, ch1: u16) -> [I2cTransaction; 4] {
        let [c0l, c0h] = ch0.to_le_bytes();
        let [c1l, c1h] = ch1.to_le_bytes();
        [
            I2cTransaction::write_read(ADDRESS, vec![0x8C], vec![c0l]),
            I2cTransaction::write_read(ADDRESS, vec![0x8D], vec![c0h]),
            I2cTransaction::write_read(ADDRESS, vec![0x8E], vec![c1l]),
            I2cTransaction::write_read(ADDRESS, vec![0x8F], vec![c1h]),
        ]
    }

    #[test]
    fn test_timing_encoding_preserves_other_bits() {
        assert_eq!(encode_timing(0x00, Integration::Ms13_7, Gain::High), 0x10);
        assert_eq!(encode_timing(0x12, Integration::Ms13_7, Gain::High), 0x10);
        assert_eq!(encode_timing(0xFF, Integration::Ms402, Gain::Low), 0xEE);
        assert_eq!(encode_timing(0x08, Integration::Ms101, Gain::High), 0x19);
        assert_eq!(Integration::from(7), Integration::Ms13_7);
    }

    #[test]
    fn test_lux() {
        // ratio 0 at 13.7 ms: 100 counts scale to 2927
        assert_eq!(lux(100, 0, Integration::Ms13_7), 89);
        // ratio 0x66 at 402 ms
        assert_eq!(lux(1000, 200, Integration::Ms402), 24);
        assert_eq!(lux(1000, 200, Integration::Ms101), 94);
        // IR dominated, past the last band
        assert_eq!(lux(100, 200, Integration::Ms402), 0);
        assert_eq!(lux(0, 0, Integration::Ms101), 0);
    }

    #[test]
    fn test_band_bounds_are_inclusive() {
        let table = [
            (0x0000, (0x01F2, 0x01BE)),
            (0x0040, (0x01F2, 0x01BE)),
            (0x0041, (0x0214, 0x02D1)),
            (0x0080, (0x0214, 0x02D1)),
            (0x0081, (0x023F, 0x037B)),
            (0x00C0, (0x023F, 0x037B)),
            (0x00C1, (0x0270, 0x03FE)),
            (0x0100, (0x0270, 0x03FE)),
            (0x0101, (0x016F, 0x01FC)),
            (0x0138, (0x016F, 0x01FC)),
            (0x0139, (0x00D2, 0x00FB)),
            (0x019A, (0x00D2, 0x00FB)),
            (0x019B, (0x0018, 0x0012)),
            (0x029A, (0x0018, 0x0012)),
            (0x029B, (0, 0)),
        ];
        for (ratio, expected) in table {
            assert_eq!(coefficients(ratio), expected, "ratio {:#06x}", ratio);
        }
    }

    #[test]
    fn test_lux_at_band_bounds() {
        // ch0 = 40960 at 402 ms makes ch1 = 80 * ratio land exactly on `ratio`.
        let table = [
            (0x0040, 1106, 1101),
            (0x0080, 879, 876),
            (0x00C0, 602, 597),
            (0x0100, 283, 280),
            (0x0138, 144, 141),
            (0x019A, 23, 24),
            (0x029A, 1, 0),
        ];
        for (bound, at, past) in table {
            let ch1 = 80 * bound;
            assert_eq!(lux(40_960, ch1, Integration::Ms402), at, "bound {:#06x}", bound);
            assert_eq!(lux(40_960, ch1 + 80, Integration::Ms402), past, "past {:#06x}", bound);
        }
    }

    #[test]
    fn test_low_gain_uses_same_channel_scale() {
        let config = Tsl2561Config {
            integration: Integration::Ms402,
            gain: Gain::Low,
            ..Tsl2561Config::DEFAULT
        };
        let mut expectations = vec![
            I2cTransaction::write_read(ADDRESS, vec![0x8A], vec![0x50]),
            I2cTransaction::write_read(ADDRESS, vec![0x81], vec![0x02]),
            I2cTransaction::write(ADDRESS, vec![0x80, 0x03]),
        ];
        expectations.extend(channel_reads(1000, 200));
        expectations.push(I2cTransaction::write(ADDRESS, vec![0x80, 0x00]));
        let mut i2c = I2cMock::new(&expectations);

        let reading = acquire(
            &Tsl2561::new(config),
            &mut i2c,
            &mut NoopDelay,
            1,
            AveragingMode::Arithmetic,
        );

        assert_eq!(reading, Ok(24.0));
        i2c.done();
    }

    #[test]
    fn test_light_acquisition() {
        let mut expectations = vec![
            I2cTransaction::write_read(ADDRESS, vec![0x8A], vec![0x50]),
            I2cTransaction::write_read(ADDRESS, vec![0x81], vec![0x12]),
            I2cTransaction::write(ADDRESS, vec![0x81, 0x10]),
            I2cTransaction::write(ADDRESS, vec![0x80, 0x03]),
        ];
        expectations.extend(channel_reads(100, 0));
        expectations.push(I2cTransaction::write(ADDRESS, vec![0x80, 0x00]));
        let mut i2c = I2cMock::new(&expectations);

        let reading = acquire(
            &Tsl2561::new(Tsl2561Config::DEFAULT),
            &mut i2c,
            &mut NoopDelay,
            1,
            AveragingMode::Arithmetic,
        );

        assert_eq!(reading, Ok(89.0));
        i2c.done();
    }

    #[test]
    fn test_unchanged_timing_is_not_rewritten() {
        let config = Tsl2561Config {
            integration: Integration::Ms402,
            ..Tsl2561Config::DEFAULT
        };
        let mut expectations = vec![
            I2cTransaction::write_read(ADDRESS, vec![0x8A], vec![0xFF]),
            I2cTransaction::write_read(ADDRESS, vec![0x81], vec![0x12]),
            I2cTransaction::write(ADDRESS, vec![0x80, 0x03]),
        ];
        expectations.extend(channel_reads(1000, 200));
        expectations.extend(channel_reads(1000, 200));
        expectations.push(I2cTransaction::write(ADDRESS, vec![0x80, 0x00]));
        let mut i2c = I2cMock::new(&expectations);

        let reading = acquire(
            &Tsl2561::new(config),
            &mut i2c,
            &mut NoopDelay,
            2,
            AveragingMode::Median,
        );

        assert_eq!(reading, Ok(24.0));
        i2c.done();
    }

    #[test]
    fn test_unknown_id_touches_no_configuration() {
        let expectations = [I2cTransaction::write_read(ADDRESS, vec![0x8A], vec![0x12])];
        let mut i2c = I2cMock::new(&expectations);

        let err = acquire(
            &Tsl2561::new(Tsl2561Config::DEFAULT),
            &mut i2c,
            &mut NoopDelay,
            1,
            AveragingMode::Arithmetic,
        )
        .unwrap_err();

        assert_eq!(
            err,
            AcquisitionError::UnknownDevice {
                chip: Chip::Tsl2561,
                id: 0x12,
            }
        );
        assert_eq!(err.sentinel(), -104.0);
        i2c.done();
    }

    #[test]
    fn test_power_up_failure() {
        let expectations = [
            I2cTransaction::write_read(ADDRESS, vec![0x8A], vec![0x50]),
            I2cTransaction::write_read(ADDRESS, vec![0x81], vec![0x10]),
            I2cTransaction::write(ADDRESS, vec![0x80, 0x03])
                .with_error(embedded_hal::i2c::ErrorKind::Other),
        ];
        let mut i2c = I2cMock::new(&expectations);

        let err = acquire(
            &Tsl2561::new(Tsl2561Config::DEFAULT),
            &mut i2c,
            &mut NoopDelay,
            1,
            AveragingMode::Arithmetic,
        )
        .unwrap_err();

        assert_eq!(err.sentinel(), -102.0);
        i2c.done();
    }
}
