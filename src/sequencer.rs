//! Shared acquisition sequencer
//!
//! Every supported chip follows the same shape:
//!
//! ```text
//! Identify? -> Reset? -> ReadConfig -> WriteConfig? -> Sample x N -> Finish?
//!     -> Aggregate -> Validate/Calibrate (device order) -> reading
//! ```
//!
//! The device-specific parts are supplied through [`Acquisition`]; the order
//! of the phases, the sample buffer and the aggregation live here. Any error
//! aborts the call on the spot: no partial buffer is aggregated and nothing is
//! retried apart from the bounded ready-poll in [`RegisterBus::poll_ready`].

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};
use log::{debug, error, info, trace};

use crate::calibration::{CalibrationOrder, Finalizer, RangeCheck};
use crate::error::{AcquisitionError, AcquisitionResult, Phase};
use crate::sensors::Chip;
use crate::statistics::{AveragingMode, SampleBuffer, SampleStatistics};

/// Register-level access to one device on the bus.
///
/// Wraps the blocking transport and turns every failed transaction into an
/// [`AcquisitionError::Transport`] tagged with the phase the caller names.
pub struct RegisterBus<'a, I> {
    i2c: &'a mut I,
    chip: Chip,
    address: u8,
}

impl<'a, I: I2c> RegisterBus<'a, I> {
    pub fn new(i2c: &'a mut I, chip: Chip, address: u8) -> Self {
        Self { i2c, chip, address }
    }

    fn fault<E: embedded_hal::i2c::Error>(&self, phase: Phase, e: E) -> AcquisitionError {
        error!(
            "{} {} failed: {:?} (address {:#04x})",
            self.chip,
            phase,
            e.kind(),
            self.address
        );
        AcquisitionError::Transport {
            chip: self.chip,
            phase,
        }
    }

    /// Send a raw command sequence.
    pub fn command(&mut self, bytes: &[u8], phase: Phase) -> AcquisitionResult<()> {
        self.i2c
            .write(self.address, bytes)
            .map_err(|e| self.fault(phase, e))
    }

    /// Read bytes without selecting a register first.
    pub fn read(&mut self, buffer: &mut [u8], phase: Phase) -> AcquisitionResult<()> {
        self.i2c
            .read(self.address, buffer)
            .map_err(|e| self.fault(phase, e))
    }

    /// Read consecutive bytes starting at `register`.
    pub fn read_into(
        &mut self,
        register: u8,
        buffer: &mut [u8],
        phase: Phase,
    ) -> AcquisitionResult<()> {
        self.i2c
            .write_read(self.address, &[register], buffer)
            .map_err(|e| self.fault(phase, e))
    }

    /// Reads a single byte from a specific register address.
    pub fn read_register(&mut self, register: u8, phase: Phase) -> AcquisitionResult<u8> {
        let mut buffer = [0u8];
        self.read_into(register, &mut buffer, phase)?;
        Ok(buffer[0])
    }

    /// Writes `[register, value]`.
    pub fn write_register(
        &mut self,
        register: u8,
        value: u8,
        phase: Phase,
    ) -> AcquisitionResult<()> {
        self.command(&[register, value], phase)
    }

    /// Write `desired` to `register` only if it differs from `current`.
    ///
    /// Returns whether a write went out.
    pub fn write_if_changed(
        &mut self,
        register: u8,
        current: u8,
        desired: u8,
        phase: Phase,
    ) -> AcquisitionResult<bool> {
        if current == desired {
            debug!(
                "{}: register {:#04x} already {:#04x}, skipping write",
                self.chip, register, current
            );
            return Ok(false);
        }

        debug!(
            "{}: register {:#04x} {:#04x} -> {:#04x}",
            self.chip, register, current, desired
        );
        self.write_register(register, desired, phase)?;
        Ok(true)
    }

    /// Poll `register` until any bit of `mask` is set.
    ///
    /// Reads the register at most `policy.attempts` times and sleeps
    /// `policy.interval_ms` between reads that find the bit clear. Returns the
    /// status byte that had the bit set.
    pub fn poll_ready<D: DelayNs>(
        &mut self,
        register: u8,
        mask: u8,
        policy: ReadyPoll,
        delay: &mut D,
    ) -> AcquisitionResult<u8> {
        for attempt in 1..=policy.attempts {
            let status = self.read_register(register, Phase::ReadStatus)?;
            if status & mask != 0 {
                trace!("{}: ready after {} polls", self.chip, attempt);
                return Ok(status);
            }
            if attempt < policy.attempts {
                delay.delay_ms(policy.interval_ms);
            }
        }

        error!(
            "{}: ready bit {:#04x} not set after {} polls",
            self.chip, mask, policy.attempts
        );
        Err(AcquisitionError::ReadyTimeout {
            chip: self.chip,
            attempts: policy.attempts,
        })
    }
}

/// Bounded ready-poll budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyPoll {
    /// Maximum number of status reads
    pub attempts: u8,
    /// Sleep between reads
    pub interval_ms: u32,
}

/// Capability interface implemented by every chip/measurement pair.
///
/// The sequencer calls these hooks in a fixed order; implementations only
/// describe what one phase does on their device. Hooks that a device does not
/// need default to doing nothing.
pub trait Acquisition {
    /// Device being driven.
    const CHIP: Chip;
    /// 7-bit bus address.
    const ADDRESS: u8;
    /// How the range bounds are compared.
    const RANGE_CHECK: RangeCheck;
    /// Whether calibration happens before or after the range check.
    const ORDER: CalibrationOrder;

    /// Derived during configuration and handed to every sample.
    type State;

    /// Verify the device signature. Runs before anything else is written.
    fn identify<I: I2c>(&self, _bus: &mut RegisterBus<'_, I>) -> AcquisitionResult<()> {
        Ok(())
    }

    /// Soft-reset the device and wait for it to settle.
    fn reset<I: I2c, D: DelayNs>(
        &self,
        _bus: &mut RegisterBus<'_, I>,
        _delay: &mut D,
    ) -> AcquisitionResult<()> {
        Ok(())
    }

    /// Read the stored configuration and write the desired one if it differs.
    fn configure<I: I2c, D: DelayNs>(
        &self,
        bus: &mut RegisterBus<'_, I>,
        delay: &mut D,
    ) -> AcquisitionResult<Self::State>;

    /// Run one conversion and decode it into physical units.
    fn sample<I: I2c, D: DelayNs>(
        &self,
        state: &Self::State,
        bus: &mut RegisterBus<'_, I>,
        delay: &mut D,
    ) -> AcquisitionResult<f32>;

    /// Leave the device in its idle state after the sample loop.
    fn finish<I: I2c, D: DelayNs>(
        &self,
        _bus: &mut RegisterBus<'_, I>,
        _delay: &mut D,
    ) -> AcquisitionResult<()> {
        Ok(())
    }

    /// Range, calibration and order applied to the aggregate.
    fn finalizer(&self) -> Finalizer;
}

/// Run one complete acquisition of `device`.
///
/// Performs exactly `count` sample cycles, aggregates them under `mode` and
/// returns the validated, calibrated reading.
pub fn acquire<A, I, D>(
    device: &A,
    i2c: &mut I,
    delay: &mut D,
    count: u8,
    mode: AveragingMode,
) -> AcquisitionResult<f32>
where
    A: Acquisition,
    I: I2c,
    D: DelayNs,
{
    if count == 0 {
        error!("{}: acquisition requested with zero samples", A::CHIP);
        return Err(AcquisitionError::InvalidSampleCount);
    }

    let mut bus = RegisterBus::new(i2c, A::CHIP, A::ADDRESS);

    device.identify(&mut bus)?;
    device.reset(&mut bus, delay)?;
    let state = device.configure(&mut bus, delay)?;

    let mut samples = SampleBuffer::new();
    for index in 0..count {
        let value = device.sample(&state, &mut bus, delay)?;
        trace!("{}: sample {} = {}", A::CHIP, index, value);
        samples
            .push(value)
            .map_err(|_| AcquisitionError::InvalidSampleCount)?;
    }

    device.finish(&mut bus, delay)?;

    let aggregate = SampleStatistics::new(&samples).average(mode);
    let reading = device.finalizer().finalize(aggregate)?;

    info!(
        "{}: {} from {} samples ({:?}) -> {}",
        A::CHIP,
        aggregate,
        samples.len(),
        mode,
        reading
    );
    Ok(reading)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{Calibration, Range};
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    const ADDR: u8 = 0x2A;

    /// Minimal device: one config register at 0x10, samples read as a single
    /// byte from 0x20 and passed through unchanged.
    struct ScratchDevice {
        config: u8,
    }

    impl Acquisition for ScratchDevice {
        const CHIP: Chip = Chip::Sht21;
        const ADDRESS: u8 = ADDR;
        const RANGE_CHECK: RangeCheck = RangeCheck::Closed;
        const ORDER: CalibrationOrder = CalibrationOrder::ValidateThenCalibrate;

        type State = ();

        fn configure<I: I2c, D: DelayNs>(
            &self,
            bus: &mut RegisterBus<'_, I>,
            _delay: &mut D,
        ) -> AcquisitionResult<()> {
            let current = bus.read_register(0x10, Phase::ReadConfig)?;
            bus.write_if_changed(0x10, current, self.config, Phase::WriteConfig)?;
            Ok(())
        }

        fn sample<I: I2c, D: DelayNs>(
            &self,
            _state: &(),
            bus: &mut RegisterBus<'_, I>,
            _delay: &mut D,
        ) -> AcquisitionResult<f32> {
            Ok(bus.read_register(0x20, Phase::ReadSample)? as f32)
        }

        fn finalizer(&self) -> Finalizer {
            Finalizer {
                chip: Self::CHIP,
                range: Range::new(0.0, 200.0),
                check: Self::RANGE_CHECK,
                calibration: Calibration::new(1.0, 0.5),
                order: Self::ORDER,
            }
        }
    }

    /// Delay that records every requested sleep.
    #[derive(Default)]
    struct RecordingDelay {
        sleeps_ms: std::vec::Vec<u32>,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.sleeps_ms.push(ns / 1_000_000);
        }

        fn delay_ms(&mut self, ms: u32) {
            self.sleeps_ms.push(ms);
        }
    }

    #[test]
    fn test_skips_config_write_when_unchanged() {
        let expectations = [
            I2cTransaction::write_read(ADDR, vec![0x10], vec![0x42]),
            I2cTransaction::write_read(ADDR, vec![0x20], vec![10]),
            I2cTransaction::write_read(ADDR, vec![0x20], vec![20]),
        ];
        let mut i2c = I2cMock::new(&expectations);

        let reading = acquire(
            &ScratchDevice { config: 0x42 },
            &mut i2c,
            &mut NoopDelay,
            2,
            AveragingMode::Arithmetic,
        );

        assert_eq!(reading, Ok(15.5));
        i2c.done();
    }

    #[test]
    fn test_writes_config_when_different() {
        let expectations = [
            I2cTransaction::write_read(ADDR, vec![0x10], vec![0x00]),
            I2cTransaction::write(ADDR, vec![0x10, 0x42]),
            I2cTransaction::write_read(ADDR, vec![0x20], vec![7]),
        ];
        let mut i2c = I2cMock::new(&expectations);

        let reading = acquire(
            &ScratchDevice { config: 0x42 },
            &mut i2c,
            &mut NoopDelay,
            1,
            AveragingMode::Median,
        );

        assert_eq!(reading, Ok(7.5));
        i2c.done();
    }

    #[test]
    fn test_failed_sample_aborts_whole_call() {
        let expectations = [
            I2cTransaction::write_read(ADDR, vec![0x10], vec![0x42]),
            I2cTransaction::write_read(ADDR, vec![0x20], vec![10]),
            I2cTransaction::write_read(ADDR, vec![0x20], vec![0])
                .with_error(embedded_hal::i2c::ErrorKind::Other),
        ];
        let mut i2c = I2cMock::new(&expectations);

        let reading = acquire(
            &ScratchDevice { config: 0x42 },
            &mut i2c,
            &mut NoopDelay,
            3,
            AveragingMode::Arithmetic,
        );

        assert_eq!(
            reading,
            Err(AcquisitionError::Transport {
                chip: Chip::Sht21,
                phase: Phase::ReadSample,
            })
        );
        i2c.done();
    }

    #[test]
    fn test_zero_samples_touches_nothing() {
        let mut i2c = I2cMock::new(&[]);

        let reading = acquire(
            &ScratchDevice { config: 0 },
            &mut i2c,
            &mut NoopDelay,
            0,
            AveragingMode::Arithmetic,
        );

        assert_eq!(reading, Err(AcquisitionError::InvalidSampleCount));
        i2c.done();
    }

    #[test]
    fn test_poll_ready_times_out_after_ceiling() {
        let policy = ReadyPoll {
            attempts: 5,
            interval_ms: 50,
        };
        let expectations: std::vec::Vec<_> = (0..5)
            .map(|_| I2cTransaction::write_read(ADDR, vec![0x00], vec![0x00]))
            .collect();
        let mut i2c = I2cMock::new(&expectations);
        let mut delay = RecordingDelay::default();

        let mut bus = RegisterBus::new(&mut i2c, Chip::Mpl3115a2, ADDR);
        let result = bus.poll_ready(0x00, 0x04, policy, &mut delay);

        assert_eq!(
            result,
            Err(AcquisitionError::ReadyTimeout {
                chip: Chip::Mpl3115a2,
                attempts: 5,
            })
        );
        // No sleep after the last read
        assert_eq!(delay.sleeps_ms, [50; 4]);
        i2c.done();
    }

    #[test]
    fn test_poll_ready_returns_status_once_set() {
        let policy = ReadyPoll {
            attempts: 5,
            interval_ms: 50,
        };
        let expectations = [
            I2cTransaction::write_read(ADDR, vec![0x00], vec![0x00]),
            I2cTransaction::write_read(ADDR, vec![0x00], vec![0x0E]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut delay = RecordingDelay::default();

        let mut bus = RegisterBus::new(&mut i2c, Chip::Mpl3115a2, ADDR);
        assert_eq!(bus.poll_ready(0x00, 0x04, policy, &mut delay), Ok(0x0E));
        assert_eq!(delay.sleeps_ms, [50]);
        i2c.done();
    }
}
