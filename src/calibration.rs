//! Range validation and linear calibration
//!
//! Every acquisition finishes by checking its value against the device's
//! declared physical range and applying the per-measurement affine correction
//! `value * scale + offset`. Which of the two happens first is a property of
//! the device (see [`CalibrationOrder`]).

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{AcquisitionError, AcquisitionResult};
use crate::sensors::Chip;

/// Linear calibration coefficients.
///
/// `calibrated = value * scale + offset`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Scale factor (`a`)
    pub scale: f32,
    /// Offset (`b`)
    pub offset: f32,
}

impl Calibration {
    /// Leaves values untouched.
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        offset: 0.0,
    };

    /// Create a new calibration with custom parameters
    pub const fn new(scale: f32, offset: f32) -> Self {
        Self { scale, offset }
    }

    /// Apply the correction
    #[inline]
    pub fn apply(&self, value: f32) -> f32 {
        self.scale * value + self.offset
    }

    /// Create calibration from two reference points.
    ///
    /// Given two `(measured, reference)` pairs, calculates the coefficients
    /// that map the measured values onto the references.
    pub fn from_two_points(
        measured1: f32,
        reference1: f32,
        measured2: f32,
        reference2: f32,
    ) -> Self {
        let scale = (reference2 - reference1) / (measured2 - measured1);
        let offset = reference1 - scale * measured1;

        Self { scale, offset }
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Declared physical range of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }
}

/// How a device compares a value against its [`Range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeCheck {
    /// Rejects `value < min || value > max`; the bounds themselves pass.
    Closed,
    /// Rejects `value <= min || value >= max`; the bounds themselves fail.
    Open,
}

impl RangeCheck {
    /// Whether `value` passes this check. NaN never does.
    pub fn accepts(self, range: &Range, value: f32) -> bool {
        match self {
            RangeCheck::Closed => value >= range.min && value <= range.max,
            RangeCheck::Open => value > range.min && value < range.max,
        }
    }
}

/// Order in which a device validates and calibrates its aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationOrder {
    /// Range-check the raw aggregate, then calibrate. The calibrated value is
    /// not checked again.
    ValidateThenCalibrate,
    /// Calibrate the aggregate, then range-check the calibrated value.
    CalibrateThenValidate,
}

/// Everything needed to turn an aggregate into the final reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Finalizer {
    pub chip: Chip,
    pub range: Range,
    pub check: RangeCheck,
    pub calibration: Calibration,
    pub order: CalibrationOrder,
}

impl Finalizer {
    /// Validate and calibrate `aggregate` in device order.
    pub fn finalize(&self, aggregate: f32) -> AcquisitionResult<f32> {
        match self.order {
            CalibrationOrder::ValidateThenCalibrate => {
                self.validate(aggregate)?;
                Ok(self.calibration.apply(aggregate))
            }
            CalibrationOrder::CalibrateThenValidate => {
                let calibrated = self.calibration.apply(aggregate);
                self.validate(calibrated)?;
                Ok(calibrated)
            }
        }
    }

    fn validate(&self, value: f32) -> AcquisitionResult<()> {
        if self.check.accepts(&self.range, value) {
            return Ok(());
        }

        warn!(
            "{}: {} rejected, outside [{}, {}]",
            self.chip, value, self.range.min, self.range.max
        );
        Err(AcquisitionError::OutOfRange {
            chip: self.chip,
            value,
            min: self.range.min,
            max: self.range.max,
        })
    }
}
