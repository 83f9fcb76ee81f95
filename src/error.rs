//! Acquisition failures
//!
//! Every acquisition either yields a calibrated reading or one of the errors
//! below. The variant says *what* went wrong and the [`Phase`] says *where* in
//! the protocol it happened. Callers that still speak the legacy single-float
//! channel can recover the per-device negative code with
//! [`AcquisitionError::sentinel`] or [`into_sentinel`].

use core::fmt;

use thiserror_no_std::Error;

use crate::sensors::Chip;

/// Protocol step an acquisition was executing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading the identification register.
    Identify,
    /// Soft reset command (and any read it needs).
    Reset,
    /// Reading the currently stored configuration.
    ReadConfig,
    /// Writing the primary configuration register.
    WriteConfig,
    /// Writing a secondary configuration register.
    WriteDataConfig,
    /// Powering the device up before sampling.
    PowerUp,
    /// Starting a conversion.
    Trigger,
    /// Reading the data-ready status register.
    ReadStatus,
    /// Reading a sample (or its low byte for byte-wise devices).
    ReadSample,
    /// Reading the high byte of a byte-wise sample.
    ReadSampleHigh,
    /// Powering the device down after sampling.
    PowerDown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Identify => "identify",
            Phase::Reset => "reset",
            Phase::ReadConfig => "read config",
            Phase::WriteConfig => "write config",
            Phase::WriteDataConfig => "write data config",
            Phase::PowerUp => "power up",
            Phase::Trigger => "trigger",
            Phase::ReadStatus => "read status",
            Phase::ReadSample => "read sample",
            Phase::ReadSampleHigh => "read sample high byte",
            Phase::PowerDown => "power down",
        };
        f.write_str(name)
    }
}

/// Error types for an acquisition call.
///
/// All variants are fatal for the call that produced them. Nothing is retried
/// apart from the bounded ready-poll, so recovering means calling the
/// acquisition again from the start.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum AcquisitionError {
    /// The bus reported a failed transaction.
    #[error("{chip}: bus transaction failed during {phase}")]
    Transport {
        /// Device being talked to
        chip: Chip,
        /// Step that failed
        phase: Phase,
    },

    /// The data-ready bit never set within the poll budget.
    #[error("{chip}: data not ready after {attempts} polls")]
    ReadyTimeout {
        /// Device being polled
        chip: Chip,
        /// Number of status reads performed
        attempts: u8,
    },

    /// The validated value fell outside the declared physical range.
    #[error("{chip}: reading {value} outside range [{min}, {max}]")]
    OutOfRange {
        /// Device that produced the value
        chip: Chip,
        /// Rejected value
        value: f32,
        /// Lower bound of the declared range
        min: f32,
        /// Upper bound of the declared range
        max: f32,
    },

    /// The identification register held an unexpected signature.
    #[error("{chip}: unexpected identification byte {id:#04x}")]
    UnknownDevice {
        /// Device that was expected
        chip: Chip,
        /// Byte actually read
        id: u8,
    },

    /// A read count of zero was requested.
    #[error("sample count must be at least 1")]
    InvalidSampleCount,
}

impl AcquisitionError {
    /// Chip the failure is attributed to, if any.
    pub fn chip(&self) -> Option<Chip> {
        match self {
            AcquisitionError::Transport { chip, .. }
            | AcquisitionError::ReadyTimeout { chip, .. }
            | AcquisitionError::OutOfRange { chip, .. }
            | AcquisitionError::UnknownDevice { chip, .. } => Some(*chip),
            AcquisitionError::InvalidSampleCount => None,
        }
    }

    /// Negative code reported on the legacy single-float channel.
    pub fn sentinel(&self) -> f32 {
        f32::from(self.code())
    }

    /// Per-device negative code for this failure.
    pub fn code(&self) -> i16 {
        match *self {
            AcquisitionError::Transport { chip, phase } => transport_code(chip, phase),
            AcquisitionError::ReadyTimeout { .. } => -106,
            AcquisitionError::UnknownDevice { .. } => -104,
            AcquisitionError::OutOfRange { chip, .. } => match chip {
                Chip::Sht21 | Chip::Hdc2010 => -106,
                Chip::Mpl3115a2 => -108,
                Chip::Tsl2561 => -105,
            },
            AcquisitionError::InvalidSampleCount => -100,
        }
    }
}

fn transport_code(chip: Chip, phase: Phase) -> i16 {
    match chip {
        Chip::Sht21 => match phase {
            Phase::Reset => -101,
            Phase::ReadConfig | Phase::WriteConfig => -102,
            _ => -103,
        },
        Chip::Hdc2010 => match phase {
            Phase::Reset => -101,
            Phase::ReadConfig | Phase::WriteConfig => -102,
            Phase::ReadSample => -104,
            Phase::ReadSampleHigh => -105,
            _ => -103,
        },
        Chip::Mpl3115a2 => match phase {
            Phase::Identify => -101,
            Phase::ReadConfig | Phase::WriteConfig => -102,
            Phase::WriteDataConfig => -103,
            Phase::ReadStatus => -105,
            _ => -107,
        },
        Chip::Tsl2561 => match phase {
            Phase::Identify => -104,
            Phase::ReadConfig | Phase::WriteConfig => -101,
            Phase::PowerUp => -102,
            _ => -103,
        },
    }
}

/// Result type for acquisition calls
pub type AcquisitionResult<T> = Result<T, AcquisitionError>;

/// Collapse a result onto the single-float channel: the reading itself, or
/// the negative sentinel of the failure.
pub fn into_sentinel(result: AcquisitionResult<f32>) -> f32 {
    match result {
        Ok(value) => value,
        Err(e) => e.sentinel(),
    }
}
