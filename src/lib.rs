//! Hardware-independent acquisition library for enviro-rs
//!
//! Turns raw I2C transactions with the SHT21, HDC2010, MPL3115A2 and TSL2561
//! into calibrated environmental readings. Every chip runs through the same
//! pipeline: optional identification and reset, read-compare-write of its
//! configuration, N sample cycles, aggregation, then range validation and
//! linear calibration in device order.
//!
//! It is `#![no_std]` and allocation-free so it runs on the target as well as
//! on desktop hosts (for the simulator and tests). The bus and the delay
//! source are the blocking `embedded-hal` 1.0 traits.

#![cfg_attr(not(test), no_std)]

pub mod calibration;
pub mod config;
pub mod environment;
pub mod error;
pub mod sensors;
pub mod sequencer;
pub mod shared_i2c_bus;
pub mod statistics;

pub use calibration::{Calibration, CalibrationOrder, Range, RangeCheck};
pub use config::{ConfigError, EnvironmentConfig};
pub use environment::Environment;
pub use error::{AcquisitionError, AcquisitionResult, Phase, into_sentinel};
pub use sensors::Chip;
pub use sequencer::{Acquisition, ReadyPoll, RegisterBus, acquire};
pub use shared_i2c_bus::{SharedI2cBus, SharedI2cDevice};
pub use statistics::AveragingMode;
