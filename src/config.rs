//! Per-measurement configuration
//!
//! One settings block per physical quantity. The shipped defaults are the
//! `DEFAULT_*` constants of each chip module; a deployment can persist its own
//! ranges and calibration coefficients with [`EnvironmentConfig::to_slice`]
//! and load them back with [`EnvironmentConfig::from_bytes`].

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::sensors::{Hdc2010Config, Mpl3115a2Config, Sht21Config, Tsl2561Config};

/// Upper bound on the encoded size of an [`EnvironmentConfig`].
pub const MAX_ENCODED_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("failed to decode config: {0}")]
    Decode(postcard::Error),

    #[error("failed to encode config: {0}")]
    Encode(postcard::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentConfig {
    pub sht21_temperature: Sht21Config,
    pub sht21_humidity: Sht21Config,
    pub hdc2010_temperature: Hdc2010Config,
    pub hdc2010_humidity: Hdc2010Config,
    pub mpl3115a2_pressure: Mpl3115a2Config,
    pub tsl2561_light: Tsl2561Config,
}

impl EnvironmentConfig {
    pub const DEFAULT: Self = Self {
        sht21_temperature: Sht21Config::DEFAULT_TEMPERATURE,
        sht21_humidity: Sht21Config::DEFAULT_HUMIDITY,
        hdc2010_temperature: Hdc2010Config::DEFAULT_TEMPERATURE,
        hdc2010_humidity: Hdc2010Config::DEFAULT_HUMIDITY,
        mpl3115a2_pressure: Mpl3115a2Config::DEFAULT,
        tsl2561_light: Tsl2561Config::DEFAULT,
    };

    /// Load a config previously written with [`to_slice`](Self::to_slice).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        postcard::from_bytes(bytes).map_err(|e| {
            log::error!("Config decode failed: {:?}", e);
            ConfigError::Decode(e)
        })
    }

    /// Encode into `buffer`, returning the used prefix.
    pub fn to_slice<'b>(&self, buffer: &'b mut [u8]) -> Result<&'b mut [u8], ConfigError> {
        postcard::to_slice(self, buffer).map_err(|e| {
            log::error!("Config encode failed: {:?}", e);
            ConfigError::Encode(e)
        })
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
