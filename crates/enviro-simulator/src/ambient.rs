//! Synthetic ambient conditions seen by the modelled chips.

use std::f64::consts::TAU;
use std::time::Instant;

/// Length of one simulated day.
pub const DAY_SECS: f64 = 600.0;

/// Physical conditions at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conditions {
    /// °C
    pub temperature: f64,
    /// %RH
    pub humidity: f64,
    /// Pa
    pub pressure: f64,
    /// lux
    pub illuminance: f64,
}

/// Slowly varying conditions, shared by value between chip models.
#[derive(Debug, Clone, Copy)]
pub struct Ambient {
    start: Instant,
}

impl Ambient {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Conditions right now.
    pub fn now(&self) -> Conditions {
        Self::at(self.start.elapsed().as_secs_f64())
    }

    /// Conditions `t` seconds after start.
    ///
    /// A day is squeezed into [`DAY_SECS`]; the air dips below freezing
    /// before dawn.
    pub fn at(t: f64) -> Conditions {
        let day = (t / DAY_SECS * TAU).sin();

        let temperature = 4.0 + 8.0 * day + 0.3 * (t / 13.0).sin();
        // Relative humidity falls as the air warms.
        let humidity = (65.0 - 2.5 * (temperature - 4.0)).clamp(5.0, 98.0);
        let pressure = 101_325.0 + 400.0 * (t / (1.5 * DAY_SECS) * TAU).cos();
        let illuminance = 150.0 + 225.0 * (1.0 + day);

        Conditions {
            temperature,
            humidity,
            pressure,
            illuminance,
        }
    }
}
