//! Desktop simulator for the enviro-rs acquisition pipeline.
//!
//! Runs every acquisition of the library against register-level models of the
//! four chips and logs the readings, so the full protocol (resets, config
//! compare-and-write, ready polling, power cycling) can be watched without
//! hardware. Run with `RUST_LOG=debug` to see register traffic decisions, or
//! `RUST_LOG=trace` for every bus transaction.
//!
//! The SHT21 and the HDC2010 share address 0x40, so the HDC2010 sits on a bus
//! of its own. The other three chips share the primary bus through
//! [`SharedI2cBus`].
//!
//! An optional first argument names a config file written by
//! `EnvironmentConfig::to_slice`; it replaces the shipped defaults.

mod ambient;
mod bus;
mod chips;

use std::time::{Duration, Instant};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_hal::delay::DelayNs;
use enviro_rs::{AcquisitionResult, AveragingMode, Environment, EnvironmentConfig, SharedI2cBus};
use log::{error, info, warn};

use crate::ambient::Ambient;
use crate::bus::SimulatedBus;
use crate::chips::{Hdc2010Model, Mpl3115a2Model, Sht21Model, Tsl2561Model};

/// Interval between acquisition rounds.
const ROUND_INTERVAL: Duration = Duration::from_secs(5);

/// Samples per acquisition.
const SAMPLES: u8 = 4;

/// Sleeps are shortened by this factor so a round does not take seconds.
const TIME_SPEEDUP: u32 = 10;

/// `DelayNs` backed by `std::thread::sleep`.
struct StdDelay {
    speedup: u32,
}

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns / self.speedup)));
    }
}

fn load_config() -> EnvironmentConfig {
    let Some(path) = std::env::args().nth(1) else {
        return EnvironmentConfig::default();
    };

    match std::fs::read(&path) {
        Ok(bytes) => match EnvironmentConfig::from_bytes(&bytes) {
            Ok(config) => {
                info!("Loaded config from {}", path);
                config
            }
            Err(e) => {
                error!("{}: {}; using defaults", path, e);
                EnvironmentConfig::default()
            }
        },
        Err(e) => {
            error!("Cannot read {}: {}; using defaults", path, e);
            EnvironmentConfig::default()
        }
    }
}

fn report(name: &str, unit: &str, result: AcquisitionResult<f32>) {
    match result {
        Ok(value) => info!("{:<20} {:>10.2} {}", name, value, unit),
        Err(e) => warn!("{:<20} {:>10} ({})", name, e.sentinel(), e),
    }
}

fn main() {
    env_logger::init();
    info!("Starting enviro-rs simulator");

    let config = load_config();
    let ambient = Ambient::start();

    let primary: SharedI2cBus<CriticalSectionRawMutex, _> = SharedI2cBus::new(
        SimulatedBus::new()
            .with(Sht21Model::new(ambient))
            .with(Mpl3115a2Model::new(ambient))
            .with(Tsl2561Model::new(ambient)),
    );
    let secondary = SimulatedBus::new().with(Hdc2010Model::new(ambient));

    let delay = || StdDelay {
        speedup: TIME_SPEEDUP,
    };
    let mut climate = Environment::with_config(primary.device(), delay(), config);
    let mut weather = Environment::with_config(primary.device(), delay(), config);
    let mut reference = Environment::with_config(secondary, delay(), config);

    loop {
        let round_start = Instant::now();
        let truth = ambient.now();
        info!(
            "Ambient: {:.2} °C, {:.2} %RH, {:.2} hPa, {:.0} lux",
            truth.temperature,
            truth.humidity,
            truth.pressure / 100.0,
            truth.illuminance
        );

        report(
            "SHT21 temperature",
            "°C",
            climate.sht21_temperature(SAMPLES, AveragingMode::Median),
        );
        report(
            "SHT21 humidity",
            "%RH",
            climate.sht21_humidity(SAMPLES, AveragingMode::Median),
        );
        report(
            "HDC2010 temperature",
            "°C",
            reference.hdc2010_temperature(SAMPLES, AveragingMode::Arithmetic),
        );
        report(
            "HDC2010 humidity",
            "%RH",
            reference.hdc2010_humidity(SAMPLES, AveragingMode::Arithmetic),
        );
        report(
            "MPL3115A2 pressure",
            "hPa",
            weather.mpl3115a2_pressure(SAMPLES, AveragingMode::Trimmed),
        );
        report(
            "TSL2561 light",
            "lux",
            weather.tsl2561_light(SAMPLES, AveragingMode::RootMeanSquare),
        );

        let elapsed = round_start.elapsed();
        if elapsed < ROUND_INTERVAL {
            std::thread::sleep(ROUND_INTERVAL - elapsed);
        }
    }
}
