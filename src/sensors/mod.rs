//! Chip drivers
//!
//! Each submodule holds the register codec of one chip (pure encode/decode
//! functions) plus an [`Acquisition`](crate::sequencer::Acquisition)
//! implementation that plugs it into the shared sequencer.

use core::fmt;

pub mod hdc2010;
pub mod mpl3115a2;
pub mod sht21;
pub mod tsl2561;

/// Supported chips. Used to attribute log lines and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chip {
    Sht21,
    Hdc2010,
    Mpl3115a2,
    Tsl2561,
}

impl Chip {
    pub const fn name(self) -> &'static str {
        match self {
            Chip::Sht21 => "SHT21",
            Chip::Hdc2010 => "HDC2010",
            Chip::Mpl3115a2 => "MPL3115A2",
            Chip::Tsl2561 => "TSL2561",
        }
    }
}

impl fmt::Display for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub use hdc2010::{Hdc2010, Hdc2010Config};
pub use mpl3115a2::{Mpl3115a2, Mpl3115a2Config};
pub use sht21::{Sht21, Sht21Config};
pub use tsl2561::{Tsl2561, Tsl2561Config};
