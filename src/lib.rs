#![cfg_attr(not(test), no_std)]

use core::fmt::{self, Write};
use tinyvec::ArrayVec; // memory layout

#[macro_use]
mod macros;

pub mod clock;
pub mod config;
pub mod gps;
pub mod lat_long;
pub mod nmea;
pub mod receiver;
pub mod ubx;

#[cfg(test)]
mod mock;

pub use config::AcquisitionConfig;
pub use gps::{Gps, TrackStatus};
pub use lat_long::{FormatError, LatLong, LatLongText};
pub use nmea::{DateTimeFix, NmeaDecoder, NmeaError};

/// Fixed-capacity text buffer. Writes that would overflow are rejected whole,
/// so the contents are always valid UTF-8.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FmtBuf<const N: usize>(pub ArrayVec<[u8; N]>);

impl<const N: usize> Write for FmtBuf<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.0.len() + s.len() > N {
            return Err(fmt::Error);
        }
        self.0.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

impl<const N: usize> FmtBuf<N> {
    pub fn new() -> Self {
        Self(Default::default())
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(self.0.as_slice()).unwrap_or("")
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(feature = "defmt")]
impl<const N: usize> defmt::Format for FmtBuf<N> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{=str}", self.as_str())
    }
}
