use chrono::{Datelike, NaiveDateTime, Timelike};

use super::generator::SendablePacket;

const MGA_INI_TIME_UTC_LEN: usize = 24;

/// MGA-INI-TIME_UTC: tells the receiver the current UTC time so it can skip
/// part of a cold start.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MgaIniTimeUtc {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub nanos: u32,
    /// Leap seconds since 1980, or `i8::MIN` when unknown.
    pub leap_seconds: i8,
    pub accuracy_seconds: u16,
    pub accuracy_nanos: u32,
}

impl MgaIniTimeUtc {
    pub fn from_naive(dt: &NaiveDateTime) -> Self {
        Self {
            year: u16::try_from(dt.year()).unwrap_or(0),
            month: dt.month() as u8,
            day: dt.day() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
            nanos: 0,
            leap_seconds: i8::MIN,
            accuracy_seconds: 0,
            accuracy_nanos: 0,
        }
    }
}

impl SendablePacket for MgaIniTimeUtc {
    type I = core::array::IntoIter<u8, MGA_INI_TIME_UTC_LEN>;

    fn class(&self) -> u8 {
        0x13
    }

    fn id(&self) -> u8 {
        0x40
    }

    fn payload_len(&self) -> usize {
        MGA_INI_TIME_UTC_LEN
    }

    fn payload_bytes(self) -> Self::I {
        let mut payload = [0u8; MGA_INI_TIME_UTC_LEN];
        // type, version, time reference (on receipt)
        payload[0] = 0x10;
        payload[1] = 0x00;
        payload[2] = 0x00;
        payload[3] = self.leap_seconds.to_le_bytes()[0];
        payload[4..6].copy_from_slice(&self.year.to_le_bytes());
        payload[6] = self.month;
        payload[7] = self.day;
        payload[8] = self.hour;
        payload[9] = self.minute;
        payload[10] = self.second;
        payload[12..16].copy_from_slice(&self.nanos.to_le_bytes());
        payload[16..18].copy_from_slice(&self.accuracy_seconds.to_le_bytes());
        payload[20..24].copy_from_slice(&self.accuracy_nanos.to_le_bytes());
        payload.into_iter()
    }
}
