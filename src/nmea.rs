//! NMEA-0183 decoding of the recommended-minimum (`$G?RMC`) sentence.
//!
//! ```text
//! $GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A
//!        time   |  latitude    longitude   speed track date
//!               status
//! ```
//!
//! Only the date/time and position survive decoding. The checksum is the XOR
//! of every byte between `$` and `*`.

use core::fmt::{self, Write};

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use embedded_hal::serial;
use thiserror::Error;
use tinyvec::ArrayVec;

use crate::{clock::Uptime, lat_long::LatLongText};

/// Longest line accepted from the stream, including the `$`.
pub const MAX_SENTENCE_LEN: usize = 96;
type LineBuf = ArrayVec<[u8; MAX_SENTENCE_LEN]>;

const MAX_MINUTES_DIGITS: usize = 6;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    Time,
    Status,
    Latitude,
    LatitudeHemisphere,
    Longitude,
    LongitudeHemisphere,
    Date,
}

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NmeaError {
    #[error("checksum mismatch: sentence says {expected:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { expected: u8, computed: u8 },
    #[error("malformed or unsupported sentence")]
    MalformedSentence,
    #[error("{0:?} field did not parse")]
    FieldParseFailure(Field),
}

/// Calendar date and time of a fix, UTC. All zero when there is no fix.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTimeFix {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTimeFix {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year.into(), self.month.into(), self.day.into())?.and_hms_opt(
            self.hour.into(),
            self.minute.into(),
            self.second.into(),
        )
    }

    pub fn from_naive(dt: &NaiveDateTime) -> Self {
        Self {
            year: u16::try_from(dt.year()).unwrap_or(0),
            month: dt.month() as u8,
            day: dt.day() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
        }
    }
}

impl fmt::Display for DateTimeFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0, |acc, b| acc ^ b)
}

/// Checks framing and checksum of one line, returning the body between `$`
/// and `*`. The line ends at the first CR, LF or NUL.
pub fn validate_checksum(line: &[u8]) -> Result<&[u8], NmeaError> {
    let line = trim_terminator(line);
    if line.first() != Some(&b'$') || line.len() < 4 {
        return Err(NmeaError::MalformedSentence);
    }

    let (rest, hex) = line.split_at(line.len() - 2);
    let expected = parse_hex(hex).ok_or(NmeaError::MalformedSentence)?;

    let (body, star) = rest.split_at(rest.len() - 1);
    if star != b"*" {
        return Err(NmeaError::MalformedSentence);
    }

    let body = &body[1..];
    let computed = checksum(body);
    if computed != expected {
        return Err(NmeaError::ChecksumMismatch { expected, computed });
    }
    Ok(body)
}

fn trim_terminator(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .position(|&b| matches!(b, b'\r' | b'\n' | 0))
        .unwrap_or(line.len());
    &line[..end]
}

/// The line as it arrived, up to its terminator. Lines that are not UTF-8
/// come back as raw bytes.
fn echo_text(line: &[u8]) -> Result<&str, &[u8]> {
    let line = trim_terminator(line);
    core::str::from_utf8(line).map_err(|_| line)
}

fn echo_bytes(bytes: &[u8]) {
    #[cfg(feature = "defmt")]
    defmt::info!("{=[u8]}", bytes);
    #[cfg(not(feature = "defmt"))]
    log::info!("{:?}", bytes);
}

fn parse_hex(hex: &[u8]) -> Option<u8> {
    if !hex.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    u8::from_str_radix(core::str::from_utf8(hex).ok()?, 16).ok()
}

/// Comma-separated fields of a sentence body. Consecutive commas yield empty
/// fields, so indices never shift; past the end every field is empty.
struct Fields<'a>(core::str::Split<'a, char>);

impl<'a> Fields<'a> {
    fn new(body: &'a str) -> Self {
        Self(body.split(','))
    }

    fn next_field(&mut self) -> &'a str {
        self.next().unwrap_or("")
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(str::trim)
    }
}

fn is_rmc(id: &str) -> bool {
    let id = id.as_bytes();
    id.len() == 5 && id[0] == b'G' && &id[2..] == b"RMC"
}

/// Splits `HHMMSS[.ss]` or `DDMMYY` into its three leading two-digit numbers.
fn digit_pairs(field: &str) -> Option<(u8, u8, u8)> {
    let digits = field.as_bytes().get(..6)?;
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let pair = |i: usize| (digits[i] - b'0') * 10 + (digits[i + 1] - b'0');
    Some((pair(0), pair(2), pair(4)))
}

fn parse_time(field: &str) -> Option<(u8, u8, u8)> {
    digit_pairs(field).filter(|&(hour, minute, second)| hour < 24 && minute < 60 && second < 60)
}

/// Two-digit years pivot at 1980, the start of GPS time.
fn parse_date(field: &str) -> Option<(u16, u8, u8)> {
    let (day, month, yy) = digit_pairs(field)?;
    let year = (if yy >= 80 { 1900 } else { 2000 }) + u16::from(yy);
    NaiveDate::from_ymd_opt(year.into(), month.into(), day.into())?;
    Some((year, month, day))
}

/// `DDMM.mmmm` (or `DDDMM.mmmm`) split after the degree digits.
fn parse_coordinate(field: &str, degree_digits: usize) -> Option<(&str, &str)> {
    if field.len() <= degree_digits || !field.is_char_boundary(degree_digits) {
        return None;
    }
    let (degrees, minutes) = field.split_at(degree_digits);
    let (whole, fraction) = minutes.split_once('.')?;
    let valid = degrees.bytes().all(|b| b.is_ascii_digit())
        && whole.len() == 2
        && whole.bytes().all(|b| b.is_ascii_digit())
        && (1..=MAX_MINUTES_DIGITS).contains(&fraction.len())
        && fraction.bytes().all(|b| b.is_ascii_digit());
    valid.then_some((degrees, minutes))
}

fn parse_hemisphere(field: &str, positive: char, negative: char) -> Option<char> {
    field
        .chars()
        .next()
        .filter(|&c| c == positive || c == negative)
}

pub struct NmeaDecoder {
    lat_long_valid: bool,
    date_time_valid: bool,
    date_time: DateTimeFix,
    lat_long: LatLongText,
    echo: bool,
}

impl Default for NmeaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl NmeaDecoder {
    pub fn new() -> Self {
        Self {
            lat_long_valid: false,
            date_time_valid: false,
            date_time: DateTimeFix::default(),
            lat_long: LatLongText::new(),
            echo: false,
        }
    }

    /// Log every line handed to the decoder, verbatim.
    pub fn echo_to_monitor(&mut self, echo: bool) {
        self.echo = echo;
    }

    pub fn is_lat_long_valid(&self) -> bool {
        self.lat_long_valid
    }

    pub fn is_date_time_valid(&self) -> bool {
        self.date_time_valid
    }

    pub fn date_time(&self) -> DateTimeFix {
        if self.date_time_valid {
            self.date_time
        } else {
            DateTimeFix::default()
        }
    }

    /// Position as `"48 07.038 N, 011 31.000 E"`, empty without a fix.
    pub fn lat_long_text(&self) -> LatLongText {
        if self.lat_long_valid {
            self.lat_long
        } else {
            LatLongText::new()
        }
    }

    pub fn invalidate(&mut self) {
        self.lat_long_valid = false;
        self.date_time_valid = false;
    }

    /// Decodes one line. The validity flags always reflect this line when it
    /// returns; the error only says why the line ended early.
    pub fn update_from_line(&mut self, line: &[u8]) -> Result<(), NmeaError> {
        if self.echo {
            match echo_text(line) {
                Ok(text) => info!("{}", text),
                Err(bytes) => echo_bytes(bytes),
            }
        }

        let body = match validate_checksum(line) {
            Ok(body) => body,
            Err(e) => {
                self.invalidate();
                return Err(e);
            }
        };
        let Ok(body) = core::str::from_utf8(body) else {
            self.invalidate();
            return Err(NmeaError::MalformedSentence);
        };

        let result = self.parse_rmc(body);
        if result.is_err() {
            self.invalidate();
        }
        result
    }

    fn parse_rmc(&mut self, body: &str) -> Result<(), NmeaError> {
        let mut fields = Fields::new(body);
        if !is_rmc(fields.next_field()) {
            return Err(NmeaError::MalformedSentence);
        }

        let mut date_time_valid = true;
        let mut lat_long_valid = true;

        let time = parse_time(fields.next_field());
        if time.is_none() {
            trace!("nmea: bad time field");
            date_time_valid = false;
        }

        let Some(status) = fields.next_field().chars().next() else {
            return Err(NmeaError::FieldParseFailure(Field::Status));
        };
        // A void fix still carries a good time
        if status != 'A' {
            lat_long_valid = false;
        }

        let latitude = parse_coordinate(fields.next_field(), 2);
        let north_south = parse_hemisphere(fields.next_field(), 'N', 'S');
        let longitude = parse_coordinate(fields.next_field(), 3);
        let east_west = parse_hemisphere(fields.next_field(), 'E', 'W');

        // ground speed, track angle
        fields.next_field();
        fields.next_field();

        // Nothing is committed unless the date is good
        let Some((year, month, day)) = parse_date(fields.next_field()) else {
            return Err(NmeaError::FieldParseFailure(Field::Date));
        };

        if let Some((hour, minute, second)) = time {
            self.date_time = DateTimeFix {
                year,
                month,
                day,
                hour,
                minute,
                second,
            };
        }

        match (latitude, north_south, longitude, east_west) {
            (Some((lat_deg, lat_min)), Some(ns), Some((lon_deg, lon_min)), Some(ew))
                if lat_long_valid =>
            {
                self.lat_long.clear();
                if write!(
                    self.lat_long,
                    "{} {} {}, {} {} {}",
                    lat_deg, lat_min, ns, lon_deg, lon_min, ew
                )
                .is_err()
                {
                    lat_long_valid = false;
                }
            }
            (lat, ns, lon, ew) => {
                if lat_long_valid {
                    trace!(
                        "nmea: bad position fields {} {} {} {}",
                        lat.is_some(),
                        ns.is_some(),
                        lon.is_some(),
                        ew.is_some()
                    );
                }
                lat_long_valid = false;
            }
        }

        self.date_time_valid = date_time_valid;
        self.lat_long_valid = lat_long_valid;
        Ok(())
    }

    /// Reads lines from the receiver until one yields a date/time or
    /// `timeout_seconds` have passed. Returns whether a date/time was found.
    pub fn update_from_stream<S, U>(
        &mut self,
        serial: &mut S,
        uptime: &U,
        timeout_seconds: u16,
    ) -> bool
    where
        S: serial::Read<u8>,
        U: Uptime + ?Sized,
    {
        self.invalidate();

        let start = uptime.uptime_seconds();
        let mut line = LineBuf::new();
        let mut in_sentence = false;

        loop {
            if uptime.uptime_seconds().wrapping_sub(start) > u32::from(timeout_seconds) {
                trace!("nmea: no date/time within {} s", timeout_seconds);
                return false;
            }

            let byte = match serial.read() {
                Ok(b) => b,
                Err(nb::Error::WouldBlock) => {
                    core::hint::spin_loop();
                    continue;
                }
                Err(nb::Error::Other(_)) => {
                    debug!("nmea: serial read error, dropping line");
                    in_sentence = false;
                    continue;
                }
            };

            if !in_sentence {
                if byte == b'$' {
                    line.clear();
                    line.push(byte);
                    in_sentence = true;
                }
                continue;
            }

            if matches!(byte, b'\r' | b'\n' | 0) {
                in_sentence = false;
                if let Err(e) = self.update_from_line(&line) {
                    debug!("nmea: sentence rejected: {}", e);
                }
                if self.date_time_valid {
                    return true;
                }
            } else if line.try_push(byte).is_some() {
                debug!("nmea: line exceeds {} bytes, dropped", MAX_SENTENCE_LEN);
                in_sentence = false;
            }
        }
    }
}
