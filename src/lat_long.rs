//! Latitude/longitude in fixed-point minutes of arc, and its text form.
//!
//! The text form is degrees and decimal minutes with a hemisphere letter:
//!
//! ```text
//! 48 02.39174 N, 123 03.67245 W
//! 00 30.45678 S, 179 59.99999 E
//! ```
//!
//! Degrees and whole minutes are unsigned, the decimal minutes carry at most
//! six digits. Values are stored with five decimal digits of a minute.
//! Rendered degrees are zero-padded to two and three digits, like the
//! receiver's own NMEA fields; parsing accepts any width.

use core::{fmt::Write, str::FromStr};

use thiserror::Error;

use crate::FmtBuf;

/// Fixed-point scale: one minute of arc.
pub const MINUTE: i32 = 100_000;
pub const DEGREE: i32 = 60 * MINUTE;

pub const MAX_LATITUDE: i32 = 90 * DEGREE;
pub const MAX_LONGITUDE: i32 = 180 * DEGREE;

/// Longest text form plus the terminator of the serial/monitor protocol.
pub const LAT_LONG_TEXT_CAPACITY: usize = 36;

pub type LatLongText = FmtBuf<LAT_LONG_TEXT_CAPACITY>;

const MAX_FRACTION_DIGITS: usize = 6;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FormatError {
    #[error("text does not match `d m.m H, d m.m H`")]
    Syntax,
    #[error("degrees out of range")]
    Degrees,
    #[error("minutes out of range")]
    Minutes,
    #[error("decimal minutes must be 1 to 6 digits")]
    FractionDigits,
    #[error("bad hemisphere letter")]
    Hemisphere,
    #[error("position exceeds the axis bound")]
    OutOfRange,
}

/// Position as minutes of arc times 1e5. Non-negative is North/East.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LatLong {
    pub latitude_minutes_x1e5: i32,
    pub longitude_minutes_x1e5: i32,
}

#[derive(Copy, Clone)]
enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn max_degrees(self) -> u32 {
        match self {
            Axis::Latitude => 90,
            Axis::Longitude => 180,
        }
    }

    fn bound(self) -> i32 {
        match self {
            Axis::Latitude => MAX_LATITUDE,
            Axis::Longitude => MAX_LONGITUDE,
        }
    }

    // (positive, negative, zero)
    fn letters(self) -> (char, char, char) {
        match self {
            Axis::Latitude => ('N', 'S', ' '),
            Axis::Longitude => ('E', 'W', ' '),
        }
    }
}

impl LatLong {
    pub const fn new(latitude_minutes_x1e5: i32, longitude_minutes_x1e5: i32) -> Self {
        Self {
            latitude_minutes_x1e5,
            longitude_minutes_x1e5,
        }
    }

    /// Renders `"DD MM.fffff H, DDD MM.fffff H"`. A zero axis gets a blank
    /// hemisphere letter.
    pub fn to_text(&self) -> LatLongText {
        let mut text = LatLongText::new();
        let (lat_deg, lat_min, lat_frac, lat_letter) =
            split(self.latitude_minutes_x1e5, Axis::Latitude);
        let (lon_deg, lon_min, lon_frac, lon_letter) =
            split(self.longitude_minutes_x1e5, Axis::Longitude);
        // Cannot overflow: any pair of i32 values renders in 30 characters or less.
        let _ = write!(
            text,
            "{:02} {:02}.{:05} {}, {:03} {:02}.{:05} {}",
            lat_deg, lat_min, lat_frac, lat_letter, lon_deg, lon_min, lon_frac, lon_letter
        );
        text
    }

    /// Parses the text form. Nothing is returned unless both axes are valid.
    pub fn from_text(text: &str) -> Result<Self, FormatError> {
        let mut scan = Scanner::new(text);

        let lat = scan_axis(&mut scan, Axis::Latitude)?;
        scan.expect(b',')?;
        let lon = scan_axis(&mut scan, Axis::Longitude)?;

        let lat = combine(lat, Axis::Latitude)?;
        let lon = combine(lon, Axis::Longitude)?;

        Ok(Self::new(lat, lon))
    }
}

impl FromStr for LatLong {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s)
    }
}

fn split(value: i32, axis: Axis) -> (u32, u32, u32, char) {
    let (positive, negative, zero) = axis.letters();
    let letter = match value {
        v if v > 0 => positive,
        v if v < 0 => negative,
        _ => zero,
    };
    let magnitude = value.unsigned_abs();
    let degrees = magnitude / DEGREE as u32;
    let minutes = magnitude % DEGREE as u32;
    (
        degrees,
        minutes / MINUTE as u32,
        minutes % MINUTE as u32,
        letter,
    )
}

struct AxisText {
    degrees: u32,
    minutes: u32,
    fraction_x1e6: u32,
    negative: bool,
}

fn scan_axis(scan: &mut Scanner<'_>, axis: Axis) -> Result<AxisText, FormatError> {
    let degrees = scan.unsigned()?;
    let minutes = scan.unsigned()?;
    scan.expect_adjacent(b'.')?;
    let digits = scan.word(MAX_FRACTION_DIGITS);
    let letter = scan.letter()?.to_ascii_uppercase();

    if degrees > axis.max_degrees() {
        return Err(FormatError::Degrees);
    }
    if minutes > 60 {
        return Err(FormatError::Minutes);
    }
    let fraction_x1e6 = decimal_minutes_x1e6(digits)?;

    let (positive, negative, _) = axis.letters();
    let negative = match letter as char {
        c if c == positive => false,
        c if c == negative => true,
        _ => return Err(FormatError::Hemisphere),
    };

    Ok(AxisText {
        degrees,
        minutes,
        fraction_x1e6,
        negative,
    })
}

/// Pads the decimal digits to six places: "5" is 500000.
fn decimal_minutes_x1e6(digits: &str) -> Result<u32, FormatError> {
    if digits.is_empty()
        || digits.len() > MAX_FRACTION_DIGITS
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(FormatError::FractionDigits);
    }
    let mut value: u32 = digits.parse().map_err(|_| FormatError::FractionDigits)?;
    for _ in digits.len()..MAX_FRACTION_DIGITS {
        value *= 10;
    }
    Ok(value)
}

fn combine(axis_text: AxisText, axis: Axis) -> Result<i32, FormatError> {
    // Both factors are range checked, so none of this overflows an i32.
    let minutes_x1e5 = axis_text.minutes as i32 * MINUTE + (axis_text.fraction_x1e6 / 10) as i32;
    if minutes_x1e5 > 60 * MINUTE {
        return Err(FormatError::Minutes);
    }
    let value = minutes_x1e5 + axis_text.degrees as i32 * DEGREE;
    if value > axis.bound() {
        return Err(FormatError::OutOfRange);
    }
    Ok(if axis_text.negative { -value } else { value })
}

/// Cursor over the text form. Whitespace before every token is skipped,
/// except before the decimal point.
struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn unsigned(&mut self) -> Result<u32, FormatError> {
        self.skip_whitespace();
        let rest = self.rest();
        let len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let value = rest[..len].parse().map_err(|_| FormatError::Syntax)?;
        self.pos += len;
        Ok(value)
    }

    fn expect(&mut self, byte: u8) -> Result<(), FormatError> {
        self.skip_whitespace();
        self.expect_adjacent(byte)
    }

    /// Like `expect`, but `byte` must directly follow the previous token.
    fn expect_adjacent(&mut self, byte: u8) -> Result<(), FormatError> {
        match self.rest().bytes().next() {
            Some(b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(FormatError::Syntax),
        }
    }

    /// Up to `max` non-whitespace characters.
    fn word(&mut self, max: usize) -> &'a str {
        self.skip_whitespace();
        let rest = self.rest();
        let len = rest
            .char_indices()
            .take_while(|(_, c)| !c.is_whitespace())
            .take(max)
            .last()
            .map_or(0, |(i, c)| i + c.len_utf8());
        self.pos += len;
        &rest[..len]
    }

    fn letter(&mut self) -> Result<u8, FormatError> {
        self.skip_whitespace();
        let rest = self.rest();
        match rest.chars().next() {
            Some(c) if c.is_ascii() => {
                self.pos += 1;
                Ok(c as u8)
            }
            Some(_) => Err(FormatError::Hemisphere),
            None => Err(FormatError::Syntax),
        }
    }
}
