//! Host-side stand-ins for the receiver, its serial port and the clocks.

use std::{cell::Cell, collections::VecDeque};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use embedded_hal::serial;

use crate::{
    clock::{Uptime, WallClock},
    receiver::{Receiver, SerialPort},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MockSerialError;

/// Serial port that replays queued bytes and records written ones.
#[derive(Default)]
pub struct ScriptedSerial {
    // None is a read error
    rx: VecDeque<Option<u8>>,
    pub tx: Vec<u8>,
    pub baud_rate: Option<u32>,
    pub opens: usize,
    pub closes: usize,
    open: bool,
}

impl ScriptedSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied().map(Some));
    }

    /// Queues `line` followed by CR LF.
    pub fn feed_line(&mut self, line: &str) {
        self.feed(line.as_bytes());
        self.feed(b"\r\n");
    }

    pub fn feed_error(&mut self) {
        self.rx.push_back(None);
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl serial::Read<u8> for ScriptedSerial {
    type Error = MockSerialError;

    fn read(&mut self) -> nb::Result<u8, MockSerialError> {
        match self.rx.pop_front() {
            Some(Some(b)) => Ok(b),
            Some(None) => Err(nb::Error::Other(MockSerialError)),
            None => Err(nb::Error::WouldBlock),
        }
    }
}

impl serial::Write<u8> for ScriptedSerial {
    type Error = MockSerialError;

    fn write(&mut self, word: u8) -> nb::Result<(), MockSerialError> {
        self.tx.push(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), MockSerialError> {
        Ok(())
    }
}

impl SerialPort for ScriptedSerial {
    fn open(&mut self, baud_rate: u32) {
        self.baud_rate = Some(baud_rate);
        self.opens += 1;
        self.open = true;
    }

    fn close(&mut self) {
        self.closes += 1;
        self.open = false;
    }
}

/// Receiver that only records what it was asked to do.
#[derive(Default)]
pub struct MockReceiver {
    pub serial: ScriptedSerial,
    pub power_ons: usize,
    pub power_offs: usize,
    powered: bool,
}

impl MockReceiver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Receiver for MockReceiver {
    type Serial = ScriptedSerial;

    fn power_on(&mut self) {
        self.power_ons += 1;
        self.powered = true;
    }

    fn power_off(&mut self) {
        self.power_offs += 1;
        self.powered = false;
    }

    fn is_powered(&self) -> bool {
        self.powered
    }

    fn open_serial(&mut self, baud_rate: u32) {
        self.serial.open(baud_rate);
    }

    fn serial(&mut self) -> &mut ScriptedSerial {
        &mut self.serial
    }

    fn close_serial(&mut self) {
        self.serial.close();
    }
}

/// Wall clock that only moves when told to.
pub struct MockClock {
    pub now: NaiveDateTime,
    pub sets: Vec<NaiveDateTime>,
}

impl MockClock {
    /// 2024-05-06 at `hour:minute:00`.
    pub fn at(hour: u32, minute: u32) -> Self {
        let now = NaiveDate::from_ymd_opt(2024, 5, 6)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .unwrap();
        Self {
            now,
            sets: Vec::new(),
        }
    }

    pub fn advance_minutes(&mut self, minutes: i64) {
        self.now += Duration::minutes(minutes);
    }
}

impl WallClock for MockClock {
    fn now(&self) -> NaiveDateTime {
        self.now
    }

    fn set(&mut self, now: NaiveDateTime) {
        self.now = now;
        self.sets.push(now);
    }
}

/// Uptime moved by hand.
pub struct ManualUptime(Cell<u32>);

impl ManualUptime {
    pub fn new(seconds: u32) -> Self {
        Self(Cell::new(seconds))
    }

    pub fn advance(&self, seconds: u32) {
        self.0.set(self.0.get().wrapping_add(seconds));
    }
}

impl Uptime for ManualUptime {
    fn uptime_seconds(&self) -> u32 {
        self.0.get()
    }
}

/// Uptime that advances a fraction of a second every time it is read, so
/// polling loops run out their timeouts.
#[derive(Default)]
pub struct TickingUptime {
    reads: Cell<u32>,
}

impl TickingUptime {
    pub const READS_PER_SECOND: u32 = 256;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> u32 {
        self.reads.get()
    }
}

impl Uptime for TickingUptime {
    fn uptime_seconds(&self) -> u32 {
        let reads = self.reads.get();
        self.reads.set(reads.wrapping_add(1));
        reads / Self::READS_PER_SECOND
    }
}
