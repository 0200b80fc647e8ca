//! Time sources: the calendar clock that acquisition reads and synchronizes,
//! and the monotonic uptime used to bound decode attempts.

use chrono::{Duration, NaiveDateTime, Timelike};

/// Calendar time, UTC.
pub trait WallClock {
    fn now(&self) -> NaiveDateTime;

    fn set(&mut self, now: NaiveDateTime);

    fn minute_of_hour(&self) -> u8 {
        self.now().minute() as u8
    }
}

/// Monotonic seconds since some fixed point. May wrap.
pub trait Uptime {
    fn uptime_seconds(&self) -> u32;
}

impl<T: Uptime + ?Sized> Uptime for &T {
    fn uptime_seconds(&self) -> u32 {
        (**self).uptime_seconds()
    }
}

/// Wall clock kept in software as an epoch plus elapsed uptime.
///
/// Starts at the Unix epoch and reports [`SoftClock::is_synced`] as false
/// until the first [`WallClock::set`].
pub struct SoftClock<U> {
    uptime: U,
    epoch: NaiveDateTime,
    epoch_uptime: u32,
    synced: bool,
}

impl<U: Uptime> SoftClock<U> {
    pub fn new(uptime: U) -> Self {
        let epoch_uptime = uptime.uptime_seconds();
        Self {
            uptime,
            epoch: NaiveDateTime::default(),
            epoch_uptime,
            synced: false,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn uptime(&self) -> &U {
        &self.uptime
    }
}

impl<U: Uptime> WallClock for SoftClock<U> {
    fn now(&self) -> NaiveDateTime {
        let elapsed = self.uptime.uptime_seconds().wrapping_sub(self.epoch_uptime);
        self.epoch
            .checked_add_signed(Duration::seconds(elapsed.into()))
            .unwrap_or(self.epoch)
    }

    fn set(&mut self, now: NaiveDateTime) {
        self.epoch = now;
        self.epoch_uptime = self.uptime.uptime_seconds();
        self.synced = true;
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::mock::ManualUptime;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .unwrap()
    }

    #[test]
    fn test_soft_clock_follows_uptime() {
        let uptime = ManualUptime::new(1_000);
        let mut clock = SoftClock::new(&uptime);
        assert!(!clock.is_synced());
        assert_eq!(clock.now(), NaiveDateTime::default());

        clock.set(at(7, 8, 9));
        assert!(clock.is_synced());
        assert_eq!(clock.minute_of_hour(), 8);

        uptime.advance(3_600 + 61);
        assert_eq!(clock.now(), at(8, 9, 10));
        assert_eq!(clock.minute_of_hour(), 9);
    }

    #[test]
    fn test_soft_clock_uptime_wraps() {
        let uptime = ManualUptime::new(u32::MAX - 1);
        let mut clock = SoftClock::new(&uptime);
        clock.set(at(0, 0, 0));
        uptime.advance(5);
        assert_eq!(clock.now(), at(0, 0, 5));
    }
}
