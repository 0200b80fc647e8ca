//! Acquisition of date/time and position fixes.
//!
//! Two tracks can be requested independently. While either is busy the
//! receiver is powered and, every `update_interval_minutes`, one decode
//! attempt reads the receiver for a few seconds. The session ends when both
//! tracks are done or the powered-on budget runs out.

use embedded_hal::serial;

use crate::{
    clock::{Uptime, WallClock},
    config::{AcquisitionConfig, ConfigError},
    lat_long::{FormatError, LatLong, LatLongText},
    nmea::{DateTimeFix, NmeaDecoder},
    receiver::{Receiver, SerialSession},
    ubx::{MgaIniTimeUtc, SendablePacket},
};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrackStatus {
    #[default]
    Idle,
    Busy,
    Succeeded,
    /// The powered-on budget ran out.
    Failed,
    /// Ended by [`Gps::turn_off`].
    Stopped,
}

impl TrackStatus {
    pub fn is_busy(self) -> bool {
        self == TrackStatus::Busy
    }

    pub fn is_succeeded(self) -> bool {
        self == TrackStatus::Succeeded
    }
}

#[derive(Default)]
struct Session {
    minutes_on: u16,
    last_update_minute: u8,
}

#[derive(Default)]
struct DateTimeTrack {
    status: TrackStatus,
    fix: DateTimeFix,
    sync_clock: bool,
}

#[derive(Default)]
struct LatLongTrack {
    status: TrackStatus,
    text: LatLongText,
    time: DateTimeFix,
}

pub struct Gps<R, C, U> {
    receiver: R,
    clock: C,
    uptime: U,
    decoder: NmeaDecoder,
    config: AcquisitionConfig,
    session: Session,
    date_time: DateTimeTrack,
    lat_long: LatLongTrack,
}

impl<R, C, U> Gps<R, C, U>
where
    R: Receiver,
    C: WallClock,
    U: Uptime,
{
    pub fn new(
        receiver: R,
        clock: C,
        uptime: U,
        config: AcquisitionConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            receiver,
            clock,
            uptime,
            decoder: NmeaDecoder::new(),
            config,
            session: Session::default(),
            date_time: DateTimeTrack::default(),
            lat_long: LatLongTrack::default(),
        })
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    pub fn receiver_mut(&mut self) -> &mut R {
        &mut self.receiver
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn echo_to_monitor(&mut self, echo: bool) {
        self.decoder.echo_to_monitor(echo);
    }

    fn is_any_busy(&self) -> bool {
        self.date_time.status.is_busy() || self.lat_long.status.is_busy()
    }

    fn start_session(&mut self) {
        self.receiver.power_on();
        self.session = Session {
            minutes_on: 0,
            last_update_minute: self.clock.minute_of_hour(),
        };
        info!("gps started");
    }

    /// Requests a date/time fix, optionally setting the wall clock from it.
    /// Ignored while a date/time request is already busy.
    pub fn initiate_date_time(&mut self, sync_clock: bool) {
        if self.date_time.status.is_busy() {
            return;
        }
        let starting = !self.is_any_busy();
        self.date_time = DateTimeTrack {
            status: TrackStatus::Busy,
            fix: DateTimeFix::default(),
            sync_clock,
        };
        if starting {
            self.start_session();
        }
    }

    /// Requests a position fix. Ignored while one is already busy.
    pub fn initiate_lat_long(&mut self) {
        if self.lat_long.status.is_busy() {
            return;
        }
        let starting = !self.is_any_busy();
        self.lat_long = LatLongTrack {
            status: TrackStatus::Busy,
            ..Default::default()
        };
        if starting {
            self.start_session();
        }
    }

    /// One tick of the acquisition session. Call periodically; only every
    /// `update_interval_minutes` of wall-clock time does it touch the
    /// receiver.
    pub fn update(&mut self) {
        if !self.is_any_busy() {
            return;
        }

        let interval = self.config.update_interval_minutes;
        let minute = self.clock.minute_of_hour() % 60;
        // A clock set backwards would otherwise look like most of an hour
        let delta = ((minute + 60 - self.session.last_update_minute % 60) % 60).min(interval);
        if delta < interval {
            return;
        }

        self.session.last_update_minute = minute;
        self.session.minutes_on = self.session.minutes_on.saturating_add(delta.into());

        {
            let mut session = SerialSession::open(&mut self.receiver, self.config.baud_rate);
            self.decoder.update_from_stream(
                session.serial(),
                &self.uptime,
                self.config.attempt_timeout_seconds,
            );
        }

        if self.date_time.status.is_busy() && self.decoder.is_date_time_valid() {
            self.date_time.status = TrackStatus::Succeeded;
            self.date_time.fix = self.decoder.date_time();
            info!(
                "gps: date/time {} after {} minutes",
                self.date_time.fix,
                self.session.minutes_on
            );
            if self.date_time.sync_clock {
                self.sync_clock();
            }
        }

        if self.lat_long.status.is_busy()
            && self.decoder.is_date_time_valid()
            && self.decoder.is_lat_long_valid()
        {
            self.lat_long.status = TrackStatus::Succeeded;
            self.lat_long.text = self.decoder.lat_long_text();
            self.lat_long.time = self.decoder.date_time();
            info!(
                "gps: position {} after {} minutes",
                self.lat_long.text.as_str(),
                self.session.minutes_on
            );
        }

        if !self.is_any_busy() {
            self.receiver.power_off();
            info!("gps stopped");
        } else if self.session.minutes_on >= self.config.max_minutes_on {
            self.receiver.power_off();
            if self.date_time.status.is_busy() {
                self.date_time.status = TrackStatus::Failed;
                warn!("gps: no date/time after {} minutes", self.session.minutes_on);
            }
            if self.lat_long.status.is_busy() {
                self.lat_long.status = TrackStatus::Failed;
                warn!("gps: no position after {} minutes", self.session.minutes_on);
            }
            info!("gps stopped");
        }
    }

    fn sync_clock(&mut self) {
        match self.date_time.fix.to_naive() {
            Some(now) => {
                self.clock.set(now);
                info!("clock synchronized to gps");
            }
            None => warn!("gps: date/time {} is not a calendar time", self.date_time.fix),
        }
    }

    /// Ends the session early. Busy tracks become `Stopped`.
    pub fn turn_off(&mut self) {
        if !self.is_any_busy() {
            return;
        }
        self.receiver.power_off();
        if self.date_time.status.is_busy() {
            self.date_time.status = TrackStatus::Stopped;
        }
        if self.lat_long.status.is_busy() {
            self.lat_long.status = TrackStatus::Stopped;
        }
        info!("gps turned off");
    }

    pub fn date_time_status(&self) -> TrackStatus {
        self.date_time.status
    }

    pub fn is_date_time_busy(&self) -> bool {
        self.date_time.status.is_busy()
    }

    pub fn is_date_time_succeeded(&self) -> bool {
        self.date_time.status.is_succeeded()
    }

    /// Zeroed unless the last date/time request succeeded.
    pub fn date_time(&self) -> DateTimeFix {
        self.date_time.fix
    }

    pub fn lat_long_status(&self) -> TrackStatus {
        self.lat_long.status
    }

    pub fn is_lat_long_busy(&self) -> bool {
        self.lat_long.status.is_busy()
    }

    pub fn is_lat_long_succeeded(&self) -> bool {
        self.lat_long.status.is_succeeded()
    }

    /// Empty unless the last position request succeeded.
    pub fn lat_long_text(&self) -> &str {
        self.lat_long.text.as_str()
    }

    /// Date/time of the sentence the position came from.
    pub fn lat_long_time(&self) -> DateTimeFix {
        self.lat_long.time
    }

    pub fn lat_long_position(&self) -> Result<LatLong, FormatError> {
        LatLong::from_text(self.lat_long_text())
    }
}

impl<R, C, U> Gps<R, C, U>
where
    R: Receiver,
    R::Serial: serial::Write<u8>,
    C: WallClock,
    U: Uptime,
{
    /// Sends the wall-clock time to the receiver to speed up the fix. Only
    /// while a session has the receiver powered; returns whether it was sent.
    pub fn send_time_assistance(&mut self) -> bool {
        if !self.is_any_busy() || !self.receiver.is_powered() {
            return false;
        }
        let packet = MgaIniTimeUtc::from_naive(&self.clock.now());
        let mut session = SerialSession::open(&mut self.receiver, self.config.baud_rate);
        match packet.write_blocking(session.serial()) {
            Ok(count) => {
                debug!("gps: sent {} bytes of time assistance", count);
                true
            }
            Err(_) => {
                warn!("gps: time assistance write failed");
                false
            }
        }
    }
}
