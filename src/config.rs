use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[error("update interval of {0} minutes is outside 1..=59")]
    UpdateInterval(u8),
    #[error("attempt timeout must be at least one second")]
    AttemptTimeout,
    #[error("power budget of {max_minutes_on} minutes is shorter than the {interval} minute update interval")]
    Budget { max_minutes_on: u16, interval: u8 },
    #[error("baud rate must be nonzero")]
    BaudRate,
}

/// Limits for one acquisition session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcquisitionConfig {
    /// Powered-on minutes before busy tracks fail.
    pub max_minutes_on: u16,
    /// Minutes between decode attempts.
    pub update_interval_minutes: u8,
    /// How long one decode attempt may read the receiver.
    pub attempt_timeout_seconds: u16,
    pub baud_rate: u32,
}

impl AcquisitionConfig {
    pub const DEFAULT: Self = Self {
        max_minutes_on: 180,
        update_interval_minutes: 10,
        attempt_timeout_seconds: 5,
        baud_rate: 9600,
    };

    pub const fn with_max_minutes_on(mut self, minutes: u16) -> Self {
        self.max_minutes_on = minutes;
        self
    }

    pub const fn with_update_interval_minutes(mut self, minutes: u8) -> Self {
        self.update_interval_minutes = minutes;
        self
    }

    pub const fn with_attempt_timeout_seconds(mut self, seconds: u16) -> Self {
        self.attempt_timeout_seconds = seconds;
        self
    }

    pub const fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Elapsed minutes are taken from the minute of the hour
        if !(1..=59).contains(&self.update_interval_minutes) {
            return Err(ConfigError::UpdateInterval(self.update_interval_minutes));
        }
        if self.attempt_timeout_seconds == 0 {
            return Err(ConfigError::AttemptTimeout);
        }
        if self.max_minutes_on < u16::from(self.update_interval_minutes) {
            return Err(ConfigError::Budget {
                max_minutes_on: self.max_minutes_on,
                interval: self.update_interval_minutes,
            });
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::BaudRate);
        }
        Ok(())
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
