use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local, Timelike, Utc};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};

/// Source of "now" and of the wall-clock zone used for hour bucketing.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;

    /// The wall-clock hour (0-23) at which `at` falls.
    fn local_hour(&self, at: DateTime<Utc>) -> u32;
}

/// A clock shared between request handlers.
pub type SharedClock = Arc<dyn Clock>;

/// The real clock. Hours are bucketed in the server process's local time zone,
/// not the election's.
#[derive(Debug, Copy, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_hour(&self, at: DateTime<Utc>) -> u32 {
        at.with_timezone(&Local).hour()
    }
}

/// A clock frozen at a given instant, with an explicit UTC offset standing in
/// for the local zone.
#[derive(Debug, Copy, Clone)]
pub struct FixedClock {
    now: DateTime<Utc>,
    offset: FixedOffset,
}

impl FixedClock {
    /// Freeze at `now`, bucketing hours in UTC.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self::with_offset(now, FixedOffset::east_opt(0).expect("Zero offset is valid"))
    }

    pub fn with_offset(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now, offset }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn local_hour(&self, at: DateTime<Utc>) -> u32 {
        at.with_timezone(&self.offset).hour()
    }
}

/// A fairing that places the system clock into managed state, unless a clock
/// has already been provided (e.g. by tests).
pub struct ClockFairing;

#[rocket::async_trait]
impl Fairing for ClockFairing {
    fn info(&self) -> Info {
        Info {
            name: "Clock",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        if rocket.state::<SharedClock>().is_some() {
            debug!("Using pre-configured clock");
            return Ok(rocket);
        }
        let clock: SharedClock = Arc::new(SystemClock);
        Ok(rocket.manage(clock))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn fixed_clock_buckets_in_its_offset() {
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 23, 30, 0).unwrap();
        let utc = FixedClock::at(now);
        assert_eq!(utc.now(), now);
        assert_eq!(utc.local_hour(now), 23);

        let plus_two = FixedClock::with_offset(now, FixedOffset::east_opt(2 * 3600).unwrap());
        assert_eq!(plus_two.local_hour(now), 1);
    }
}
