mod ephemeris;
mod timezone;

pub use ephemeris::{Ephemeris, Noaa, SunPosition};
pub use timezone::{is_eu_summer_time, TimezonePolicy};

pub mod clock {
    use crate::{Ephemeris, Noaa, SunPosition, TimezonePolicy};
    use chrono::prelude::*;
    use serde::{Deserialize, Serialize};
    use std::time::SystemTime;

    /// Earliest instant accepted as a synchronised wall clock (2020-01-01).
    pub const MIN_VALID_EPOCH_SECS: i64 = 1_577_836_800;

    /// Wall-clock provider. `now()` is `None` while no time fix exists.
    pub trait TimeSource {
        fn now(&self) -> Option<DateTime<Utc>>;

        fn is_time_valid(&self) -> bool {
            self.now().is_some()
        }
    }

    /// Host system clock, trusted once it reports a plausible date.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemTimeSource;

    impl TimeSource for SystemTimeSource {
        fn now(&self) -> Option<DateTime<Utc>> {
            let now: DateTime<Utc> = SystemTime::now().into();
            (now.timestamp() >= MIN_VALID_EPOCH_SECS).then_some(now)
        }
    }

    /// Site of the tracker.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct GeoConfig {
        pub latitude: f64,
        pub longitude: f64,
        /// Metres above sea level, only used for sunrise/sunset.
        #[serde(default)]
        pub altitude: f64,
        #[serde(default)]
        pub timezone: TimezonePolicy,
    }

    impl Default for GeoConfig {
        fn default() -> Self {
            GeoConfig {
                latitude: 52.52,
                longitude: 13.405,
                altitude: 0.0,
                timezone: TimezonePolicy::AutoEu,
            }
        }
    }

    impl GeoConfig {
        pub fn is_valid(&self) -> bool {
            (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
        }
    }

    /// Time service plus site plus ephemeris: everything needed to say where
    /// the sun is right now.
    pub struct Clock<T, E = Noaa> {
        time: T,
        ephemeris: E,
        geo: GeoConfig,
    }

    impl<T: TimeSource> Clock<T, Noaa> {
        pub fn new(time: T, geo: GeoConfig) -> Clock<T, Noaa> {
            Clock::with_ephemeris(time, Noaa, geo)
        }
    }

    impl<T: TimeSource, E: Ephemeris> Clock<T, E> {
        pub fn with_ephemeris(time: T, ephemeris: E, geo: GeoConfig) -> Clock<T, E> {
            Clock {
                time,
                ephemeris,
                geo,
            }
        }

        pub fn is_time_valid(&self) -> bool {
            self.time.is_time_valid()
        }

        /// Wall-clock time under the configured timezone policy.
        pub fn local_time(&self) -> Option<DateTime<FixedOffset>> {
            self.time.now().map(|now| self.geo.timezone.to_local(now))
        }

        /// Current offset from UTC in seconds, `None` without a time fix.
        pub fn offset_secs(&self) -> Option<i32> {
            self.time.now().map(|now| self.geo.timezone.offset_secs(now))
        }

        pub fn sun_position(&self) -> Option<SunPosition> {
            let now = self.time.now()?;
            Some(
                self.ephemeris
                    .sun_position(now, self.geo.latitude, self.geo.longitude),
            )
        }

        /// Today's sunrise and sunset in local time.
        pub fn sun_times(&self) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
            let now = self.time.now()?;
            let local_date = self.geo.timezone.to_local(now).date_naive();
            let (sunrise, sunset) = sun_times::sun_times(
                local_date,
                self.geo.latitude,
                self.geo.longitude,
                self.geo.altitude,
            )?;
            Some((
                self.geo.timezone.to_local(sunrise),
                self.geo.timezone.to_local(sunset),
            ))
        }

        pub fn geo(&self) -> &GeoConfig {
            &self.geo
        }

        pub fn set_geo(&mut self, geo: GeoConfig) {
            log::info!(
                "Site updated: lat {:.6}, lon {:.6}, tz {:?}",
                geo.latitude,
                geo.longitude,
                geo.timezone
            );
            self.geo = geo;
        }
    }

}

pub use clock::{Clock, GeoConfig, SystemTimeSource, TimeSource, MIN_VALID_EPOCH_SECS};
