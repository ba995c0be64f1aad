use astronav::coords::noaa_sun::NOAASun;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;

/// Apparent position of the sun seen from the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SunPosition {
    /// Degrees clockwise from true north, in [0, 360).
    pub azimuth_deg: f64,
    /// Degrees above the horizon, in [-90, 90].
    pub altitude_deg: f64,
}

impl SunPosition {
    pub fn is_above_horizon(&self) -> bool {
        self.altitude_deg > 0.0
    }
}

/// Pure solar-position function.
pub trait Ephemeris {
    fn sun_position(&self, at: DateTime<Utc>, latitude: f64, longitude: f64) -> SunPosition;
}

/// NOAA low-accuracy solar position, computed by `astronav` in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noaa;

impl Ephemeris for Noaa {
    fn sun_position(&self, at: DateTime<Utc>, latitude: f64, longitude: f64) -> SunPosition {
        let sun = NOAASun {
            year: at.year() as u16,
            doy: at.ordinal() as u16,
            long: longitude as f32,
            lat: latitude as f32,
            timezone: 0.0,
            hour: at.hour() as u8,
            min: at.minute() as u8,
            sec: at.second() as u8,
        };

        // acos leaves its domain by rounding when the sun is straight overhead
        // or exactly on the meridian.
        let mut altitude = sun.altitude_in_deg();
        if altitude.is_nan() {
            let hour_angle = sun.ha_in_deg();
            altitude = if hour_angle < 90.0 || hour_angle > 270.0 {
                90.0
            } else {
                -90.0
            };
        }
        let mut azimuth = sun.azimuth_in_deg();
        if azimuth.is_nan() {
            azimuth = if sun.lat >= sun.alt_true_declination() {
                180.0
            } else {
                0.0
            };
        }

        SunPosition {
            azimuth_deg: azimuth.rem_euclid(360.0),
            altitude_deg: altitude.clamp(-90.0, 90.0),
        }
    }
}
