use crate::{Orientation, TrackerConfig};
use clock::{Clock, Ephemeris, SunPosition, TimeSource};
use serde::Serialize;

/// Where the ephemeris says the panel should point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SunTarget {
    pub azimuth_deg: f64,
    pub altitude_deg: f64,
    pub target_yaw: i32,
    pub target_tilt: i32,
    /// False when there is no time fix; the other fields are then meaningless.
    pub valid: bool,
}

/// Integer linear rescale, truncating like the servo firmware always has.
fn map_range(x: i32, in_min: i32, in_max: i32, out_min: i32, out_max: i32) -> i32 {
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

impl SunTarget {
    pub const fn invalid() -> SunTarget {
        SunTarget {
            azimuth_deg: 0.0,
            altitude_deg: 0.0,
            target_yaw: 90,
            target_tilt: 90,
            valid: false,
        }
    }

    /// Azimuth 0..360 maps onto yaw 0..180, altitude 0..90 onto the tilt range;
    /// both clamped to the mechanical limits.
    pub fn from_position(pos: SunPosition, cfg: &TrackerConfig) -> SunTarget {
        let yaw = map_range(pos.azimuth_deg as i32, 0, 360, 0, 180);
        let tilt = map_range(pos.altitude_deg as i32, 0, 90, cfg.tilt_min, cfg.tilt_max);
        SunTarget {
            azimuth_deg: pos.azimuth_deg,
            altitude_deg: pos.altitude_deg,
            target_yaw: cfg.clamp_yaw(yaw),
            target_tilt: cfg.clamp_tilt(tilt),
            valid: true,
        }
    }

    pub fn predict<T: TimeSource, E: Ephemeris>(
        clock: &Clock<T, E>,
        cfg: &TrackerConfig,
    ) -> SunTarget {
        clock
            .sun_position()
            .map(|pos| SunTarget::from_position(pos, cfg))
            .unwrap_or(SunTarget::invalid())
    }

    /// Whether the target should pull the panel this tick.
    pub fn pulls(&self) -> bool {
        self.valid && self.altitude_deg > 0.0
    }

    pub fn orientation(&self) -> Orientation {
        Orientation::new(self.target_yaw, self.target_tilt)
    }
}
