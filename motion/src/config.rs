use crate::Orientation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tuning of the tracking loop. Every field has a default so a config file
/// only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    // Mechanical limits, protect the end stops.
    pub yaw_min: i32,
    pub yaw_max: i32,
    pub tilt_min: i32,
    pub tilt_max: i32,

    /// Set to -1 when a servo is mounted mirrored.
    pub yaw_dir: i32,
    pub tilt_dir: i32,

    pub dead_band_yaw: f32,
    pub dead_band_tilt: f32,
    pub step_yaw: i32,
    pub step_tilt: i32,

    /// Below this light sum the LDR differential is not trusted.
    pub min_light_sum: u32,
    pub night_threshold: u16,
    pub cloud_threshold: u16,
    pub state_change_threshold: u8,

    pub read_interval_ms: u64,
    pub status_log_interval_ms: u64,

    pub watchdog_timeout_ms: u64,
    pub watchdog_reset_window_ms: u64,
    pub watchdog_max_hits: u8,

    /// Minimum spacing of unforced durable history rows (flash wear).
    pub history_write_min_ms: u64,

    pub calibration_step_deg: i32,
    pub calibration_settle_ms: u32,

    pub sleep_orientation: Orientation,
    pub neutral_orientation: Orientation,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            yaw_min: 5,
            yaw_max: 175,
            tilt_min: 15,
            tilt_max: 165,
            yaw_dir: 1,
            tilt_dir: 1,
            dead_band_yaw: 0.01,
            dead_band_tilt: 0.01,
            step_yaw: 1,
            step_tilt: 1,
            min_light_sum: 100,
            night_threshold: 200,
            cloud_threshold: 600,
            state_change_threshold: 3,
            read_interval_ms: 200,
            status_log_interval_ms: 5_000,
            watchdog_timeout_ms: 5_000,
            watchdog_reset_window_ms: 600_000,
            watchdog_max_hits: 3,
            history_write_min_ms: 300_000,
            calibration_step_deg: 10,
            calibration_settle_ms: 300,
            sleep_orientation: Orientation::new(90, 70),
            neutral_orientation: Orientation::CENTER,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{axis} range is empty: min {min} > max {max}")]
    EmptyRange {
        axis: &'static str,
        min: i32,
        max: i32,
    },
    #[error("{0} must be positive")]
    NotPositive(&'static str),
    #[error("{name} must be 1 or -1, got {value}")]
    BadDirection { name: &'static str, value: i32 },
}

impl TrackerConfig {
    pub fn clamp_yaw(&self, yaw: i32) -> i32 {
        yaw.clamp(self.yaw_min, self.yaw_max)
    }

    pub fn clamp_tilt(&self, tilt: i32) -> i32 {
        tilt.clamp(self.tilt_min, self.tilt_max)
    }

    pub fn clamp(&self, o: Orientation) -> Orientation {
        Orientation::new(self.clamp_yaw(o.yaw), self.clamp_tilt(o.tilt))
    }

    pub fn contains(&self, o: Orientation) -> bool {
        self.clamp(o) == o
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.yaw_min > self.yaw_max {
            return Err(ConfigError::EmptyRange {
                axis: "yaw",
                min: self.yaw_min,
                max: self.yaw_max,
            });
        }
        if self.tilt_min > self.tilt_max {
            return Err(ConfigError::EmptyRange {
                axis: "tilt",
                min: self.tilt_min,
                max: self.tilt_max,
            });
        }
        for (name, value) in [("yaw_dir", self.yaw_dir), ("tilt_dir", self.tilt_dir)] {
            if value != 1 && value != -1 {
                return Err(ConfigError::BadDirection { name, value });
            }
        }
        let positive = [
            ("step_yaw", self.step_yaw > 0),
            ("step_tilt", self.step_tilt > 0),
            ("calibration_step_deg", self.calibration_step_deg > 0),
            ("state_change_threshold", self.state_change_threshold > 0),
            ("watchdog_max_hits", self.watchdog_max_hits > 0),
            ("read_interval_ms", self.read_interval_ms > 0),
        ];
        for (name, ok) in positive {
            if !ok {
                return Err(ConfigError::NotPositive(name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(TrackerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn clamp_respects_mechanical_stops() {
        let cfg = TrackerConfig::default();
        assert_eq!(cfg.clamp(Orientation::new(0, 200)), Orientation::new(5, 165));
        assert_eq!(cfg.clamp(Orientation::new(180, -3)), Orientation::new(175, 15));
        assert!(cfg.contains(Orientation::CENTER));
    }

    #[test]
    fn validation_names_the_bad_field() {
        let cfg = TrackerConfig {
            tilt_min: 170,
            ..TrackerConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::EmptyRange { axis: "tilt", .. })
        ));

        let cfg = TrackerConfig {
            yaw_dir: 0,
            ..TrackerConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::BadDirection {
                name: "yaw_dir",
                value: 0
            })
        );

        let cfg = TrackerConfig {
            step_tilt: 0,
            ..TrackerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::NotPositive("step_tilt")));
    }
}
