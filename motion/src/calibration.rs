use crate::{Actuators, Orientation, TrackerConfig};
use embedded_hal::delay::DelayNs;
use sensors::{sample, LightSensor};
use serde::{Deserialize, Serialize};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub best_yaw: i32,
    pub best_tilt: i32,
    pub best_light_sum: u32,
}

impl CalibrationResult {
    pub fn orientation(&self) -> Orientation {
        Orientation::new(self.best_yaw, self.best_tilt)
    }
}

/// Sweep points, yaw outer and tilt inner, each axis from its minimum in
/// fixed steps up to (and including, when on-grid) its maximum.
pub fn sweep_grid(cfg: &TrackerConfig) -> impl Iterator<Item = Orientation> {
    let step = cfg.calibration_step_deg.max(1) as usize;
    let (tilt_min, tilt_max) = (cfg.tilt_min, cfg.tilt_max);
    (cfg.yaw_min..=cfg.yaw_max)
        .step_by(step)
        .flat_map(move |yaw| {
            (tilt_min..=tilt_max)
                .step_by(step)
                .map(move |tilt| Orientation::new(yaw, tilt))
        })
}

/// Drives both servos over the grid: command, settle, sample. Keeps the
/// strictly brightest point, so ties go to the lowest yaw then lowest tilt.
/// `service` runs after every point and must not touch the actuators.
pub fn run_sweep<S, A, D>(
    sensors: &mut S,
    actuators: &mut A,
    delay: &mut D,
    cfg: &TrackerConfig,
    service: &mut dyn FnMut(),
) -> CalibrationResult
where
    S: LightSensor,
    A: Actuators,
    D: DelayNs,
{
    log::info!("========================================");
    log::info!("Starting calibration sweep");

    let mut best = CalibrationResult {
        best_yaw: cfg.neutral_orientation.yaw,
        best_tilt: cfg.neutral_orientation.tilt,
        best_light_sum: 0,
    };

    for point in sweep_grid(cfg) {
        actuators.set_yaw(point.yaw);
        actuators.set_tilt(point.tilt);
        delay.delay_ms(cfg.calibration_settle_ms);

        let light_sum = match sample(sensors) {
            Ok(frame) => frame.total(),
            Err(e) => {
                log::warn!("Calibration read failed at {:?}: {:?}", point, e);
                0
            }
        };
        log::debug!(
            "Test yaw={} tilt={} -> light sum {}",
            point.yaw,
            point.tilt,
            light_sum
        );

        if light_sum > best.best_light_sum {
            best = CalibrationResult {
                best_yaw: point.yaw,
                best_tilt: point.tilt,
                best_light_sum: light_sum,
            };
            log::debug!("  new maximum at yaw={} tilt={}", point.yaw, point.tilt);
        }

        service();
    }

    log::info!(
        "Calibration done: yaw={} tilt={} (max light {})",
        best.best_yaw,
        best.best_tilt,
        best.best_light_sum
    );
    log::info!("========================================");
    best
}
