//! Calibration sweep against a light field that follows the servos.

mod common;

use common::{no_time_fix, FakeClock, MemoryStorage};
use motion::{run_sweep, Actuators, CalibrationResult, Orientation, Tracker, TrackerConfig};
use sensors::{LightSensor, Quadrant};
use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

/// Brightness falls off linearly with the distance from a peak pose.
#[derive(Clone)]
struct Spotlight {
    pose: Rc<Cell<Orientation>>,
    peak: Option<Orientation>,
    floor: u16,
}

impl Spotlight {
    fn peaked_at(peak: Orientation) -> Spotlight {
        Spotlight {
            pose: Rc::new(Cell::new(Orientation::CENTER)),
            peak: Some(peak),
            floor: 0,
        }
    }

    fn flat(level: u16) -> Spotlight {
        Spotlight {
            pose: Rc::new(Cell::new(Orientation::CENTER)),
            peak: None,
            floor: level,
        }
    }
}

impl LightSensor for Spotlight {
    type Error = Infallible;

    fn read(&mut self, _quadrant: Quadrant) -> Result<u16, Infallible> {
        let Some(peak) = self.peak else {
            return Ok(self.floor);
        };
        let pose = self.pose.get();
        let distance = (pose.yaw - peak.yaw).abs() + (pose.tilt - peak.tilt).abs();
        Ok(1000u16.saturating_sub(3 * distance as u16))
    }
}

impl Actuators for Spotlight {
    fn set_yaw(&mut self, degrees: i32) {
        let pose = self.pose.get();
        self.pose.set(Orientation::new(degrees, pose.tilt));
    }

    fn set_tilt(&mut self, degrees: i32) {
        let pose = self.pose.get();
        self.pose.set(Orientation::new(pose.yaw, degrees));
    }
}

fn sweep(light: Spotlight) -> (CalibrationResult, usize, FakeClock) {
    let cfg = TrackerConfig::default();
    let mut sensors = light.clone();
    let mut servos = light;
    let mut delay = FakeClock::default();
    let mut points = 0;
    let result = run_sweep(&mut sensors, &mut servos, &mut delay, &cfg, &mut || points += 1);
    (result, points, delay)
}

#[test]
fn finds_a_single_maximum_exactly() {
    let (result, points, _) = sweep(Spotlight::peaked_at(Orientation::new(65, 135)));
    assert_eq!(
        result,
        CalibrationResult {
            best_yaw: 65,
            best_tilt: 135,
            best_light_sum: 4000,
        }
    );
    assert_eq!(points, 18 * 16);
}

#[test]
fn every_point_waits_for_the_servos_to_settle() {
    use motion::Monotonic;

    let (_, points, delay) = sweep(Spotlight::peaked_at(Orientation::new(65, 135)));
    assert_eq!(delay.now_ms(), points as u64 * 300);
}

#[test]
fn ties_keep_the_first_point_swept() {
    let (result, _, _) = sweep(Spotlight::flat(500));
    assert_eq!((result.best_yaw, result.best_tilt), (5, 15));
    assert_eq!(result.best_light_sum, 2000);
}

#[test]
fn all_dark_sweep_keeps_the_center() {
    let (result, _, _) = sweep(Spotlight::flat(0));
    assert_eq!((result.best_yaw, result.best_tilt), (90, 90));
    assert_eq!(result.best_light_sum, 0);
}

#[test]
fn tracker_persists_and_moves_to_the_winner() {
    let light = Spotlight::peaked_at(Orientation::new(65, 135));
    let storage = MemoryStorage::default();
    let mut tracker = Tracker::new(
        TrackerConfig::default(),
        light.clone(),
        light.clone(),
        storage.clone(),
    );
    let clock = no_time_fix();
    let time = FakeClock::default();
    tracker.tick(&clock, 0);

    let mut delay = time.clone();
    let result = tracker.calibrate(&clock, &mut delay, &time, &mut || {});

    assert_eq!(result.orientation(), Orientation::new(65, 135));
    assert_eq!(tracker.orientation(), Orientation::new(65, 135));
    assert_eq!(light.pose.get(), Orientation::new(65, 135));
    assert_eq!(tracker.last_calibration(), Some(result));
    assert_eq!(storage.saved(), vec![Orientation::new(65, 135)]);

    // The INIT row and the forced calibration row, stamped after the sweep.
    let rows = storage.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1], "uptime:86400,65,135,,");
    assert_eq!(tracker.history().latest(), Some(Orientation::new(65, 135)));
}

#[test]
fn next_boot_starts_from_the_saved_calibration() {
    let light = Spotlight::peaked_at(Orientation::new(65, 135));
    let storage = MemoryStorage::default();
    let clock = no_time_fix();
    let time = FakeClock::default();

    let mut first = Tracker::new(
        TrackerConfig::default(),
        light.clone(),
        light.clone(),
        storage.clone(),
    );
    first.tick(&clock, 0);
    first.calibrate(&clock, &mut time.clone(), &time, &mut || {});

    let mut second = Tracker::new(TrackerConfig::default(), light.clone(), light, storage);
    second.tick(&clock, 0);
    assert_eq!(second.orientation(), Orientation::new(65, 135));
}
