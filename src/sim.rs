use embedded_hal::delay::DelayNs;
use motion::{Actuators, Orientation, SunTarget};
use sensors::{LightSensor, Quadrant, FULL_SCALE};
use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

const DAYLIGHT: f32 = 3000.0;
const NIGHT: f32 = 40.0;
// Differential saturates this many degrees off target.
const GRADIENT_SPAN_DEG: f32 = 30.0;
const GRADIENT_GAIN: f32 = 0.6;

#[derive(Debug)]
struct SimState {
    pose: Orientation,
    spot: Orientation,
    ambient: f32,
}

/// Synthetic panel for host runs: two servos and four LDRs under a single
/// bright spot. Clones share the same state, so one handle can drive the
/// tracker's sensors and another its actuators.
#[derive(Debug, Clone)]
pub struct SimRig {
    state: Rc<RefCell<SimState>>,
}

impl SimRig {
    pub fn new(spot: Orientation) -> SimRig {
        SimRig {
            state: Rc::new(RefCell::new(SimState {
                pose: Orientation::CENTER,
                spot,
                ambient: DAYLIGHT,
            })),
        }
    }

    /// Moves the bright spot onto the sun target, or darkens the sky when
    /// the sun is down. Without a time fix the spot stays where it is.
    pub fn follow(&self, sun: &SunTarget) {
        if !sun.valid {
            return;
        }
        let mut state = self.state.borrow_mut();
        if sun.altitude_deg > 0.0 {
            state.spot = sun.orientation();
            state.ambient = DAYLIGHT;
        } else {
            state.ambient = NIGHT;
        }
    }

    pub fn pose(&self) -> Orientation {
        self.state.borrow().pose
    }

    fn level(&self, quadrant: Quadrant) -> u16 {
        let state = self.state.borrow();
        let dy = (state.spot.yaw - state.pose.yaw) as f32;
        let dt = (state.spot.tilt - state.pose.tilt) as f32;
        let distance = (dy * dy + dt * dt).sqrt();
        let base = state.ambient * (1.0 - distance / 180.0).max(0.05);

        // The side facing the spot sees more light.
        let gy = (dy / GRADIENT_SPAN_DEG).clamp(-1.0, 1.0) * GRADIENT_GAIN;
        let gt = (dt / GRADIENT_SPAN_DEG).clamp(-1.0, 1.0) * GRADIENT_GAIN;
        let (h, v) = match quadrant {
            Quadrant::TopLeft => (1.0 + gy, 1.0 + gt),
            Quadrant::TopRight => (1.0 - gy, 1.0 + gt),
            Quadrant::BottomLeft => (1.0 + gy, 1.0 - gt),
            Quadrant::BottomRight => (1.0 - gy, 1.0 - gt),
        };
        (base * h * v).clamp(0.0, FULL_SCALE as f32) as u16
    }
}

impl LightSensor for SimRig {
    type Error = Infallible;

    fn read(&mut self, quadrant: Quadrant) -> Result<u16, Infallible> {
        Ok(self.level(quadrant))
    }
}

impl Actuators for SimRig {
    fn set_yaw(&mut self, degrees: i32) {
        self.state.borrow_mut().pose.yaw = degrees;
    }

    fn set_tilt(&mut self, degrees: i32) {
        self.state.borrow_mut().pose.tilt = degrees;
    }
}

/// Blocking delay on the host thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(ns as u64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motion::{Tracker, TrackerConfig, Volatile};
    use sensors::sample;

    #[test]
    fn panel_on_the_spot_is_balanced() {
        let mut rig = SimRig::new(Orientation::CENTER);
        let balance = sample(&mut rig).unwrap().balance();
        assert_eq!(balance.error_yaw, 0.0);
        assert_eq!(balance.error_tilt, 0.0);
        assert!(balance.total > 10_000);
    }

    #[test]
    fn brighter_side_faces_the_spot() {
        let mut rig = SimRig::new(Orientation::new(130, 60));
        let balance = sample(&mut rig).unwrap().balance();
        // Spot at higher yaw, lower tilt than the pose.
        assert!(balance.error_yaw > 0.0);
        assert!(balance.error_tilt < 0.0);
    }

    #[test]
    fn tracker_converges_on_the_spot() {
        let rig = SimRig::new(Orientation::new(120, 60));
        let mut tracker = Tracker::new(TrackerConfig::default(), rig.clone(), rig.clone(), Volatile);
        let clock = clock::Clock::new(NoFix, clock::GeoConfig::default());

        for i in 0..200 {
            tracker.tick(&clock, i * 200);
        }
        assert_eq!(tracker.orientation(), Orientation::new(120, 60));
        assert_eq!(rig.pose(), Orientation::new(120, 60));
    }

    #[test]
    fn night_sky_is_dark() {
        let mut rig = SimRig::new(Orientation::CENTER);
        let mut down = motion::SunTarget::invalid();
        down.valid = true;
        down.altitude_deg = -10.0;
        rig.follow(&down);
        assert!(sample(&mut rig).unwrap().is_dark(200));
    }

    struct NoFix;

    impl clock::TimeSource for NoFix {
        fn now(&self) -> Option<chrono::DateTime<chrono::Utc>> {
            None
        }
    }
}
