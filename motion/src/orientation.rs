use embedded_hal::pwm::SetDutyCycle;
use serde::{Deserialize, Serialize};

/// Panel pose in whole degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orientation {
    pub yaw: i32,
    pub tilt: i32,
}

impl Orientation {
    pub const CENTER: Orientation = Orientation::new(90, 90);

    pub const fn new(yaw: i32, tilt: i32) -> Orientation {
        Orientation { yaw, tilt }
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::CENTER
    }
}

/// The two servo outputs. Writes are fire-and-forget.
pub trait Actuators {
    fn set_yaw(&mut self, degrees: i32);
    fn set_tilt(&mut self, degrees: i32);
}

// SG90-class hobby servo on a 50 Hz frame.
const PERIOD_US: u32 = 20_000;
const MIN_PULSE_US: u32 = 500;
const MAX_PULSE_US: u32 = 2500;
const SERVO_RANGE_DEG: u32 = 180;

/// Angle-to-pulse driver for one hobby servo on any PWM channel.
pub struct Servo<P> {
    pwm: P,
    min_pulse_us: u32,
    max_pulse_us: u32,
}

impl<P: SetDutyCycle> Servo<P> {
    pub fn new(pwm: P) -> Servo<P> {
        Servo {
            pwm,
            min_pulse_us: MIN_PULSE_US,
            max_pulse_us: MAX_PULSE_US,
        }
    }

    /// Duty value for an angle; angles outside 0..=180 are clamped.
    pub fn duty_for(&self, degrees: i32) -> u16 {
        let angle = degrees.clamp(0, SERVO_RANGE_DEG as i32) as u32;
        let pulse_us =
            self.min_pulse_us + angle * (self.max_pulse_us - self.min_pulse_us) / SERVO_RANGE_DEG;
        let duty = pulse_us as u64 * self.pwm.max_duty_cycle() as u64 / PERIOD_US as u64;
        duty as u16
    }

    pub fn set_angle(&mut self, degrees: i32) -> Result<(), P::Error> {
        let duty = self.duty_for(degrees);
        self.pwm.set_duty_cycle(duty)
    }
}

/// Yaw servo on the base, tilt servo on the panel bracket.
pub struct ServoPair<Y, T> {
    yaw: Servo<Y>,
    tilt: Servo<T>,
}

impl<Y: SetDutyCycle, T: SetDutyCycle> ServoPair<Y, T> {
    pub fn new(yaw: Servo<Y>, tilt: Servo<T>) -> ServoPair<Y, T> {
        ServoPair { yaw, tilt }
    }
}

impl<Y: SetDutyCycle, T: SetDutyCycle> Actuators for ServoPair<Y, T> {
    fn set_yaw(&mut self, degrees: i32) {
        if let Err(e) = self.yaw.set_angle(degrees) {
            log::warn!("Yaw servo write failed: {:?}", e);
        }
    }

    fn set_tilt(&mut self, degrees: i32) {
        if let Err(e) = self.tilt.set_angle(degrees) {
            log::warn!("Tilt servo write failed: {:?}", e);
        }
    }
}
