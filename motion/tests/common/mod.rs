//! Shared fakes for the tracker scenarios.
//!
//! Every fake hands out a cloneable handle so a test can keep poking at the
//! hardware after the tracker has taken ownership of it.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use clock::{Clock, Ephemeris, GeoConfig, SunPosition, TimeSource};
use embedded_hal::delay::DelayNs;
use motion::{
    Actuators, HistoryRow, Monotonic, Orientation, Persistence, Tracker, TrackerConfig,
};
use sensors::{LightSensor, Quadrant, SensorFrame};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Light sensor returning whatever frame the test last set.
#[derive(Clone, Default)]
pub struct SharedFrame {
    frame: Rc<Cell<SensorFrame>>,
    broken: Rc<Cell<bool>>,
    reads: Rc<Cell<u32>>,
}

#[derive(Debug)]
pub struct ReadError;

impl SharedFrame {
    pub fn new(frame: SensorFrame) -> SharedFrame {
        let s = SharedFrame::default();
        s.set(frame);
        s
    }

    pub fn set(&self, frame: SensorFrame) {
        self.frame.set(frame);
    }

    pub fn set_uniform(&self, value: u16) {
        self.frame.set(SensorFrame::uniform(value));
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.set(broken);
    }

    /// Channel reads so far, successful or not.
    pub fn reads(&self) -> u32 {
        self.reads.get()
    }
}

impl LightSensor for SharedFrame {
    type Error = ReadError;

    fn read(&mut self, quadrant: Quadrant) -> Result<u16, ReadError> {
        self.reads.set(self.reads.get() + 1);
        if self.broken.get() {
            return Err(ReadError);
        }
        Ok(self.frame.get().get(quadrant))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Yaw(i32),
    Tilt(i32),
}

/// Records every servo command in order.
#[derive(Clone, Default)]
pub struct RecordingActuators {
    log: Rc<RefCell<Vec<Command>>>,
}

impl RecordingActuators {
    pub fn commands(&self) -> Vec<Command> {
        self.log.borrow().clone()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }
}

impl Actuators for RecordingActuators {
    fn set_yaw(&mut self, degrees: i32) {
        self.log.borrow_mut().push(Command::Yaw(degrees));
    }

    fn set_tilt(&mut self, degrees: i32) {
        self.log.borrow_mut().push(Command::Tilt(degrees));
    }
}

#[derive(Default)]
pub struct Store {
    pub calibration: Option<Orientation>,
    pub rows: Vec<String>,
    pub saved: Vec<Orientation>,
}

/// In-memory persistence with an inspectable backing store.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    pub inner: Rc<RefCell<Store>>,
}

impl MemoryStorage {
    pub fn with_calibration(o: Orientation) -> MemoryStorage {
        let s = MemoryStorage::default();
        s.inner.borrow_mut().calibration = Some(o);
        s
    }

    pub fn rows(&self) -> Vec<String> {
        self.inner.borrow().rows.clone()
    }

    pub fn saved(&self) -> Vec<Orientation> {
        self.inner.borrow().saved.clone()
    }
}

impl Persistence for MemoryStorage {
    fn load_calibration(&mut self) -> anyhow::Result<Option<Orientation>> {
        Ok(self.inner.borrow().calibration)
    }

    fn save_calibration(&mut self, orientation: Orientation) -> anyhow::Result<()> {
        let mut store = self.inner.borrow_mut();
        store.calibration = Some(orientation);
        store.saved.push(orientation);
        Ok(())
    }

    fn append_history_row(&mut self, row: &HistoryRow) -> anyhow::Result<()> {
        self.inner.borrow_mut().rows.push(row.to_string());
        Ok(())
    }
}

/// Manually advanced monotonic clock. Delays advance it too, so a
/// calibration sweep consumes simulated time.
#[derive(Clone, Default)]
pub struct FakeClock {
    nanos: Rc<Cell<u64>>,
}

impl FakeClock {
    pub fn advance_ms(&self, ms: u64) {
        self.nanos.set(self.nanos.get() + ms * 1_000_000);
    }

    pub fn set_ms(&self, ms: u64) {
        self.nanos.set(ms * 1_000_000);
    }
}

impl Monotonic for FakeClock {
    fn now_ms(&self) -> u64 {
        self.nanos.get() / 1_000_000
    }
}

impl DelayNs for FakeClock {
    fn delay_ns(&mut self, ns: u32) {
        self.nanos.set(self.nanos.get() + ns as u64);
    }
}

/// Wall clock stuck at one instant, or absent.
pub struct Frozen(pub Option<DateTime<Utc>>);

impl TimeSource for Frozen {
    fn now(&self) -> Option<DateTime<Utc>> {
        self.0
    }
}

/// Ephemeris that always reports the same position.
#[derive(Clone, Copy)]
pub struct FixedSun(pub SunPosition);

impl Ephemeris for FixedSun {
    fn sun_position(&self, _at: DateTime<Utc>, _latitude: f64, _longitude: f64) -> SunPosition {
        self.0
    }
}

pub fn summer_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
}

pub fn sun_at(azimuth_deg: f64, altitude_deg: f64) -> Clock<Frozen, FixedSun> {
    Clock::with_ephemeris(
        Frozen(Some(summer_noon())),
        FixedSun(SunPosition {
            azimuth_deg,
            altitude_deg,
        }),
        GeoConfig::default(),
    )
}

pub fn no_time_fix() -> Clock<Frozen, FixedSun> {
    Clock::with_ephemeris(
        Frozen(None),
        FixedSun(SunPosition {
            azimuth_deg: 0.0,
            altitude_deg: -90.0,
        }),
        GeoConfig::default(),
    )
}

pub struct Rig {
    pub light: SharedFrame,
    pub servos: RecordingActuators,
    pub storage: MemoryStorage,
}

pub type TestTracker = Tracker<SharedFrame, RecordingActuators, MemoryStorage>;

pub fn rig(config: TrackerConfig, frame: SensorFrame) -> (Rig, TestTracker) {
    rig_with_storage(config, frame, MemoryStorage::default())
}

pub fn rig_with_storage(
    config: TrackerConfig,
    frame: SensorFrame,
    storage: MemoryStorage,
) -> (Rig, TestTracker) {
    let light = SharedFrame::new(frame);
    let servos = RecordingActuators::default();
    let tracker = Tracker::new(config, light.clone(), servos.clone(), storage.clone());
    (
        Rig {
            light,
            servos,
            storage,
        },
        tracker,
    )
}

/// Bright and perfectly balanced: no differential correction.
pub fn balanced() -> SensorFrame {
    SensorFrame::uniform(2000)
}
