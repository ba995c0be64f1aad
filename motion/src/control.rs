use crate::calibration::CalibrationResult;
use crate::watchdog::{Watchdog, WatchdogAction};
use crate::{
    Actuators, Monotonic, Orientation, Persistence, StopFlag, SunTarget, Tracker, TrackerState,
};
use clock::{Clock, Ephemeris, GeoConfig, Noaa, TimeSource};
use embedded_hal::delay::DelayNs;
use sensors::LightSensor;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    /// The watchdog gave up; the host should reboot.
    Restart,
}

/// Snapshot for front ends.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerStatus {
    pub state: TrackerState,
    pub orientation: Orientation,
    pub sun: SunTarget,
    pub stop_requested: bool,
    pub time_valid: bool,
    pub local_time: Option<String>,
    pub utc_offset_secs: Option<i32>,
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub light_sum: Option<u32>,
    pub calibration: Option<CalibrationResult>,
    pub watchdog_hits: u8,
    pub soft_reinits: u32,
    pub history: Vec<Orientation>,
    pub uptime_ms: u64,
}

/// Tracker plus watchdog plus time: one call to `iterate` per main loop pass.
pub struct ControlLoop<S, A, P, T, M, E = Noaa> {
    tracker: Tracker<S, A, P>,
    watchdog: Watchdog,
    clock: Clock<T, E>,
    monotonic: M,
}

impl<S, A, P, T, M, E> ControlLoop<S, A, P, T, M, E>
where
    S: LightSensor,
    A: Actuators,
    P: Persistence,
    T: TimeSource,
    M: Monotonic,
    E: Ephemeris,
{
    pub fn new(tracker: Tracker<S, A, P>, clock: Clock<T, E>, monotonic: M) -> Self {
        let watchdog = Watchdog::from_config(tracker.config(), monotonic.now_ms());
        ControlLoop {
            tracker,
            watchdog,
            clock,
            monotonic,
        }
    }

    pub fn iterate(&mut self) -> LoopAction {
        let now = self.monotonic.now_ms();
        match self.watchdog.check(now) {
            WatchdogAction::None => {}
            WatchdogAction::SoftReinit => self.tracker.soft_reinit(now),
            WatchdogAction::HardRestart => return LoopAction::Restart,
        }
        self.watchdog.feed(now);

        if let Some(state) = self.tracker.tick(&self.clock, now) {
            log::debug!("Tracker now {}", state);
        }

        self.watchdog.feed(self.monotonic.now_ms());
        LoopAction::Continue
    }

    /// Refreshes liveness after blocking work outside `iterate`.
    pub fn mark_alive(&mut self) {
        self.watchdog.feed(self.monotonic.now_ms());
    }

    /// Runs a calibration sweep. The watchdog is fed after every grid point,
    /// then `service` runs.
    pub fn calibrate<D: DelayNs>(
        &mut self,
        delay: &mut D,
        service: &mut dyn FnMut(),
    ) -> CalibrationResult {
        let watchdog = &mut self.watchdog;
        let monotonic = &self.monotonic;

        let mut hook = || {
            watchdog.feed(monotonic.now_ms());
            service();
        };
        let result = self
            .tracker
            .calibrate(&self.clock, delay, monotonic, &mut hook);

        self.mark_alive();
        result
    }

    pub fn status(&self) -> TrackerStatus {
        let sun_times = self.clock.sun_times();
        let geo = self.clock.geo();
        TrackerStatus {
            state: self.tracker.state(),
            orientation: self.tracker.orientation(),
            sun: self.tracker.sun_target(),
            stop_requested: self.tracker.stop_flag().is_set(),
            time_valid: self.clock.is_time_valid(),
            local_time: self
                .clock
                .local_time()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            utc_offset_secs: self.clock.offset_secs(),
            sunrise: sun_times.map(|(rise, _)| rise.format("%H:%M").to_string()),
            sunset: sun_times.map(|(_, set)| set.format("%H:%M").to_string()),
            latitude: geo.latitude,
            longitude: geo.longitude,
            light_sum: self.tracker.last_frame().map(|f| f.total()),
            calibration: self.tracker.last_calibration(),
            watchdog_hits: self.watchdog.hits(),
            soft_reinits: self.watchdog.soft_reinits(),
            history: self.tracker.history().ring().oldest_first().collect(),
            uptime_ms: self.monotonic.now_ms(),
        }
    }

    pub fn set_geo(&mut self, geo: GeoConfig) {
        self.clock.set_geo(geo);
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.tracker.stop_flag().clone()
    }

    pub fn tracker(&self) -> &Tracker<S, A, P> {
        &self.tracker
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn clock(&self) -> &Clock<T, E> {
        &self.clock
    }
}
