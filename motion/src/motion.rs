use crate::calibration::{run_sweep, CalibrationResult};
use crate::history::{HistoryRecorder, HistoryRow, SunSample, Timestamp};
use crate::{
    Actuators, Monotonic, Orientation, Persistence, StopFlag, SunTarget, TrackerConfig,
    TrackerState, TransitionCounters,
};
use clock::{Clock, Ephemeris, TimeSource};
use embedded_hal::delay::DelayNs;
use sensors::{sample, LightSensor, SensorFrame};

/// The tracking state machine. Owns the hardware seams and everything that
/// survives between ticks; the clock is lent in per call.
pub struct Tracker<S, A, P> {
    config: TrackerConfig,
    sensors: S,
    actuators: A,
    storage: P,

    state: TrackerState,
    orientation: Orientation,
    counters: TransitionCounters,
    history: HistoryRecorder,
    sun: SunTarget,
    stop: StopFlag,
    last_frame: Option<SensorFrame>,

    last_read_ms: Option<u64>,
    last_status_log_ms: Option<u64>,
    // Pose to return to on wake, captured before parking.
    resume: Option<Orientation>,
    calibration: Option<CalibrationResult>,
}

fn step_toward(from: i32, to: i32) -> i32 {
    from + (to - from).signum()
}

fn correction(error: f32, dead_band: f32, dir: i32, step: i32) -> i32 {
    if error.abs() <= dead_band {
        return 0;
    }
    let sign = if error > 0.0 { 1 } else { -1 };
    sign * dir * step
}

impl<S: LightSensor, A: Actuators, P: Persistence> Tracker<S, A, P> {
    pub fn new(config: TrackerConfig, sensors: S, actuators: A, storage: P) -> Tracker<S, A, P> {
        let history = HistoryRecorder::new(config.history_write_min_ms);
        let orientation = config.clamp(config.neutral_orientation);
        Tracker {
            config,
            sensors,
            actuators,
            storage,
            state: TrackerState::Init,
            orientation,
            counters: TransitionCounters::default(),
            history,
            sun: SunTarget::invalid(),
            stop: StopFlag::new(),
            last_frame: None,
            last_read_ms: None,
            last_status_log_ms: None,
            resume: None,
            calibration: None,
        }
    }

    /// Shares an externally owned stop flag instead of the private one.
    pub fn with_stop_flag(mut self, stop: StopFlag) -> Tracker<S, A, P> {
        self.stop = stop;
        self
    }

    /// One pass of the state machine. INIT always runs; TRACKING and SLEEP
    /// only once the read interval has elapsed. Returns the new state when a
    /// transition fired.
    pub fn tick<T: TimeSource, E: Ephemeris>(
        &mut self,
        clock: &Clock<T, E>,
        now_ms: u64,
    ) -> Option<TrackerState> {
        if self.state == TrackerState::Init {
            self.initialize(clock, now_ms);
            return Some(self.state);
        }

        if !self.read_due(now_ms) {
            return None;
        }
        self.last_read_ms = Some(now_ms);
        self.sun = SunTarget::predict(clock, &self.config);

        let frame = match sample(&mut self.sensors) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Light sensor read failed, skipping tick: {:?}", e);
                return None;
            }
        };
        self.last_frame = Some(frame);

        match self.state {
            TrackerState::Tracking => self.track(clock, frame, now_ms),
            TrackerState::Sleep => self.sleep(clock, frame, now_ms),
            TrackerState::Init => None,
        }
    }

    fn read_due(&self, now_ms: u64) -> bool {
        match self.last_read_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.config.read_interval_ms,
        }
    }

    fn unfavorable(&self, frame: &SensorFrame) -> bool {
        frame.is_dark(self.config.night_threshold)
            || frame.is_cloudy(self.config.cloud_threshold)
            || self.stop.is_set()
    }

    fn initialize<T: TimeSource, E: Ephemeris>(&mut self, clock: &Clock<T, E>, now_ms: u64) {
        log::info!("State INIT: loading calibration and locating the sun");

        let fallback = self.config.neutral_orientation;
        let calibrated = if self.storage.is_available() {
            match self.storage.load_calibration() {
                Ok(Some(o)) => {
                    log::info!("Calibration loaded: yaw={} tilt={}", o.yaw, o.tilt);
                    o
                }
                Ok(None) => {
                    log::info!("No stored calibration, starting at center");
                    fallback
                }
                Err(e) => {
                    log::warn!("Failed to load calibration: {:#}", e);
                    fallback
                }
            }
        } else {
            fallback
        };

        self.sun = SunTarget::predict(clock, &self.config);
        let start = if self.sun.pulls() {
            log::info!(
                "Sun at azimuth {:.1} altitude {:.1}, starting at yaw={} tilt={}",
                self.sun.azimuth_deg,
                self.sun.altitude_deg,
                self.sun.target_yaw,
                self.sun.target_tilt
            );
            self.sun.orientation()
        } else {
            if !self.sun.valid {
                log::warn!("No time fix, tracking on light sensors only");
            }
            calibrated
        };

        // The servos are still moving; the first frame is read one read
        // interval later, in TRACKING.
        self.force(start);
        self.last_frame = None;

        self.record(clock, now_ms, false);
        self.counters.reset();
        self.last_read_ms = Some(now_ms);
        self.state = TrackerState::Tracking;
        log::info!("State INIT -> TRACKING");
    }

    fn track<T: TimeSource, E: Ephemeris>(
        &mut self,
        clock: &Clock<T, E>,
        frame: SensorFrame,
        now_ms: u64,
    ) -> Option<TrackerState> {
        if self.unfavorable(&frame) {
            self.counters.dark_count = self.counters.dark_count.saturating_add(1);
            self.counters.light_count = 0;
            log::debug!(
                "Unfavorable light (mean {}, stop {}), dark count {}/{}",
                frame.mean(),
                self.stop.is_set(),
                self.counters.dark_count,
                self.config.state_change_threshold
            );
            if self.counters.dark_count >= self.config.state_change_threshold {
                self.enter_sleep(clock, now_ms);
                return Some(TrackerState::Sleep);
            }
            return None;
        }
        self.counters.dark_count = 0;

        let prev = self.orientation;
        let mut next = prev;
        let balance = frame.balance();

        if balance.total < self.config.min_light_sum {
            // Differential is noise at this level.
            if self.sun.pulls() {
                next = self.sun.orientation();
            }
        } else {
            if self.sun.pulls() {
                next.yaw = step_toward(next.yaw, self.sun.target_yaw);
                next.tilt = step_toward(next.tilt, self.sun.target_tilt);
            }
            next.yaw += correction(
                balance.error_yaw,
                self.config.dead_band_yaw,
                self.config.yaw_dir,
                self.config.step_yaw,
            );
            next.tilt += correction(
                balance.error_tilt,
                self.config.dead_band_tilt,
                self.config.tilt_dir,
                self.config.step_tilt,
            );
        }

        let next = self.config.clamp(next);
        self.apply(next);
        self.record(clock, now_ms, false);

        log::debug!(
            "yaw={} tilt={} err_yaw={:.3} err_tilt={:.3} sum={}",
            next.yaw,
            next.tilt,
            balance.error_yaw,
            balance.error_tilt,
            balance.total
        );
        self.log_status(now_ms, balance.total);
        None
    }

    fn sleep<T: TimeSource, E: Ephemeris>(
        &mut self,
        clock: &Clock<T, E>,
        frame: SensorFrame,
        now_ms: u64,
    ) -> Option<TrackerState> {
        if self.unfavorable(&frame) {
            self.counters.light_count = 0;
            return None;
        }

        self.counters.light_count = self.counters.light_count.saturating_add(1);
        self.counters.dark_count = 0;
        log::debug!(
            "Favorable light (mean {}), light count {}/{}",
            frame.mean(),
            self.counters.light_count,
            self.config.state_change_threshold
        );
        if self.counters.light_count >= self.config.state_change_threshold {
            self.wake(clock, now_ms);
            return Some(TrackerState::Tracking);
        }
        None
    }

    fn enter_sleep<T: TimeSource, E: Ephemeris>(&mut self, clock: &Clock<T, E>, now_ms: u64) {
        self.resume = self.history.latest();
        self.force(self.config.sleep_orientation);
        self.record(clock, now_ms, true);
        self.counters.reset();
        self.state = TrackerState::Sleep;
        log::info!(
            "State TRACKING -> SLEEP, parked at yaw={} tilt={}",
            self.orientation.yaw,
            self.orientation.tilt
        );
    }

    fn wake<T: TimeSource, E: Ephemeris>(&mut self, clock: &Clock<T, E>, now_ms: u64) {
        let restore = self
            .resume
            .take()
            .or_else(|| self.history.latest())
            .unwrap_or(self.orientation);
        self.force(restore);
        self.record(clock, now_ms, true);
        self.counters.reset();
        self.state = TrackerState::Tracking;
        log::info!(
            "State SLEEP -> TRACKING, restored yaw={} tilt={}",
            self.orientation.yaw,
            self.orientation.tilt
        );
    }

    /// Parks at the neutral pose and restarts from INIT. Used by the watchdog.
    pub fn soft_reinit(&mut self, now_ms: u64) {
        self.force(self.config.neutral_orientation);
        self.state = TrackerState::Init;
        self.counters.reset();
        self.resume = None;
        self.last_read_ms = Some(now_ms);
        log::warn!("Tracker re-initialised at neutral pose");
    }

    /// Runs the calibration sweep, persists the winner and moves there.
    /// `service` is called after every grid point.
    pub fn calibrate<T, E, D, M>(
        &mut self,
        clock: &Clock<T, E>,
        delay: &mut D,
        monotonic: &M,
        service: &mut dyn FnMut(),
    ) -> CalibrationResult
    where
        T: TimeSource,
        E: Ephemeris,
        D: DelayNs,
        M: Monotonic,
    {
        let result = run_sweep(
            &mut self.sensors,
            &mut self.actuators,
            delay,
            &self.config,
            service,
        );
        let best = self.config.clamp(result.orientation());

        if self.storage.is_available() {
            if let Err(e) = self.storage.save_calibration(best) {
                log::warn!("Failed to save calibration: {:#}", e);
            }
        }

        self.force(best);
        self.record(clock, monotonic.now_ms(), true);
        self.calibration = Some(result);
        result
    }

    /// Commands only the axes that changed.
    fn apply(&mut self, next: Orientation) {
        let prev = self.orientation;
        if next.yaw != prev.yaw {
            self.actuators.set_yaw(next.yaw);
        }
        if next.tilt != prev.tilt {
            self.actuators.set_tilt(next.tilt);
        }
        self.orientation = next;
    }

    /// Commands both axes unconditionally.
    fn force(&mut self, target: Orientation) {
        let target = self.config.clamp(target);
        self.actuators.set_yaw(target.yaw);
        self.actuators.set_tilt(target.tilt);
        self.orientation = target;
    }

    fn record<T: TimeSource, E: Ephemeris>(
        &mut self,
        clock: &Clock<T, E>,
        now_ms: u64,
        force: bool,
    ) {
        let timestamp = match clock.local_time() {
            Some(local) => Timestamp::Wall(local.naive_local()),
            None => Timestamp::Uptime(now_ms),
        };
        let sun = self.sun.valid.then_some(SunSample {
            azimuth_deg: self.sun.azimuth_deg,
            altitude_deg: self.sun.altitude_deg,
        });
        let row = HistoryRow {
            timestamp,
            orientation: self.orientation,
            sun,
        };
        self.history.record(&mut self.storage, row, now_ms, force);
    }

    fn log_status(&mut self, now_ms: u64, light_sum: u32) {
        let due = match self.last_status_log_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.config.status_log_interval_ms,
        };
        if !due {
            return;
        }
        self.last_status_log_ms = Some(now_ms);

        if self.sun.valid {
            log::info!(
                "TRACKING yaw={} tilt={} target yaw={} tilt={} (alt {:.1}) light={}",
                self.orientation.yaw,
                self.orientation.tilt,
                self.sun.target_yaw,
                self.sun.target_tilt,
                self.sun.altitude_deg,
                light_sum
            );
        } else {
            log::info!(
                "TRACKING yaw={} tilt={} (no sun fix) light={}",
                self.orientation.yaw,
                self.orientation.tilt,
                light_sum
            );
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn sun_target(&self) -> SunTarget {
        self.sun
    }

    pub fn counters(&self) -> TransitionCounters {
        self.counters
    }

    pub fn history(&self) -> &HistoryRecorder {
        &self.history
    }

    pub fn last_frame(&self) -> Option<SensorFrame> {
        self.last_frame
    }

    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    pub fn last_calibration(&self) -> Option<CalibrationResult> {
        self.calibration
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}
