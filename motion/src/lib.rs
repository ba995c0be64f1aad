mod calibration;
mod config;
mod control;
mod history;
pub mod motion;
mod orientation;
mod states;
mod stop;
mod sun;
mod watchdog;

pub use calibration::{run_sweep, sweep_grid, CalibrationResult};
pub use config::{ConfigError, TrackerConfig};
pub use control::{ControlLoop, LoopAction, TrackerStatus};
pub use history::{
    HistoryRecorder, HistoryRing, HistoryRow, SunSample, Timestamp, CSV_HEADER, HISTORY_CAPACITY,
};
pub use motion::Tracker;
pub use orientation::{Actuators, Orientation, Servo, ServoPair};
pub use states::{TrackerState, TransitionCounters};
pub use stop::{StopFlag, StopFlagError};
pub use sun::SunTarget;
pub use watchdog::{Watchdog, WatchdogAction};

use std::time::Instant;

/// Durable storage behind the tracker: calibration pose and the history log.
pub trait Persistence {
    /// False when there is no backing store at all; durable writes are then
    /// skipped without logging.
    fn is_available(&self) -> bool {
        true
    }

    fn load_calibration(&mut self) -> anyhow::Result<Option<Orientation>>;

    fn save_calibration(&mut self, orientation: Orientation) -> anyhow::Result<()>;

    fn append_history_row(&mut self, row: &HistoryRow) -> anyhow::Result<()>;
}

/// No backing store. Calibration falls back to the defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct Volatile;

impl Persistence for Volatile {
    fn is_available(&self) -> bool {
        false
    }

    fn load_calibration(&mut self) -> anyhow::Result<Option<Orientation>> {
        Ok(None)
    }

    fn save_calibration(&mut self, _orientation: Orientation) -> anyhow::Result<()> {
        Ok(())
    }

    fn append_history_row(&mut self, _row: &HistoryRow) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Milliseconds since boot.
pub trait Monotonic {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemMonotonic {
    boot: Instant,
}

impl SystemMonotonic {
    pub fn new() -> SystemMonotonic {
        SystemMonotonic {
            boot: Instant::now(),
        }
    }
}

impl Default for SystemMonotonic {
    fn default() -> Self {
        SystemMonotonic::new()
    }
}

impl Monotonic for SystemMonotonic {
    fn now_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }
}
