use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StopFlagError {
    #[error("missing stop payload")]
    Missing,
    #[error("stop payload must be 0 or 1, got {0:?}")]
    Invalid(String),
}

/// Remote "rain / stop" switch. Clones share the same flag; the control loop
/// only ever reads it.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> StopFlag {
        StopFlag::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, stop: bool) {
        let was = self.0.swap(stop, Ordering::SeqCst);
        if was != stop {
            log::info!("External stop flag {}", if stop { "raised" } else { "cleared" });
        }
    }

    /// Validates a raw payload at the boundary; only "1" and "0" are accepted.
    pub fn parse_payload(raw: Option<&str>) -> Result<bool, StopFlagError> {
        match raw.map(str::trim) {
            None | Some("") => Err(StopFlagError::Missing),
            Some("1") => Ok(true),
            Some("0") => Ok(false),
            Some(other) => Err(StopFlagError::Invalid(other.to_string())),
        }
    }

    pub fn apply_payload(&self, raw: Option<&str>) -> Result<bool, StopFlagError> {
        let stop = StopFlag::parse_payload(raw)?;
        self.set(stop);
        Ok(stop)
    }
}
