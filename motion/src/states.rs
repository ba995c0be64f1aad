// This module contains the tracker's top-level states.
// To add or modify states, edit this file only.

use serde::Serialize;
use std::fmt;

/// - Init: load calibration, pick a starting pose, then hand over to Tracking
/// - Tracking: follow the sun with ephemeris chase plus LDR correction
/// - Sleep: parked at the safe pose until light returns
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrackerState {
    Init,
    Tracking,
    Sleep,
}

impl TrackerState {
    /// Check if the tracker is moving the panel on its own
    pub fn is_active(&self) -> bool {
        matches!(self, TrackerState::Tracking)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerState::Init => "INIT",
            TrackerState::Tracking => "TRACKING",
            TrackerState::Sleep => "SLEEP",
        }
    }
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consecutive-tick counters behind the day/night hysteresis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionCounters {
    pub dark_count: u8,
    pub light_count: u8,
}

impl TransitionCounters {
    pub fn reset(&mut self) {
        *self = TransitionCounters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_status_names() {
        assert_eq!(TrackerState::Init.to_string(), "INIT");
        assert_eq!(TrackerState::Sleep.as_str(), "SLEEP");
        assert!(TrackerState::Tracking.is_active());
        assert!(!TrackerState::Sleep.is_active());
    }
}
