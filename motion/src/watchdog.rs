use crate::TrackerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    None,
    /// Park at neutral and restart from INIT.
    SoftReinit,
    /// Repeated starvation inside one window; reboot the device.
    HardRestart,
}

/// Software watchdog on loop liveness.
///
/// Only timing is observed: the loop marks itself alive at the top of every
/// iteration and after each blocking step. A gap longer than the timeout
/// counts as a hit; hits accumulate only within the reset window.
#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout_ms: u64,
    reset_window_ms: u64,
    max_hits: u8,
    last_alive_ms: u64,
    hits: u8,
    window_start_ms: u64,
    soft_reinits: u32,
}

impl Watchdog {
    pub fn new(timeout_ms: u64, reset_window_ms: u64, max_hits: u8, now_ms: u64) -> Watchdog {
        Watchdog {
            timeout_ms,
            reset_window_ms,
            max_hits,
            last_alive_ms: now_ms,
            hits: 0,
            window_start_ms: now_ms,
            soft_reinits: 0,
        }
    }

    pub fn from_config(cfg: &TrackerConfig, now_ms: u64) -> Watchdog {
        Watchdog::new(
            cfg.watchdog_timeout_ms,
            cfg.watchdog_reset_window_ms,
            cfg.watchdog_max_hits,
            now_ms,
        )
    }

    pub fn feed(&mut self, now_ms: u64) {
        self.last_alive_ms = now_ms;
    }

    pub fn check(&mut self, now_ms: u64) -> WatchdogAction {
        let gap = now_ms.saturating_sub(self.last_alive_ms);
        if gap <= self.timeout_ms {
            return WatchdogAction::None;
        }

        if now_ms.saturating_sub(self.window_start_ms) > self.reset_window_ms {
            self.hits = 0;
            self.window_start_ms = now_ms;
        }
        self.hits = self.hits.saturating_add(1);
        self.last_alive_ms = now_ms;

        if self.hits >= self.max_hits {
            log::error!(
                "Watchdog: loop stalled {} ms, hit {}/{} -> restart",
                gap,
                self.hits,
                self.max_hits
            );
            return WatchdogAction::HardRestart;
        }

        self.soft_reinits += 1;
        log::warn!(
            "Watchdog: loop stalled {} ms, hit {}/{} -> neutral pose and re-init",
            gap,
            self.hits,
            self.max_hits
        );
        WatchdogAction::SoftReinit
    }

    pub fn hits(&self) -> u8 {
        self.hits
    }

    pub fn soft_reinits(&self) -> u32 {
        self.soft_reinits
    }
}
