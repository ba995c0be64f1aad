use crate::{Orientation, Persistence};
use chrono::NaiveDateTime;
use heapless::HistoryBuffer;
use std::fmt;

pub const HISTORY_CAPACITY: usize = 10;

pub const CSV_HEADER: &str = "Timestamp,Yaw,Tilt,SunAzimuth,SunAltitude";

/// Last few poses, newest overwrites oldest.
pub struct HistoryRing {
    buf: HistoryBuffer<Orientation, HISTORY_CAPACITY>,
    wrapped: bool,
}

impl fmt::Debug for HistoryRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.oldest_first()).finish()
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        HistoryRing::new()
    }
}

impl HistoryRing {
    pub const fn new() -> HistoryRing {
        HistoryRing {
            buf: HistoryBuffer::new(),
            wrapped: false,
        }
    }

    pub fn push(&mut self, o: Orientation) {
        if self.buf.len() == self.buf.capacity() {
            self.wrapped = true;
        }
        self.buf.write(o);
    }

    /// The most recent write.
    pub fn latest(&self) -> Option<Orientation> {
        self.buf.recent().copied()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() == 0
    }

    /// True once the oldest sample has been overwritten at least once.
    pub fn has_wrapped(&self) -> bool {
        self.wrapped
    }

    pub fn oldest_first(&self) -> impl Iterator<Item = Orientation> + '_ {
        self.buf.oldest_ordered().copied()
    }
}

/// Time base of a history row. The two are rendered differently so a reader
/// of the log can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    /// Local civil time, with a valid time fix.
    Wall(NaiveDateTime),
    /// Milliseconds since boot, without one.
    Uptime(u64),
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Wall(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            Timestamp::Uptime(ms) => write!(f, "uptime:{}", ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunSample {
    pub azimuth_deg: f64,
    pub altitude_deg: f64,
}

/// One durable history record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryRow {
    pub timestamp: Timestamp,
    pub orientation: Orientation,
    pub sun: Option<SunSample>,
}

impl fmt::Display for HistoryRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{}",
            self.timestamp, self.orientation.yaw, self.orientation.tilt
        )?;
        match self.sun {
            Some(sun) => write!(f, ",{:.2},{:.2}", sun.azimuth_deg, sun.altitude_deg),
            None => f.write_str(",,"),
        }
    }
}

/// Ring buffer plus throttled durable log.
#[derive(Debug)]
pub struct HistoryRecorder {
    ring: HistoryRing,
    min_interval_ms: u64,
    last_durable_ms: Option<u64>,
}

impl HistoryRecorder {
    pub fn new(min_interval_ms: u64) -> HistoryRecorder {
        HistoryRecorder {
            ring: HistoryRing::new(),
            min_interval_ms,
            last_durable_ms: None,
        }
    }

    pub fn ring(&self) -> &HistoryRing {
        &self.ring
    }

    pub fn latest(&self) -> Option<Orientation> {
        self.ring.latest()
    }

    fn durable_due(&self, now_ms: u64, force: bool) -> bool {
        force
            || match self.last_durable_ms {
                None => true,
                Some(last) => now_ms.saturating_sub(last) >= self.min_interval_ms,
            }
    }

    /// Pushes to the ring and, unless throttled, appends a row to storage.
    /// Returns whether a durable row was written.
    pub fn record<P: Persistence>(
        &mut self,
        storage: &mut P,
        row: HistoryRow,
        now_ms: u64,
        force: bool,
    ) -> bool {
        self.ring.push(row.orientation);

        if !storage.is_available() || !self.durable_due(now_ms, force) {
            return false;
        }

        match storage.append_history_row(&row) {
            Ok(()) => {
                self.last_durable_ms = Some(now_ms);
                true
            }
            Err(e) => {
                log::warn!("History append failed: {:#}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Volatile;
    use chrono::NaiveDate;

    #[derive(Default)]
    struct Rows(Vec<String>);

    impl Persistence for Rows {
        fn load_calibration(&mut self) -> anyhow::Result<Option<Orientation>> {
            Ok(None)
        }
        fn save_calibration(&mut self, _: Orientation) -> anyhow::Result<()> {
            Ok(())
        }
        fn append_history_row(&mut self, row: &HistoryRow) -> anyhow::Result<()> {
            self.0.push(row.to_string());
            Ok(())
        }
    }

    struct Failing;

    impl Persistence for Failing {
        fn load_calibration(&mut self) -> anyhow::Result<Option<Orientation>> {
            anyhow::bail!("no fs")
        }
        fn save_calibration(&mut self, _: Orientation) -> anyhow::Result<()> {
            anyhow::bail!("no fs")
        }
        fn append_history_row(&mut self, _: &HistoryRow) -> anyhow::Result<()> {
            anyhow::bail!("no fs")
        }
    }

    fn row(yaw: i32, ms: u64) -> HistoryRow {
        HistoryRow {
            timestamp: Timestamp::Uptime(ms),
            orientation: Orientation::new(yaw, 90),
            sun: None,
        }
    }

    #[test]
    fn ring_keeps_the_last_ten_in_fifo_order() {
        let mut ring = HistoryRing::new();
        assert!(ring.is_empty());
        for yaw in 0..13 {
            ring.push(Orientation::new(yaw, 90));
        }
        assert_eq!(ring.len(), HISTORY_CAPACITY);
        assert!(ring.has_wrapped());
        assert_eq!(ring.latest(), Some(Orientation::new(12, 90)));
        let yaws: Vec<i32> = ring.oldest_first().map(|o| o.yaw).collect();
        assert_eq!(yaws, (3..13).collect::<Vec<_>>());
    }

    #[test]
    fn full_ring_has_not_wrapped_yet() {
        let mut ring = HistoryRing::new();
        for yaw in 0..HISTORY_CAPACITY as i32 {
            ring.push(Orientation::new(yaw, 90));
        }
        assert_eq!(ring.len(), HISTORY_CAPACITY);
        assert!(!ring.has_wrapped());
        assert_eq!(ring.oldest_first().next(), Some(Orientation::new(0, 90)));

        ring.push(Orientation::new(10, 90));
        assert!(ring.has_wrapped());
        assert_eq!(ring.oldest_first().next(), Some(Orientation::new(1, 90)));
    }

    #[test]
    fn ring_before_wrapping() {
        let mut ring = HistoryRing::new();
        ring.push(Orientation::new(10, 20));
        ring.push(Orientation::new(11, 21));
        assert!(!ring.has_wrapped());
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.latest(), Some(Orientation::new(11, 21)));
    }

    #[test]
    fn unforced_rows_are_throttled() {
        let mut rec = HistoryRecorder::new(10_000);
        let mut rows = Rows::default();

        assert!(rec.record(&mut rows, row(1, 0), 0, false));
        assert!(!rec.record(&mut rows, row(2, 9_999), 9_999, false));
        assert!(rec.record(&mut rows, row(3, 10_000), 10_000, false));
        assert_eq!(rows.0.len(), 2);
        // The ring still saw every sample.
        assert_eq!(rec.latest(), Some(Orientation::new(3, 90)));
        assert_eq!(rec.ring().len(), 3);
    }

    #[test]
    fn forced_rows_always_land() {
        let mut rec = HistoryRecorder::new(10_000);
        let mut rows = Rows::default();
        assert!(rec.record(&mut rows, row(1, 100), 100, true));
        assert!(rec.record(&mut rows, row(2, 101), 101, true));
        assert!(!rec.record(&mut rows, row(3, 102), 102, false));
        assert_eq!(rows.0.len(), 2);
    }

    #[test]
    fn unavailable_or_failing_storage_keeps_the_ring() {
        let mut rec = HistoryRecorder::new(0);
        assert!(!rec.record(&mut Volatile, row(7, 0), 0, true));
        assert!(!rec.record(&mut Failing, row(8, 1), 1, true));
        assert_eq!(rec.latest(), Some(Orientation::new(8, 90)));
    }

    #[test]
    fn csv_rows_tell_wall_time_from_uptime() {
        let wall = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 30, 5)
            .unwrap();
        let with_sun = HistoryRow {
            timestamp: Timestamp::Wall(wall),
            orientation: Orientation::new(100, 60),
            sun: Some(SunSample {
                azimuth_deg: 201.456,
                altitude_deg: 40.0,
            }),
        };
        assert_eq!(with_sun.to_string(), "2025-06-01 12:30:05,100,60,201.46,40.00");
        assert_eq!(row(42, 1234).to_string(), "uptime:1234,42,90,,");
    }
}
