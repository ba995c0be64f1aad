use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

const CET_SECS: i32 = 3600;
const CEST_SECS: i32 = 7200;

/// How wall-clock time is derived from UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TimezonePolicy {
    /// Central European time with EU daylight saving rules.
    AutoEu,
    /// A fixed offset east of UTC.
    Fixed { offset_secs: i32 },
}

impl Default for TimezonePolicy {
    fn default() -> Self {
        TimezonePolicy::AutoEu
    }
}

fn last_sunday(year: i32, month: u32) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = first_of_next.pred_opt()?;
    let back = last.weekday().num_days_from_sunday() as i64;
    Some(last - Duration::days(back))
}

/// EU summer time runs from 01:00 UTC on the last Sunday of March to
/// 01:00 UTC on the last Sunday of October.
pub fn is_eu_summer_time(at: DateTime<Utc>) -> bool {
    let year = at.year();
    let bounds = last_sunday(year, 3)
        .zip(last_sunday(year, 10))
        .and_then(|(start, end)| Some((start.and_hms_opt(1, 0, 0)?, end.and_hms_opt(1, 0, 0)?)));

    match bounds {
        Some((start, end)) => {
            let naive = at.naive_utc();
            naive >= start && naive < end
        }
        None => false,
    }
}

impl TimezonePolicy {
    pub fn offset_secs(&self, at: DateTime<Utc>) -> i32 {
        match self {
            TimezonePolicy::AutoEu if is_eu_summer_time(at) => CEST_SECS,
            TimezonePolicy::AutoEu => CET_SECS,
            TimezonePolicy::Fixed { offset_secs } => *offset_secs,
        }
    }

    pub fn offset(&self, at: DateTime<Utc>) -> FixedOffset {
        FixedOffset::east_opt(self.offset_secs(at)).unwrap_or_else(|| Utc.fix())
    }

    pub fn to_local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset(at))
    }
}
