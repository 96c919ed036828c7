//! Lightweight UTC timestamps (no chrono dependency).
//!
//! Uses Howard Hinnant's civil calendar algorithms for date ↔ day-count
//! conversion. Timestamps without a zone designator are taken as UTC.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Four-digit years only.
const MAX_YEAR: i64 = 9999;

/// Milliseconds since the Unix epoch, UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn from_unix_secs(secs: i64) -> Self {
        Self(secs * 1000)
    }

    pub fn unix_millis(self) -> i64 {
        self.0
    }

    /// Parse `YYYY-MM-DD[T ]HH:MM[:SS[.fff]][Z|±HH[:MM]]`.
    pub fn parse_iso8601(s: &str) -> Option<Self> {
        let s = s.trim();
        let (date, rest) = s.split_once(['T', 't', ' '])?;

        let mut parts = date.splitn(3, '-');
        let year: i64 = parts.next()?.parse().ok()?;
        let month: u32 = parts.next()?.parse().ok()?;
        let day: u32 = parts.next()?.parse().ok()?;
        if !(0..=MAX_YEAR).contains(&year)
            || !(1..=12).contains(&month)
            || !(1..=31).contains(&day)
        {
            return None;
        }

        let (clock, offset_secs) = split_zone(rest)?;
        let (hms, frac) = match clock.split_once('.') {
            Some((hms, frac)) => (hms, Some(frac)),
            None => (clock, None),
        };

        let mut t = hms.splitn(3, ':');
        let hours: i64 = t.next()?.parse().ok()?;
        let minutes: i64 = t.next()?.parse().ok()?;
        let seconds: i64 = match t.next() {
            Some(sec) => sec.parse().ok()?,
            None => 0,
        };
        if hours > 23 || minutes > 59 || seconds > 60 || hours < 0 || minutes < 0 || seconds < 0 {
            return None;
        }

        let millis = match frac {
            Some(f) if !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()) => {
                let digits: String = f.chars().chain("000".chars()).take(3).collect();
                digits.parse::<i64>().ok()?
            }
            Some(_) => return None,
            None => 0,
        };

        let days = days_from_civil(year, month, day);
        let secs = days
            .checked_mul(86400)?
            .checked_add(hours * 3600 + minutes * 60 + seconds)?
            .checked_sub(offset_secs)?;
        Some(Self(secs.checked_mul(1000)?.checked_add(millis)?))
    }

    /// ISO-8601 UTC string with seconds precision.
    pub fn to_iso8601(self) -> String {
        let secs = self.0.div_euclid(1000);
        let days = secs.div_euclid(86400);
        let time_of_day = secs.rem_euclid(86400);
        let hours = time_of_day / 3600;
        let minutes = (time_of_day % 3600) / 60;
        let seconds = time_of_day % 60;

        let (y, m, d) = civil_from_days(days);
        format!("{y:04}-{m:02}-{d:02}T{hours:02}:{minutes:02}:{seconds:02}Z")
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// Strip a trailing zone designator, returning the clock part and the
/// offset east of UTC in seconds.
fn split_zone(rest: &str) -> Option<(&str, i64)> {
    if let Some(clock) = rest.strip_suffix(['Z', 'z']) {
        return Some((clock, 0));
    }
    let Some(idx) = rest.rfind(['+', '-']) else {
        return Some((rest, 0));
    };
    let (clock, zone) = rest.split_at(idx);
    let sign = if zone.starts_with('-') { -1 } else { 1 };
    let zone = &zone[1..];
    let (zh, zm) = match zone.split_once(':') {
        Some(pair) => pair,
        None if zone.len() == 4 => zone.split_at(2),
        None => (zone, "0"),
    };
    let zh: i64 = zh.parse().ok()?;
    let zm: i64 = zm.parse().ok()?;
    if zh > 23 || zm > 59 {
        return None;
    }
    Some((clock, sign * (zh * 3600 + zm * 60)))
}

/// Howard Hinnant's days_from_civil: (year, month, day) → Unix epoch days.
fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u64;
    let mp = (m as u64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d as u64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe as i64 - 719468
}

/// Howard Hinnant's civil_from_days: Unix epoch days → (year, month, day).
fn civil_from_days(days: i64) -> (i64, u64, u64) {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}
