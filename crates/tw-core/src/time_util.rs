//! Wall-clock time helpers.
//!
//! Every screen derives its scroll position from wall-clock milliseconds, so
//! all clocks in the cluster are expected to be NTP-synchronized.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as **milliseconds** since Unix epoch.
#[inline]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

const MS_PER_DAY: i64 = 86_400_000;

/// `YYYY-MM-DD` (UTC) of `ms`, stepped back to Friday when it falls on a
/// weekend. Used as the window for intraday aggregate requests.
pub fn trading_day(ms: i64) -> String {
    let mut days = ms.div_euclid(MS_PER_DAY);
    // 1970-01-01 was a Thursday; 0 = Sunday.
    match (days + 4).rem_euclid(7) {
        0 => days -= 2,
        6 => days -= 1,
        _ => {}
    }
    let (y, m, d) = civil_from_days(days);
    format!("{y:04}-{m:02}-{d:02}")
}

/// Proleptic Gregorian date for a day count since the Unix epoch.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}
