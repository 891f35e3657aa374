//! MS-DOS date/time packing used by local file headers and central
//! directory entries.
//!
//! Two 16-bit fields, local time, 2-second resolution:
//!
//! ```text
//! time = (hour << 11) | (minute << 5) | (second >> 1)
//! date = ((year - 1980) << 9) | (month << 5) | day
//! ```
//!
//! Round-tripping through [`pack_dos_datetime`] and [`unpack_dos_datetime`]
//! is lossy within a 2-second window by design; callers comparing
//! timestamps should tolerate +/-2s.

use chrono::{Datelike, Local, NaiveDate, TimeZone, Timelike};

const MIN_DOS_YEAR: i32 = 1980;
const MAX_DOS_YEAR: i32 = 2107;

/// Packs a millisecond epoch timestamp into (time, date) MS-DOS fields,
/// interpreting the instant in the local timezone.
pub fn pack_dos_datetime(epoch_millis: i64) -> (u16, u16) {
    let local = match Local.timestamp_millis_opt(epoch_millis) {
        chrono::LocalResult::Single(dt) => dt,
        chrono::LocalResult::Ambiguous(dt, _) => dt,
        chrono::LocalResult::None => Local.timestamp_millis_opt(0).unwrap(),
    };

    let year = local.year().clamp(MIN_DOS_YEAR, MAX_DOS_YEAR);
    let time = ((local.hour() as u16) << 11)
        | ((local.minute() as u16) << 5)
        | ((local.second() as u16) >> 1);
    let date = (((year - MIN_DOS_YEAR) as u16) << 9)
        | ((local.month() as u16) << 5)
        | (local.day() as u16);

    (time, date)
}

/// Unpacks MS-DOS (time, date) fields back into a millisecond epoch
/// timestamp, interpreting the fields as local time.
pub fn unpack_dos_datetime(time: u16, date: u16) -> i64 {
    let seconds = ((time & 0x1F) as u32) * 2;
    let minutes = ((time >> 5) & 0x3F) as u32;
    let hours = ((time >> 11) & 0x1F) as u32;

    let day = (date & 0x1F) as u32;
    let month = ((date >> 5) & 0x0F) as u32;
    let year = ((date >> 9) & 0x7F) as i32 + MIN_DOS_YEAR;

    let naive_date = NaiveDate::from_ymd_opt(year, month.max(1), day.max(1))
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(MIN_DOS_YEAR, 1, 1).unwrap());
    let naive = naive_date
        .and_hms_opt(hours.min(23), minutes.min(59), seconds.min(59))
        .unwrap_or_else(|| naive_date.and_hms_opt(0, 0, 0).unwrap());

    match Local.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt.timestamp_millis(),
        chrono::LocalResult::Ambiguous(dt, _) => dt.timestamp_millis(),
        chrono::LocalResult::None => naive.and_utc().timestamp_millis(),
    }
}
