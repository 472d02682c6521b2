//! Entry modification timestamps in DOS date/time format.
//!
//! ZIP entry records store modification times as two 16-bit fields with
//! 2-second resolution and a 1980 epoch. [`Timestamp`] keeps the stored
//! fields verbatim (so round-trips are byte-exact) and converts to and from
//! Unix seconds for callers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds between 1970-01-01 and 1980-01-01 (the DOS epoch).
const DOS_EPOCH_UNIX: i64 = 315_532_800;

/// A DOS date/time pair as stored in entry records.
///
/// Values outside the representable range (1980..=2107, 2-second
/// resolution) are clamped on conversion, never rejected; a timestamp is
/// metadata, not an integrity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    /// DOS date field: bits 15-9 year since 1980, 8-5 month, 4-0 day.
    pub dos_date: u16,
    /// DOS time field: bits 15-11 hour, 10-5 minute, 4-0 second / 2.
    pub dos_time: u16,
}

impl Timestamp {
    /// Creates a timestamp from raw stored fields.
    pub fn from_dos(dos_date: u16, dos_time: u16) -> Self {
        Self { dos_date, dos_time }
    }

    /// Creates a timestamp for the current system time.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(DOS_EPOCH_UNIX);
        Self::from_unix(secs)
    }

    /// Converts Unix seconds to a DOS timestamp, clamping out-of-range input.
    pub fn from_unix(unix_secs: i64) -> Self {
        let secs = unix_secs.max(DOS_EPOCH_UNIX);
        let days = (secs - DOS_EPOCH_UNIX).div_euclid(86_400);
        let tod = (secs - DOS_EPOCH_UNIX).rem_euclid(86_400);

        let (year, month, day) = civil_from_days(days + days_from_civil(1980, 1, 1));
        let year = year.min(2107);

        let hour = tod / 3600;
        let minute = (tod % 3600) / 60;
        let second = tod % 60;

        Self {
            dos_date: (((year - 1980) as u16) << 9) | ((month as u16) << 5) | day as u16,
            dos_time: ((hour as u16) << 11) | ((minute as u16) << 5) | ((second / 2) as u16),
        }
    }

    /// Converts this timestamp back to Unix seconds.
    pub fn to_unix(self) -> i64 {
        let year = 1980 + ((self.dos_date >> 9) & 0x7F) as i64;
        let month = ((self.dos_date >> 5) & 0x0F).clamp(1, 12) as i64;
        let day = (self.dos_date & 0x1F).max(1) as i64;

        let hour = ((self.dos_time >> 11) & 0x1F) as i64;
        let minute = ((self.dos_time >> 5) & 0x3F) as i64;
        let second = ((self.dos_time & 0x1F) * 2) as i64;

        days_from_civil(year, month, day) * 86_400 + hour * 3600 + minute * 60 + second
    }
}

/// Days from the Unix epoch to the given civil date (proleptic Gregorian).
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Civil date (year, month, day) for a day count from the Unix epoch.
fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    (if month <= 2 { y + 1 } else { y }, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dos_epoch() {
        let ts = Timestamp::from_unix(DOS_EPOCH_UNIX);
        // 1980-01-01 00:00:00
        assert_eq!(ts.dos_date, (0 << 9) | (1 << 5) | 1);
        assert_eq!(ts.dos_time, 0);
        assert_eq!(ts.to_unix(), DOS_EPOCH_UNIX);
    }

    #[test]
    fn test_known_date() {
        // 2001-09-09 01:46:40 UTC == unix 1_000_000_000
        let ts = Timestamp::from_unix(1_000_000_000);
        assert_eq!(ts.dos_date >> 9, 2001 - 1980);
        assert_eq!((ts.dos_date >> 5) & 0x0F, 9);
        assert_eq!(ts.dos_date & 0x1F, 9);
        assert_eq!(ts.dos_time >> 11, 1);
        assert_eq!((ts.dos_time >> 5) & 0x3F, 46);
        assert_eq!(ts.dos_time & 0x1F, 20); // 40 seconds / 2
        assert_eq!(ts.to_unix(), 1_000_000_000);
    }

    #[test]
    fn test_two_second_resolution() {
        let ts = Timestamp::from_unix(1_000_000_001);
        // Odd second is truncated to the even boundary
        assert_eq!(ts.to_unix(), 1_000_000_000);
    }

    #[test]
    fn test_pre_epoch_clamps() {
        let ts = Timestamp::from_unix(0);
        assert_eq!(ts.to_unix(), DOS_EPOCH_UNIX);
    }

    #[test]
    fn test_roundtrip_sample_dates() {
        for &unix in &[
            DOS_EPOCH_UNIX,
            631_152_000,   // 1990-01-01
            951_827_696,   // 2000-02-29 (leap day)
            1_700_000_000, // 2023-11-14
            2_000_000_000, // 2033-05-18
        ] {
            let even = unix - unix.rem_euclid(2);
            assert_eq!(Timestamp::from_unix(unix).to_unix(), even, "unix={unix}");
        }
    }

    #[test]
    fn test_raw_fields_roundtrip() {
        let ts = Timestamp::from_dos(0x5A8B, 0x7C21);
        assert_eq!(ts.dos_date, 0x5A8B);
        assert_eq!(ts.dos_time, 0x7C21);
    }
}
