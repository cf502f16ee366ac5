use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// A parsed timestamp. Stamps without an offset are taken as UTC.
pub type Timestamp = DateTime<FixedOffset>;

/// Layouts carrying a year and an offset
const OFFSET_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y/%m/%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
    "%d %b %Y %H:%M:%S%.f %z",
    "%d/%b/%Y:%H:%M:%S%.f %z",
];

/// Layouts carrying a year but no offset
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d·%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y.%m.%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d %b %Y %H:%M:%S%.f",
    "%b %d %Y %H:%M:%S%.f",
];

/// Layouts without a year; the current year is prepended before parsing
const YEARLESS_OFFSET_LAYOUTS: &[&str] = &["%Y %b-%d %H:%M%z", "%Y %b-%d %H:%M:%S%.f%z"];

const YEARLESS_NAIVE_LAYOUTS: &[&str] = &[
    "%Y %b-%d %H:%M",
    "%Y %b-%d %H:%M:%S%.f",
    "%Y %b %d %H:%M:%S%.f",
    "%Y %m%d %H:%M:%S%.f",
];

/// Time-only layouts, completed with today's date
const TIME_LAYOUTS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// Parse a timestamp substring by trying the known layouts in order.
///
/// Returns `None` when nothing fits; an unparsable stamp is not an error.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts);
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(s) {
        return Some(ts);
    }

    // %z does not accept a bare "Z", so spell UTC out
    let zoned = match s.strip_suffix('Z') {
        Some(rest) => format!("{rest}+0000"),
        None => s.to_string(),
    };

    for layout in OFFSET_LAYOUTS {
        if let Ok(ts) = DateTime::parse_from_str(&zoned, layout) {
            return Some(ts);
        }
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(as_utc(naive));
        }
    }

    let year = Utc::now().year();
    let with_year = format!("{year} {zoned}");
    for layout in YEARLESS_OFFSET_LAYOUTS {
        if let Ok(ts) = DateTime::parse_from_str(&with_year, layout) {
            return Some(ts);
        }
    }
    let with_year = format!("{year} {s}");
    for layout in YEARLESS_NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&with_year, layout) {
            return Some(as_utc(naive));
        }
    }

    let today: NaiveDate = Utc::now().date_naive();
    for layout in TIME_LAYOUTS {
        if let Ok(time) = NaiveTime::parse_from_str(s, layout) {
            return Some(as_utc(today.and_time(time)));
        }
    }

    None
}

/// Interpret a Unix epoch number, in seconds or milliseconds
pub fn from_epoch(value: f64) -> Option<Timestamp> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let millis = if value > 1e11 { value } else { value * 1000.0 };
    DateTime::<Utc>::from_timestamp_millis(millis as i64).map(|ts| ts.fixed_offset())
}

fn as_utc(naive: NaiveDateTime) -> Timestamp {
    naive.and_utc().fixed_offset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap().fixed_offset()
    }

    #[test]
    fn test_rfc3339() {
        let ts = parse_timestamp("2021-06-05T23:50:00Z").unwrap();
        assert_eq!(ts, utc(2021, 6, 5, 23, 50, 0));

        let ts = parse_timestamp("2021-01-31T19:04:01+01:00").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 3600);
        assert_eq!(ts, utc(2021, 1, 31, 18, 4, 1));
    }

    #[test]
    fn test_space_separated_fraction() {
        let ts = parse_timestamp("2021-01-31 17:33:54.3326").unwrap();
        assert_eq!(ts.with_nanosecond(0).unwrap(), utc(2021, 1, 31, 17, 33, 54));
        assert_eq!(ts.nanosecond(), 332_600_000);
    }

    #[test]
    fn test_space_separated_zulu() {
        let ts = parse_timestamp("2021-01-31 17:33:54Z").unwrap();
        assert_eq!(ts, utc(2021, 1, 31, 17, 33, 54));
    }

    #[test]
    fn test_yearless_textual_month() {
        let ts = parse_timestamp("Jun-18 14:50+0200").unwrap();
        assert_eq!(ts.year(), Utc::now().year());
        assert_eq!(ts.month(), 6);
        assert_eq!(ts.day(), 18);
        assert_eq!(ts.hour(), 14);
        assert_eq!(ts.offset().local_minus_utc(), 2 * 3600);
    }

    #[test]
    fn test_syslog_style() {
        let ts = parse_timestamp("Feb 4 09:00:44").unwrap();
        assert_eq!(ts.year(), Utc::now().year());
        assert_eq!((ts.month(), ts.day()), (2, 4));
    }

    #[test]
    fn test_time_only() {
        let ts = parse_timestamp("09:00:44.5").unwrap();
        assert_eq!(ts.date_naive(), Utc::now().date_naive());
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (9, 0, 44));
    }

    #[test]
    fn test_unparsable() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday-ish").is_none());
        assert!(parse_timestamp("2021-13-45 99:99").is_none());
    }

    #[test]
    fn test_epoch() {
        assert_eq!(from_epoch(1_622_937_000.0), Some(utc(2021, 6, 5, 23, 50, 0)));
        assert_eq!(from_epoch(1_622_937_000_000.0), Some(utc(2021, 6, 5, 23, 50, 0)));
        assert!(from_epoch(-1.0).is_none());
    }
}
