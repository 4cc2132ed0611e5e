use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

/// File-stamp layout used for segment names, e.g. `20240131T235959`.
/// Always rendered in UTC so names sort in recording order across DST changes.
pub const FILE_STAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

pub fn utc_ns_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() * 1_000_000_000 + d.subsec_nanos() as u64)
        .unwrap_or(0)
}

pub fn file_stamp(at: DateTime<Utc>) -> String {
    at.format(FILE_STAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stamp_has_second_resolution() {
        let at = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 58).unwrap();
        assert_eq!(file_stamp(at), "20240131T235958");
    }

    #[test]
    fn now_is_nonzero() {
        assert!(utc_ns_now() > 0);
        assert_eq!(file_stamp(Utc::now()).len(), 15);
    }
}
