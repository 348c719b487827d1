use std::time::SystemTime;

use time::OffsetDateTime;

/// An entry modified at `modified` stays fresh through `modified + ttl`, inclusive.
pub fn is_fresh(modified: i64, ttl_seconds: u64, now: i64) -> bool {
    let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
    modified.saturating_add(ttl) >= now
}

/// Whole UNIX seconds for a filesystem timestamp.
pub fn unix_seconds(at: SystemTime) -> i64 {
    OffsetDateTime::from(at).unix_timestamp()
}

pub fn now_unix_seconds() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
