//! Human-readable relative time for comment and activity timestamps

use chrono::{DateTime, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 3600;
const DAY: i64 = 86400;

/// Format `then` relative to `now`.
///
/// - under a minute: `moments ago`
/// - under an hour: `N minutes ago`
/// - under a day: `N hours ago`
/// - otherwise the absolute date, e.g. `Mar 05 14:30`
///
/// Timestamps in the future (clock skew between client and backend) are
/// treated as "moments ago".
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use percept_common::human_time::format_relative;
///
/// let now = Utc::now();
/// assert_eq!(format_relative(now - Duration::seconds(10), now), "moments ago");
/// assert_eq!(format_relative(now - Duration::minutes(5), now), "5 minutes ago");
/// assert_eq!(format_relative(now - Duration::hours(3), now), "3 hours ago");
/// ```
pub fn format_relative(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - then).num_seconds();

    if diff < MINUTE {
        "moments ago".to_string()
    } else if diff < HOUR {
        plural(diff / MINUTE, "minute")
    } else if diff < DAY {
        plural(diff / HOUR, "hour")
    } else {
        then.format("%b %d %H:%M").to_string()
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}
