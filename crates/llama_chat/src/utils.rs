use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Expand a leading `~/` (or a lone `~`) to the user's home directory.
/// Paths without a tilde, or when no home directory is known, are returned as-is.
pub fn expand_tilde(path: &str) -> PathBuf {
    let home = dirs::home_dir();
    match (path, home) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

/// Replace the home directory prefix with `~` for display.
pub fn display_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(suffix) = path.strip_prefix(&home) {
            return format!("~/{}", suffix.display());
        }
    }
    path.display().to_string()
}

/// Human friendly distance between `then` and `now`, e.g. "3 minutes ago".
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(then).num_seconds();
    let (amount, suffix) = if seconds < 0 {
        (-seconds, "from now")
    } else {
        (seconds, "ago")
    };

    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const WEEK: i64 = 7 * DAY;
    const MONTH: i64 = 30 * DAY;
    const YEAR: i64 = 365 * DAY;

    let (count, unit) = match amount {
        0 => return "now".to_string(),
        s if s < MINUTE => (s, "second"),
        s if s < HOUR => (s / MINUTE, "minute"),
        s if s < DAY => (s / HOUR, "hour"),
        s if s < WEEK => (s / DAY, "day"),
        s if s < MONTH => (s / WEEK, "week"),
        s if s < YEAR => (s / MONTH, "month"),
        s => (s / YEAR, "year"),
    };

    if count == 1 {
        format!("1 {unit} {suffix}")
    } else {
        format!("{count} {unit}s {suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_relative_time_ladder() {
        let now = Utc::now();
        assert_eq!(relative_time(now, now), "now");
        assert_eq!(relative_time(now - Duration::seconds(1), now), "1 second ago");
        assert_eq!(relative_time(now - Duration::seconds(45), now), "45 seconds ago");
        assert_eq!(relative_time(now - Duration::minutes(3), now), "3 minutes ago");
        assert_eq!(relative_time(now - Duration::hours(1), now), "1 hour ago");
        assert_eq!(relative_time(now - Duration::days(2), now), "2 days ago");
        assert_eq!(relative_time(now - Duration::days(14), now), "2 weeks ago");
        assert_eq!(relative_time(now - Duration::days(400), now), "1 year ago");
        assert_eq!(relative_time(now + Duration::minutes(5), now), "5 minutes from now");
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/tmp/a.png"), PathBuf::from("/tmp/a.png"));
        assert_eq!(expand_tilde("rel/a.png"), PathBuf::from("rel/a.png"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/pics/a.png"), home.join("pics/a.png"));
            assert_eq!(expand_tilde("~"), home);
        }
    }
}
