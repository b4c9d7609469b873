//! Freshness window and age formatting for cached bundles.

use chrono::Utc;

use crate::models::UserBundle;

/// A bundle older than this is refetched on load.
pub const CACHE_EXPIRY_MINUTES: i64 = 30;

const CACHE_EXPIRY_MS: i64 = CACHE_EXPIRY_MINUTES * 60 * 1000;

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Expired once strictly more than the window has passed.
pub fn is_expired(cache_timestamp: i64, now: i64) -> bool {
    now.saturating_sub(cache_timestamp) > CACHE_EXPIRY_MS
}

/// Whether a stored timestamp could have been written by this client.
/// Allows one window of clock skew into the future.
pub fn is_plausible(cache_timestamp: i64, now: i64) -> bool {
    cache_timestamp > 0 && cache_timestamp <= now.saturating_add(CACHE_EXPIRY_MS)
}

/// Timestamp for the next write. Never goes backwards and always moves past
/// `previous`, even when two writes land in the same millisecond.
pub fn next_timestamp(previous: Option<i64>, now: i64) -> i64 {
    match previous {
        Some(prev) => now.max(prev.saturating_add(1)),
        None => now,
    }
}

pub fn age_minutes(cache_timestamp: i64, now: i64) -> i64 {
    now.saturating_sub(cache_timestamp) / 60_000
}

pub fn age_display(cache_timestamp: i64, now: i64) -> String {
    let minutes = age_minutes(cache_timestamp, now);
    if minutes < 1 {
        // Includes clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

impl UserBundle {
    pub fn is_expired(&self) -> bool {
        is_expired(self.cache_timestamp, now_millis())
    }

    pub fn age_display(&self) -> String {
        age_display(self.cache_timestamp, now_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: i64 = 60_000;

    #[test]
    fn test_expiry_boundary() {
        let now = 10_000 * MINUTE;
        assert!(!is_expired(now - 29 * MINUTE, now));
        assert!(!is_expired(now - 30 * MINUTE, now));
        assert!(is_expired(now - 30 * MINUTE - 1, now));
        assert!(is_expired(now - 31 * MINUTE, now));
    }

    #[test]
    fn test_next_timestamp_is_strictly_increasing() {
        assert_eq!(next_timestamp(None, 500), 500);
        assert_eq!(next_timestamp(Some(100), 500), 500);
        assert_eq!(next_timestamp(Some(500), 500), 501);
        // Clock went backwards
        assert_eq!(next_timestamp(Some(900), 500), 901);
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let now = 10_000 * MINUTE;
        assert!(is_expired(i64::MIN, now));
        assert!(!is_expired(i64::MAX, now));
        assert_eq!(next_timestamp(Some(i64::MAX), now), i64::MAX);
        assert!(age_display(i64::MIN, now).ends_with("d ago"));
        assert_eq!(age_display(i64::MAX, now), "just now");
    }

    #[test]
    fn test_plausible_timestamps() {
        let now = 10_000 * MINUTE;
        assert!(is_plausible(now, now));
        assert!(is_plausible(now - 1440 * MINUTE, now));
        assert!(is_plausible(now + 30 * MINUTE, now));
        assert!(!is_plausible(now + 31 * MINUTE, now));
        assert!(!is_plausible(0, now));
        assert!(!is_plausible(i64::MIN, now));
        assert!(!is_plausible(i64::MAX, now));
    }

    #[test]
    fn test_age_display() {
        let now = 10_000 * MINUTE;
        assert_eq!(age_display(now, now), "just now");
        assert_eq!(age_display(now + 5 * MINUTE, now), "just now");
        assert_eq!(age_display(now - 12 * MINUTE, now), "12m ago");
        assert_eq!(age_display(now - 90 * MINUTE, now), "2h ago");
        assert_eq!(age_display(now - 70 * MINUTE, now), "1h ago");
        assert_eq!(age_display(now - 1440 * MINUTE, now), "1d ago");
        assert_eq!(age_display(now - 2160 * MINUTE, now), "2d ago");
    }

    #[test]
    fn test_bundle_freshness() {
        let bundle = UserBundle {
            cache_timestamp: now_millis(),
            ..Default::default()
        };
        assert!(!bundle.is_expired());
        assert_eq!(bundle.age_display(), "just now");

        let old = UserBundle {
            cache_timestamp: now_millis() - 31 * MINUTE,
            ..Default::default()
        };
        assert!(old.is_expired());
    }
}
