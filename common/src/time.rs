//! Time utilities and constants for the pricing engine.

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Pricing timing constants.
pub mod constants {
    use super::Duration;

    /// How long a cached rate snapshot stays fresh (1 hour).
    pub fn rate_cache_ttl() -> Duration {
        Duration::hours(1)
    }

    /// Hard timeout of one provider request (10 seconds).
    pub fn provider_request_timeout() -> Duration {
        Duration::seconds(10)
    }
}

/// A timestamp (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Timestamp from unix seconds, as reported by rate providers.
pub fn from_unix_seconds(secs: i64) -> Option<Timestamp> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Duration extensions for convenient conversion.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}
