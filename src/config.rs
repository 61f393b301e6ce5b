/**
 * Configuration constants for the watch session and broadcast hub
 */
use crate::error::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

/// Default bound of each subscriber's outbound queue
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 16;

/// Longest a publish may wait to enter the hub before the event is dropped
pub const DEFAULT_PUBLISH_TIMEOUT_MILLIS: u64 = 2_000;

/// Period at which the store re-delivers current state as synthetic updates
pub const DEFAULT_RESYNC_SECONDS: u64 = 300;

/// Watch stream timeout in seconds (294 vs 300 to allow 6 seconds for graceful shutdown)
pub const WATCH_TIMEOUT_SECONDS: u32 = 294;

/// Maximum backoff time in seconds between restart attempts
pub const MAX_BACKOFF_SECONDS: u64 = 60;

/// Initial backoff time in seconds
pub const INITIAL_BACKOFF_SECONDS: u64 = 1;

/// Brief delay between restart attempts in seconds
pub const RESTART_DELAY_SECONDS: u64 = 1;

/// Channel buffer size between the store's watch task and the controller
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 100;

/// Log lines returned by a log tail when none are requested
pub const DEFAULT_LOG_TAIL_LINES: i64 = 50;

/// Which timestamp of a deployment feeds the rendered age
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AgeSource {
    /// `metadata.creationTimestamp`
    #[default]
    Created,
    /// `lastUpdateTime` of the first status condition
    LastUpdate,
}

impl FromStr for AgeSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "created" => Ok(Self::Created),
            "last-update" => Ok(Self::LastUpdate),
            other => Err(Error::Custom(format!(
                "unknown age source '{other}', expected 'created' or 'last-update'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    pub subscriber_capacity: usize,
    pub publish_timeout: Duration,
    /// `None` disables resynchronization
    pub resync_period: Option<Duration>,
    pub age_source: AgeSource,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            publish_timeout: Duration::from_millis(DEFAULT_PUBLISH_TIMEOUT_MILLIS),
            resync_period: Some(Duration::from_secs(DEFAULT_RESYNC_SECONDS)),
            age_source: AgeSource::default(),
        }
    }
}

impl BroadcastConfig {
    /// # Errors
    ///
    /// Returns an error if a capacity, timeout or resync period is zero
    pub fn validate(&self) -> Result<()> {
        if self.subscriber_capacity == 0 {
            return Err(Error::Custom(
                "subscriber capacity must be greater than 0".to_string(),
            ));
        }
        if self.publish_timeout.is_zero() {
            return Err(Error::Custom(
                "publish timeout must be greater than 0".to_string(),
            ));
        }
        if self.resync_period.is_some_and(|p| p.is_zero()) {
            return Err(Error::Custom(
                "resync period must be greater than 0 when enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Validate configuration constants at compile time
const _: () = {
    assert!(DEFAULT_SUBSCRIBER_CAPACITY > 0, "DEFAULT_SUBSCRIBER_CAPACITY must be greater than 0");
    assert!(DEFAULT_PUBLISH_TIMEOUT_MILLIS > 0, "DEFAULT_PUBLISH_TIMEOUT_MILLIS must be greater than 0");
    assert!(DEFAULT_RESYNC_SECONDS > 0, "DEFAULT_RESYNC_SECONDS must be greater than 0");
    assert!(WATCH_TIMEOUT_SECONDS > 0, "WATCH_TIMEOUT_SECONDS must be greater than 0");
    assert!(MAX_BACKOFF_SECONDS >= INITIAL_BACKOFF_SECONDS, "MAX_BACKOFF_SECONDS must be at least INITIAL_BACKOFF_SECONDS");
    assert!(INITIAL_BACKOFF_SECONDS > 0, "INITIAL_BACKOFF_SECONDS must be greater than 0");
    assert!(NOTIFICATION_CHANNEL_CAPACITY > 0, "NOTIFICATION_CHANNEL_CAPACITY must be greater than 0");
    assert!(DEFAULT_LOG_TAIL_LINES > 0, "DEFAULT_LOG_TAIL_LINES must be greater than 0");
};
