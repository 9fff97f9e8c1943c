//! Updater configuration.

use std::time::Duration;

use chrono_tz::Tz;
use tracing::warn;

use crate::trip_times::ReconcileConfig;

/// Tuning for the [`StoptimeUpdater`](super::StoptimeUpdater).
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Minimum time between two unforced snapshot publications.
    pub max_snapshot_frequency: Duration,

    /// Drop realtime data for service days that are over.
    pub purge_expired_data: bool,

    /// Log a progress line every this many applied batches.
    pub log_frequency: u64,

    /// Zone in which "today" is decided for expiry.
    pub timezone: Tz,

    /// How often the periodic runner invokes the updater. Never zero.
    pub update_frequency: Duration,

    /// Settings for turning batches into trip times.
    pub reconcile: ReconcileConfig,
}

impl UpdaterConfig {
    /// Create a new configuration with the given parameters.
    pub fn new(
        max_snapshot_frequency: Duration,
        purge_expired_data: bool,
        log_frequency: u64,
        timezone: Tz,
    ) -> Self {
        Self {
            max_snapshot_frequency,
            purge_expired_data,
            log_frequency,
            timezone,
            ..Self::default()
        }
    }

    /// Shortest accepted update frequency.
    pub const MIN_UPDATE_FREQUENCY: Duration = Duration::from_millis(1);

    /// Set the update frequency, raising zero to [`Self::MIN_UPDATE_FREQUENCY`].
    pub fn with_update_frequency(mut self, update_frequency: Duration) -> Self {
        self.update_frequency = update_frequency.max(Self::MIN_UPDATE_FREQUENCY);
        self
    }

    pub fn with_reconcile(mut self, reconcile: ReconcileConfig) -> Self {
        self.reconcile = reconcile;
        self
    }

    /// Defaults overridden by any `RT_*` environment variables that are set.
    ///
    /// Unparseable values, and an update frequency of zero, are logged and
    /// ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            let raw = lookup(key)?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(key, value = %raw, "ignoring unparseable setting");
                    None
                }
            }
        }

        let mut config = Self::default();
        if let Some(ms) = parsed::<u64>(&lookup, "RT_SNAPSHOT_INTERVAL_MS") {
            config.max_snapshot_frequency = Duration::from_millis(ms);
        }
        if let Some(purge) = parsed(&lookup, "RT_PURGE_EXPIRED") {
            config.purge_expired_data = purge;
        }
        if let Some(n) = parsed(&lookup, "RT_LOG_FREQUENCY") {
            config.log_frequency = n;
        }
        if let Some(tz) = parsed(&lookup, "RT_TIMEZONE") {
            config.timezone = tz;
        }
        match parsed::<u64>(&lookup, "RT_UPDATE_FREQUENCY_SECS") {
            Some(0) => warn!(key = "RT_UPDATE_FREQUENCY_SECS", "ignoring zero update frequency"),
            Some(secs) => config.update_frequency = Duration::from_secs(secs),
            None => {}
        }
        if let Some(rate) = parsed(&lookup, "RT_RECOVERY_SECS_PER_MINUTE") {
            config.reconcile = ReconcileConfig::new(rate);
        }
        config
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            max_snapshot_frequency: Duration::from_millis(1000),
            purge_expired_data: true,
            log_frequency: 2000,
            timezone: chrono_tz::UTC,
            update_frequency: Duration::from_secs(5 * 60),
            reconcile: ReconcileConfig::default(),
        }
    }
}
