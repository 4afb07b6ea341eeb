// src/poll/config.rs
use serde::Deserialize;
use std::time::Duration;

/// Prevent accidental zero/near-zero intervals from creating a busy loop.
pub const MIN_BASE_INTERVAL_MS: u64 = 100;

pub const DEFAULT_BASE_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_MAX_INTERVAL_MS: u64 = 30_000;
pub const ROSTER_BASE_INTERVAL_MS: u64 = 10_000;
pub const ROSTER_MAX_INTERVAL_MS: u64 = 60_000;

/// Backoff multiplier applied after each unchanged fetch.
pub const BACKOFF_FACTOR: f64 = 1.5;

const ENV_BASE: &str = "ROSTER_BASE_INTERVAL_MS";
const ENV_MAX: &str = "ROSTER_MAX_INTERVAL_MS";

/// Interval settings for one subscription, as found in `config/roster.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_base")]
    pub base_interval_ms: u64,
    #[serde(default = "default_max")]
    pub max_interval_ms: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_base() -> u64 {
    DEFAULT_BASE_INTERVAL_MS
}
fn default_max() -> u64 {
    DEFAULT_MAX_INTERVAL_MS
}
fn default_enabled() -> bool {
    true
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: DEFAULT_BASE_INTERVAL_MS,
            max_interval_ms: DEFAULT_MAX_INTERVAL_MS,
            enabled: true,
        }
    }
}

impl PollingConfig {
    /// Roster-class data changes slowly; start at 10s and back off to a minute.
    pub fn roster() -> Self {
        Self {
            base_interval_ms: ROSTER_BASE_INTERVAL_MS,
            max_interval_ms: ROSTER_MAX_INTERVAL_MS,
            enabled: true,
        }
    }

    /// Clamp into a valid range: base >= MIN_BASE_INTERVAL_MS, max >= base.
    pub fn sanitized(mut self) -> Self {
        self.base_interval_ms = self.base_interval_ms.max(MIN_BASE_INTERVAL_MS);
        if self.max_interval_ms < self.base_interval_ms {
            self.max_interval_ms = self.base_interval_ms;
        }
        self
    }

    /// Apply `ROSTER_BASE_INTERVAL_MS` / `ROSTER_MAX_INTERVAL_MS` when set and numeric.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = parse_ms_env(std::env::var(ENV_BASE).ok()) {
            self.base_interval_ms = v;
        }
        if let Some(v) = parse_ms_env(std::env::var(ENV_MAX).ok()) {
            self.max_interval_ms = v;
        }
        self
    }

    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.sanitized().base_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.sanitized().max_interval_ms)
    }
}

fn parse_ms_env(raw: Option<String>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
}

/// `min(current * 1.5, max)`, never below `base`.
pub fn next_backoff(current: Duration, base: Duration, max: Duration) -> Duration {
    let grown = Duration::from_secs_f64(current.as_secs_f64() * BACKOFF_FACTOR);
    grown.min(max).max(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn sanitize_raises_floor_and_max() {
        let c = PollingConfig {
            base_interval_ms: 0,
            max_interval_ms: 50,
            enabled: true,
        }
        .sanitized();
        assert_eq!(c.base_interval_ms, MIN_BASE_INTERVAL_MS);
        assert_eq!(c.max_interval_ms, MIN_BASE_INTERVAL_MS);
    }

    #[test]
    fn backoff_caps_at_max() {
        let base = Duration::from_millis(1_000);
        let max = Duration::from_millis(3_000);
        let d1 = next_backoff(base, base, max);
        assert_eq!(d1, Duration::from_millis(1_500));
        let d2 = next_backoff(d1, base, max);
        assert_eq!(d2, Duration::from_millis(2_250));
        assert_eq!(next_backoff(d2, base, max), max);
        assert_eq!(next_backoff(max, base, max), max);
    }

    #[test]
    fn toml_fields_default() {
        let c: PollingConfig = toml::from_str("enabled = false").unwrap();
        assert_eq!(c.base_interval_ms, DEFAULT_BASE_INTERVAL_MS);
        assert_eq!(c.max_interval_ms, DEFAULT_MAX_INTERVAL_MS);
        assert!(!c.enabled);
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_apply_when_numeric() {
        env::set_var(ENV_BASE, "2500");
        env::set_var(ENV_MAX, "not-a-number");
        let c = PollingConfig::roster().with_env_overrides();
        assert_eq!(c.base_interval_ms, 2_500);
        assert_eq!(c.max_interval_ms, ROSTER_MAX_INTERVAL_MS);
        env::remove_var(ENV_BASE);
        env::remove_var(ENV_MAX);
    }
}
