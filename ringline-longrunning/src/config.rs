//! Resolver configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::poll::{ExponentialBackoff, FixedDelay, Immediate, PollStrategy};

/// Configuration for the cached worker pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// How long an idle worker waits for a new job before exiting.
    pub keep_alive: Duration,
    /// Prefix for worker thread names; the worker index is appended.
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(60),
            thread_name: "ringline-lro".to_string(),
        }
    }
}

impl PoolConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.keep_alive.is_zero() {
            return Err(Error::Config("keep_alive must be non-zero".into()));
        }
        if self.thread_name.is_empty() {
            return Err(Error::Config("thread_name must not be empty".into()));
        }
        Ok(())
    }
}

const INITIAL_MS_VAR: &str = "RINGLINE_LRO_POLL_INITIAL_MS";
const MAX_MS_VAR: &str = "RINGLINE_LRO_POLL_MAX_MS";
const MULTIPLIER_VAR: &str = "RINGLINE_LRO_POLL_MULTIPLIER";

/// Inter-poll delay configuration.
///
/// The default polls again immediately. A non-zero `initial_delay_ms` with
/// `multiplier == 1.0` waits a fixed interval; a larger multiplier backs off
/// exponentially up to `max_delay_ms`.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Delay before the first poll. 0 = poll immediately, every time.
    pub initial_delay_ms: u64,
    /// Upper bound on the delay. 0 = same as `initial_delay_ms`.
    pub max_delay_ms: u64,
    /// Growth factor applied per poll. Must be >= 1.0.
    pub multiplier: f64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 0,
            max_delay_ms: 0,
            multiplier: 1.0,
        }
    }
}

impl PollConfig {
    /// Build a poll configuration from environment variables.
    ///
    /// Uses:
    /// - `RINGLINE_LRO_POLL_INITIAL_MS` for the first delay
    /// - `RINGLINE_LRO_POLL_MAX_MS` for the delay cap
    /// - `RINGLINE_LRO_POLL_MULTIPLIER` for the growth factor
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        if let Some(v) = var(INITIAL_MS_VAR) {
            config.initial_delay_ms = parse_env(INITIAL_MS_VAR, &v)?;
        }
        if let Some(v) = var(MAX_MS_VAR) {
            config.max_delay_ms = parse_env(MAX_MS_VAR, &v)?;
        }
        if let Some(v) = var(MULTIPLIER_VAR) {
            config.multiplier = parse_env(MULTIPLIER_VAR, &v)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::Config(format!(
                "multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            )));
        }
        if self.max_delay_ms != 0 && self.max_delay_ms < self.initial_delay_ms {
            return Err(Error::Config(
                "max_delay_ms must be >= initial_delay_ms".into(),
            ));
        }
        Ok(())
    }

    /// The strategy this configuration describes.
    pub fn strategy(&self) -> Arc<dyn PollStrategy> {
        let initial = Duration::from_millis(self.initial_delay_ms);
        if initial.is_zero() {
            return Arc::new(Immediate);
        }
        if self.multiplier <= 1.0 {
            return Arc::new(FixedDelay(initial));
        }
        let max = Duration::from_millis(self.max_delay_ms.max(self.initial_delay_ms));
        Arc::new(ExponentialBackoff::new(initial, self.multiplier, max))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name}: cannot parse {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_polls_immediately() {
        let config = PollConfig::default();
        config.validate().unwrap();
        let strategy = config.strategy();
        assert_eq!(strategy.delay_before(1), Duration::ZERO);
        assert_eq!(strategy.delay_before(10), Duration::ZERO);
    }

    #[test]
    fn fixed_delay_selected() {
        let config = PollConfig {
            initial_delay_ms: 50,
            ..PollConfig::default()
        };
        let strategy = config.strategy();
        assert_eq!(strategy.delay_before(1), Duration::from_millis(50));
        assert_eq!(strategy.delay_before(9), Duration::from_millis(50));
    }

    #[test]
    fn backoff_selected() {
        let config = PollConfig {
            initial_delay_ms: 10,
            max_delay_ms: 30,
            multiplier: 2.0,
        };
        let strategy = config.strategy();
        assert_eq!(strategy.delay_before(1), Duration::from_millis(10));
        assert_eq!(strategy.delay_before(2), Duration::from_millis(20));
        assert_eq!(strategy.delay_before(3), Duration::from_millis(30));
    }

    #[test]
    fn invalid_poll_config() {
        let config = PollConfig {
            multiplier: 0.5,
            ..PollConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = PollConfig {
            initial_delay_ms: 100,
            max_delay_ms: 10,
            multiplier: 2.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_pool_config() {
        PoolConfig::default().validate().unwrap();

        let config = PoolConfig {
            keep_alive: Duration::ZERO,
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PoolConfig {
            thread_name: String::new(),
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn lookup_reads_all_three_variables() {
        let config = PollConfig::from_lookup(lookup(&[
            (INITIAL_MS_VAR, "10"),
            (MAX_MS_VAR, " 40 "),
            (MULTIPLIER_VAR, "2"),
        ]))
        .unwrap();
        assert_eq!(
            config,
            PollConfig {
                initial_delay_ms: 10,
                max_delay_ms: 40,
                multiplier: 2.0,
            }
        );
        let strategy = config.strategy();
        assert_eq!(strategy.delay_before(1), Duration::from_millis(10));
        assert_eq!(strategy.delay_before(3), Duration::from_millis(40));
        assert_eq!(strategy.delay_before(9), Duration::from_millis(40));
    }

    #[test]
    fn lookup_blank_or_missing_keeps_defaults() {
        let config = PollConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, PollConfig::default());

        let config =
            PollConfig::from_lookup(lookup(&[(INITIAL_MS_VAR, "  "), (MULTIPLIER_VAR, "")]))
                .unwrap();
        assert_eq!(config, PollConfig::default());
    }

    #[test]
    fn lookup_rejects_bad_values() {
        let err = PollConfig::from_lookup(lookup(&[(MULTIPLIER_VAR, "fast")])).unwrap_err();
        assert!(
            matches!(&err, Error::Config(msg) if msg.contains(MULTIPLIER_VAR)),
            "{err}"
        );

        let err = PollConfig::from_lookup(lookup(&[(INITIAL_MS_VAR, "-5")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        // Parses, but fails validation.
        let err = PollConfig::from_lookup(lookup(&[(MULTIPLIER_VAR, "0.5")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    // The only test that touches these process environment variables.
    #[test]
    fn from_env_reads_process_environment() {
        // SAFETY: no other test reads or writes the RINGLINE_LRO_POLL_* variables.
        unsafe {
            std::env::set_var(INITIAL_MS_VAR, "25");
            std::env::set_var(MAX_MS_VAR, "100");
            std::env::set_var(MULTIPLIER_VAR, "1.5");
        }
        let config = PollConfig::from_env().unwrap();
        assert_eq!(config.initial_delay_ms, 25);
        assert_eq!(config.max_delay_ms, 100);
        assert_eq!(config.multiplier, 1.5);
        assert_eq!(config.strategy().delay_before(1), Duration::from_millis(25));

        unsafe { std::env::set_var(MAX_MS_VAR, "lots") };
        assert!(matches!(PollConfig::from_env(), Err(Error::Config(_))));

        unsafe {
            std::env::remove_var(INITIAL_MS_VAR);
            std::env::set_var(MAX_MS_VAR, " ");
            std::env::remove_var(MULTIPLIER_VAR);
        }
        assert_eq!(PollConfig::from_env().unwrap(), PollConfig::default());

        unsafe { std::env::remove_var(MAX_MS_VAR) };
    }

    #[test]
    fn parse_env_values() {
        assert_eq!(parse_env::<u64>("X", " 25 ").unwrap(), 25);
        assert!(parse_env::<f64>("X", "fast").is_err());
    }
}
