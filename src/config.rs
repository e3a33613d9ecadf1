//! Runtime configuration for the ordercast tracker.
//!
//! Defaults mirror the reference behavior: four orders, a seven-stage
//! pipeline ending in "Completed", a 4-second advance tick, and a transition
//! queue of capacity 8. An optional `ordercast.toml` next to the working
//! directory overrides any field; CLI flags override the file.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "ordercast.toml";

const DEFAULT_STAGES: [&str; 7] = [
    "Accepted",
    "Inventory Confirmed",
    "Payment Confirmed",
    "Out to shipping",
    "In Transit",
    "Delivered",
    "Completed",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Port the HTTP server binds on (loopback).
    pub port: u16,
    /// Number of tracked orders; valid IDs are `0..order_count`.
    pub order_count: usize,
    /// Seconds between progress-driver ticks.
    pub interval_secs: u64,
    /// Transition queue capacity; signals beyond this are dropped.
    pub queue_capacity: usize,
    /// Per-subscriber outbound channel buffer.
    pub subscriber_buffer: usize,
    /// Maximum seconds a subscriber connection stays open before the
    /// stream is closed and cleaned up.
    pub subscriber_timeout_secs: u64,
    /// Ordered pipeline stage names; the last entry is terminal.
    pub stages: Vec<String>,
    /// Permissive CORS for local frontend development. CLI-only.
    #[serde(skip)]
    pub dev_mode: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            port: 4640,
            order_count: 4,
            interval_secs: 4,
            queue_capacity: 8,
            subscriber_buffer: 32,
            subscriber_timeout_secs: 120,
            stages: DEFAULT_STAGES.iter().map(|s| s.to_string()).collect(),
            dev_mode: false,
        }
    }
}

impl TrackerConfig {
    /// Load configuration from an explicit path, or from `ordercast.toml`
    /// in the working directory if present, falling back to defaults.
    ///
    /// An explicit path that does not exist is an error; the implicit
    /// lookup is best-effort.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("Invalid config file {}", path.display()))?
            }
            None => {
                let default_path = Path::new(CONFIG_FILE);
                if default_path.exists() {
                    let raw = std::fs::read_to_string(default_path)
                        .context("Failed to read ordercast.toml")?;
                    toml::from_str(&raw).context("Invalid ordercast.toml")?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the core cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            bail!("Config must define at least one pipeline stage");
        }
        if self.order_count == 0 {
            bail!("Config must track at least one order");
        }
        if self.queue_capacity == 0 {
            bail!("Transition queue capacity must be at least 1");
        }
        if self.subscriber_buffer == 0 {
            bail!("Subscriber buffer must be at least 1");
        }
        Ok(())
    }

    #[must_use]
    pub fn advance_interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn subscriber_timeout(&self) -> Duration {
        Duration::from_secs(self.subscriber_timeout_secs)
    }

    /// Serialized defaults, used by `ordercast config init`.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_reference_behavior() {
        let config = TrackerConfig::default();
        assert_eq!(config.order_count, 4);
        assert_eq!(config.interval_secs, 4);
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.stages.len(), 7);
        assert_eq!(config.stages[0], "Accepted");
        assert_eq!(config.stages[6], "Completed");
        assert!(!config.dev_mode);
    }

    #[test]
    fn load_explicit_file_overrides_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ordercast.toml");
        std::fs::write(&path, "port = 9999\ninterval_secs = 1\n").unwrap();
        let config = TrackerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.interval_secs, 1);
        // Unset fields keep their defaults
        assert_eq!(config.order_count, 4);
        assert_eq!(config.stages.len(), 7);
    }

    #[test]
    fn load_missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let result = TrackerConfig::load(Some(&path));
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    fn validate_rejects_empty_stage_list() {
        let config = TrackerConfig {
            stages: vec![],
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_orders_and_zero_capacity() {
        let no_orders = TrackerConfig {
            order_count: 0,
            ..TrackerConfig::default()
        };
        assert!(no_orders.validate().is_err());

        let no_queue = TrackerConfig {
            queue_capacity: 0,
            ..TrackerConfig::default()
        };
        assert!(no_queue.validate().is_err());
    }

    #[test]
    fn to_toml_roundtrips() {
        let config = TrackerConfig::default();
        let raw = config.to_toml().unwrap();
        let back: TrackerConfig = toml::from_str(&raw).unwrap();
        assert_eq!(back.port, config.port);
        assert_eq!(back.stages, config.stages);
    }

    #[test]
    fn durations_derive_from_seconds() {
        let config = TrackerConfig::default();
        assert_eq!(config.advance_interval(), Duration::from_secs(4));
        assert_eq!(config.subscriber_timeout(), Duration::from_secs(120));
    }
}
