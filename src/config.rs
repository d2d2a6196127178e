//! Configuration types for signal-router

use crate::router::{RouterConfig, SubscriptionConfig};
use crate::strategy::SignalDef;
use serde::Deserialize;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub router: RouterSection,
    #[serde(default)]
    pub subscription: SubscriptionSection,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Signals registered at startup
    #[serde(default)]
    pub signals: Vec<SignalDef>,
}

/// Message bus configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Per-channel buffer size
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

/// Router dispatch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RouterSection {
    /// Maximum concurrently processed watcher requests
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self { max_inflight: 64 }
    }
}

/// Subscription handshake configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionSection {
    /// Requests sent per round before backing off
    #[serde(default = "default_attempts_per_round")]
    pub attempts_per_round: u32,

    /// Rounds before the subscription is declared failed (0 = retry forever)
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Delay before the second round (milliseconds)
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for the backoff delay (milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// How long to wait for each acknowledgement (milliseconds)
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
}

fn default_channel_capacity() -> usize {
    64
}
fn default_max_inflight() -> usize {
    64
}
fn default_attempts_per_round() -> u32 {
    3
}
fn default_max_rounds() -> u32 {
    10
}
fn default_initial_backoff_ms() -> u64 {
    1000
}
fn default_max_backoff_ms() -> u64 {
    60_000
}
fn default_ack_timeout_ms() -> u64 {
    5000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SubscriptionSection {
    fn default() -> Self {
        Self {
            attempts_per_round: 3,
            max_rounds: 10,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            ack_timeout_ms: 5000,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Prometheus exporter port; disabled when absent
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Router runtime settings derived from the file
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            max_inflight: self.router.max_inflight,
            subscription: SubscriptionConfig::default()
                .attempts_per_round(self.subscription.attempts_per_round)
                .max_rounds(self.subscription.max_rounds)
                .initial_backoff(Duration::from_millis(self.subscription.initial_backoff_ms))
                .max_backoff(Duration::from_millis(self.subscription.max_backoff_ms))
                .ack_timeout(Duration::from_millis(self.subscription.ack_timeout_ms)),
        }
    }
}
