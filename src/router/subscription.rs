//! Streaming subscription handshake
//!
//! Before a group can receive live trades its trade channel must be
//! registered with the streamer peer. Each round sends up to
//! `attempts_per_round` requests and waits for a boolean acknowledgement;
//! failed rounds are retried with doubling backoff until the round budget is
//! exhausted, at which point the group's subscription state turns `Failed`.

use super::registry::SignalGroup;
use super::types::RouterError;
use crate::bus::{Bus, SubscribeRequest};
use crate::telemetry::{count, CounterMetric};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};

/// Retry policy for the subscription handshake
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    /// Requests sent per round before backing off
    pub attempts_per_round: u32,
    /// Rounds before the subscription is declared failed (0 = retry forever)
    pub max_rounds: u32,
    /// Delay before the second round
    pub initial_backoff: Duration,
    /// Upper bound for the backoff delay
    pub max_backoff: Duration,
    /// How long to wait for each acknowledgement
    pub ack_timeout: Duration,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            attempts_per_round: 3,
            max_rounds: 10,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            ack_timeout: Duration::from_secs(5),
        }
    }
}

impl SubscriptionConfig {
    /// Set requests per round
    pub fn attempts_per_round(mut self, n: u32) -> Self {
        self.attempts_per_round = n;
        self
    }

    /// Set the round budget (0 = retry forever)
    pub fn max_rounds(mut self, n: u32) -> Self {
        self.max_rounds = n;
        self
    }

    /// Set the delay before the second round
    pub fn initial_backoff(mut self, d: Duration) -> Self {
        self.initial_backoff = d;
        self
    }

    /// Set the backoff ceiling
    pub fn max_backoff(mut self, d: Duration) -> Self {
        self.max_backoff = d;
        self
    }

    /// Set the per-acknowledgement wait
    pub fn ack_timeout(mut self, d: Duration) -> Self {
        self.ack_timeout = d;
        self
    }
}

/// Lifecycle of a group's streaming subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Handshake not yet completed
    Pending,
    /// Streamer acknowledged; trades are flowing
    Active,
    /// Retry budget exhausted; the group receives no live trades
    Failed,
}

/// One handshake round: up to `attempts_per_round` send/ack exchanges
///
/// A false acknowledgement, a dropped reply, and an ack timeout all count as
/// failed attempts.
async fn subscribe_round(bus: &Bus, group: &SignalGroup, config: &SubscriptionConfig) -> bool {
    for attempt in 1..=config.attempts_per_round.max(1) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = SubscribeRequest {
            name: group.name().to_string(),
            patterns: group.pattern_sources().to_vec(),
            trades: group.trade_sender(),
            reply: reply_tx,
        };

        if bus.subscribe_sender().send(request).await.is_err() {
            tracing::debug!(group = group.name(), "streamer request channel closed");
            return false;
        }

        match timeout(config.ack_timeout, reply_rx).await {
            Ok(Ok(true)) => return true,
            Ok(Ok(false)) => {
                tracing::debug!(group = group.name(), attempt, "subscription rejected")
            }
            Ok(Err(_)) => {
                tracing::debug!(group = group.name(), attempt, "subscription reply dropped")
            }
            Err(_) => {
                tracing::debug!(group = group.name(), attempt, "subscription ack timed out")
            }
        }
    }
    false
}

/// Full handshake: rounds with doubling backoff until success or exhaustion
pub(crate) async fn subscribe_with_retry(
    bus: &Bus,
    group: &Arc<SignalGroup>,
    config: &SubscriptionConfig,
) -> Result<(), RouterError> {
    let mut rounds = 0u32;
    let mut delay = config.initial_backoff;

    loop {
        if subscribe_round(bus, group, config).await {
            return Ok(());
        }

        rounds += 1;
        count(CounterMetric::SubscriptionRetries);
        tracing::error!(
            group = group.name(),
            rounds,
            "failed to register streaming data"
        );

        if config.max_rounds > 0 && rounds >= config.max_rounds {
            return Err(RouterError::SubscriptionFailed(group.name().to_string()));
        }

        sleep(delay).await;
        delay = (delay * 2).min(config.max_backoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Registry;
    use crate::strategy::{Observation, RiskParams, Rule, SignalSpec, Trigger};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Always;

    impl Rule for Always {
        fn evaluate(&self, _obs: Observation<'_>) -> bool {
            true
        }
    }

    fn on_trade_group(registry: &Registry) -> Arc<SignalGroup> {
        let spec = SignalSpec::new("g", Trigger::OnTrade, Arc::new(Always), RiskParams::default());
        let (group, _) = registry.register(&["^BTC".to_string()], spec).unwrap();
        group
    }

    fn fast_config() -> SubscriptionConfig {
        SubscriptionConfig::default()
            .initial_backoff(Duration::from_millis(5))
            .max_backoff(Duration::from_millis(20))
            .ack_timeout(Duration::from_millis(200))
    }

    #[test]
    fn test_config_builder() {
        let config = SubscriptionConfig::default()
            .attempts_per_round(5)
            .max_rounds(0)
            .initial_backoff(Duration::from_millis(100))
            .max_backoff(Duration::from_secs(10))
            .ack_timeout(Duration::from_secs(1));

        assert_eq!(config.attempts_per_round, 5);
        assert_eq!(config.max_rounds, 0);
        assert_eq!(config.initial_backoff, Duration::from_millis(100));
        assert_eq!(config.max_backoff, Duration::from_secs(10));
        assert_eq!(config.ack_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let bus = Bus::new(8);
        let registry = Registry::new();
        let group = on_trade_group(&registry);

        let mut requests = bus.take_subscribe_receiver().unwrap();
        let handled = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&handled);
        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                seen.fetch_add(1, Ordering::SeqCst);
                let _ = request.reply.send(true);
            }
        });

        assert!(subscribe_round(&bus, &group, &fast_config()).await);
        assert_eq!(handled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_round_stops_after_attempt_budget() {
        let bus = Bus::new(8);
        let registry = Registry::new();
        let group = on_trade_group(&registry);

        let mut requests = bus.take_subscribe_receiver().unwrap();
        let handled = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&handled);
        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                seen.fetch_add(1, Ordering::SeqCst);
                let _ = request.reply.send(false);
            }
        });

        assert!(!subscribe_round(&bus, &group, &fast_config()).await);
        assert_eq!(handled.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_returns_error() {
        let bus = Bus::new(8);
        let registry = Registry::new();
        let group = on_trade_group(&registry);

        let mut requests = bus.take_subscribe_receiver().unwrap();
        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                let _ = request.reply.send(false);
            }
        });

        let config = fast_config().max_rounds(2);
        let err = subscribe_with_retry(&bus, &group, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::SubscriptionFailed(name) if name == "g"));
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failure() {
        let bus = Bus::new(8);
        let registry = Registry::new();
        let group = on_trade_group(&registry);

        // Rejects the first round's three attempts, accepts the fourth
        let mut requests = bus.take_subscribe_receiver().unwrap();
        tokio::spawn(async move {
            let mut n = 0;
            while let Some(request) = requests.recv().await {
                n += 1;
                let _ = request.reply.send(n > 3);
            }
        });

        let config = fast_config().max_rounds(3);
        assert!(subscribe_with_retry(&bus, &group, &config).await.is_ok());
    }
}
