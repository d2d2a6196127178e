//! The router itself: registration, dispatch loops, consumer tasks

use super::registry::{Registry, SignalGroup};
use super::subscription::{subscribe_with_retry, SubscriptionConfig, SubscriptionState};
use super::types::RouterError;
use crate::bus::{Bus, GroupQuery, Notification, TriggerContext};
use crate::feed::{TickerSnapshot, Trade};
use crate::strategy::{Observation, SignalSpec};
use crate::telemetry::{count, CounterMetric};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};

/// Runtime knobs for the router
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Maximum concurrently processed watcher requests
    pub max_inflight: usize,
    /// Subscription handshake retry policy
    pub subscription: SubscriptionConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_inflight: 64,
            subscription: SubscriptionConfig::default(),
        }
    }
}

/// Builds a [`Router`]
///
/// The bus is required; building without one fails before any task is
/// spawned.
#[derive(Default)]
pub struct RouterBuilder {
    bus: Option<Arc<Bus>>,
    config: Option<RouterConfig>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bus(mut self, bus: Arc<Bus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Router, RouterError> {
        let bus = self.bus.ok_or(RouterError::MissingDependency("bus"))?;
        let config = self.config.unwrap_or_default();
        Ok(Router {
            registry: Arc::new(Registry::new()),
            inflight: Arc::new(Semaphore::new(config.max_inflight.max(1))),
            connected: Mutex::new(false),
            bus,
            config,
        })
    }
}

/// Routes ticker and trade events to matching signals and forwards hits to
/// the notifier peer
#[derive(Debug)]
pub struct Router {
    bus: Arc<Bus>,
    config: RouterConfig,
    registry: Arc<Registry>,
    connected: Mutex<bool>,
    inflight: Arc<Semaphore>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Signals applicable to the given ticker
    pub fn applicable(&self, ticker: &str) -> Vec<SignalSpec> {
        self.registry.lookup(ticker)
    }

    /// Number of registered groups
    pub fn group_count(&self) -> usize {
        self.registry.len()
    }

    /// Streaming subscription state for a group, if it exists
    pub fn subscription_state(&self, name: &str) -> Option<watch::Receiver<SubscriptionState>> {
        self.registry
            .get(name)
            .map(|group| group.subscription_state())
    }

    /// Register a signal under its name
    ///
    /// The first registration for a name compiles the patterns and creates
    /// the group; later calls append the spec and keep the original patterns.
    /// On-trade specs start the streaming handshake in the background; its
    /// outcome is observable through [`Router::subscription_state`].
    pub fn register(&self, patterns: &[String], spec: SignalSpec) -> Result<(), RouterError> {
        let on_trade = spec.is_on_trade();
        let (group, _created) = self.registry.register(patterns, spec)?;
        if on_trade {
            let bus = Arc::clone(&self.bus);
            let config = self.config.subscription.clone();
            tokio::spawn(Self::establish_streaming(bus, config, group));
        }
        Ok(())
    }

    /// Handshake with the streamer peer, then start the group consumer
    async fn establish_streaming(
        bus: Arc<Bus>,
        config: SubscriptionConfig,
        group: Arc<SignalGroup>,
    ) {
        match subscribe_with_retry(&bus, &group, &config).await {
            Ok(()) => {
                group.set_subscription_state(SubscriptionState::Active);
                if group.claim_consumer() {
                    if let Some(trades) = group.take_trade_receiver() {
                        tokio::spawn(Self::consume_trades(bus, group, trades));
                    }
                }
            }
            Err(e) => {
                count(CounterMetric::SubscriptionFailures);
                group.set_subscription_state(SubscriptionState::Failed);
                tracing::error!(group = group.name(), error = %e, "streaming subscription abandoned");
            }
        }
    }

    /// Single consumer for a group's trade channel; lives for the process
    ///
    /// Evaluates every on-trade spec of the group against each trade, in
    /// delivery order.
    async fn consume_trades(
        bus: Arc<Bus>,
        group: Arc<SignalGroup>,
        mut trades: mpsc::UnboundedReceiver<Trade>,
    ) {
        while let Some(trade) = trades.recv().await {
            count(CounterMetric::TradesConsumed);
            for spec in group.on_trade_specs() {
                if evaluate_guarded(&spec, Observation::Trade(&trade)) {
                    send_notification(&bus, spec, TriggerContext::Trade(trade.clone())).await;
                }
            }
        }
    }

    /// Start the dispatch loops; calling again is a no-op
    pub fn connect(&self) {
        let mut connected = self.connected.lock();
        if *connected {
            return;
        }

        if let Some(snapshots) = self.bus.take_snapshot_receiver() {
            tokio::spawn(Self::run_watcher_loop(
                Arc::clone(&self.registry),
                Arc::clone(&self.bus),
                Arc::clone(&self.inflight),
                snapshots,
            ));
        }
        if let Some(queries) = self.bus.take_query_receiver() {
            tokio::spawn(Self::run_streamer_loop(Arc::clone(&self.registry), queries));
        }

        *connected = true;
    }

    /// Watcher-request loop: each snapshot is matched and evaluated on its
    /// own task, bounded by the in-flight semaphore
    async fn run_watcher_loop(
        registry: Arc<Registry>,
        bus: Arc<Bus>,
        inflight: Arc<Semaphore>,
        mut snapshots: mpsc::Receiver<TickerSnapshot>,
    ) {
        while let Some(snapshot) = snapshots.recv().await {
            let permit = match Arc::clone(&inflight).acquire_owned().await {
                Ok(permit) => permit,
                // The semaphore is never closed
                Err(_) => return,
            };
            let registry = Arc::clone(&registry);
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                process_snapshot(&registry, &bus, snapshot).await;
                drop(permit);
            });
        }
        tracing::info!("watcher channel closed, dispatch loop stopping");
    }

    /// Streamer-request loop: replies with the group record, or stays silent
    /// for unknown names (the requester applies its own timeout)
    async fn run_streamer_loop(registry: Arc<Registry>, mut queries: mpsc::Receiver<GroupQuery>) {
        while let Some(query) = queries.recv().await {
            match registry.get(&query.name) {
                Some(group) => {
                    if query.reply.send(group.handle()).is_err() {
                        tracing::debug!(group = %query.name, "query requester went away");
                    }
                }
                None => {
                    tracing::debug!(group = %query.name, "query for unknown group");
                }
            }
        }
        tracing::info!("streamer channel closed, dispatch loop stopping");
    }
}

async fn process_snapshot(registry: &Registry, bus: &Bus, snapshot: TickerSnapshot) {
    count(CounterMetric::SnapshotsRouted);
    for spec in registry.lookup(&snapshot.ticker) {
        if evaluate_guarded(&spec, Observation::Snapshot(&snapshot)) {
            send_notification(
                bus,
                spec,
                TriggerContext::Poll {
                    ticker: snapshot.ticker.clone(),
                },
            )
            .await;
        }
    }
}

async fn send_notification(bus: &Bus, spec: SignalSpec, context: TriggerContext) {
    count(CounterMetric::NotificationsSent);
    let name = spec.name.clone();
    let notification = Notification::new(spec, context);
    if bus
        .notification_sender()
        .send(notification)
        .await
        .is_err()
    {
        tracing::warn!(group = %name, "notifier receiver dropped");
    }
}

/// Evaluate a rule, treating a panic as a non-match
fn evaluate_guarded(spec: &SignalSpec, obs: Observation<'_>) -> bool {
    match catch_unwind(AssertUnwindSafe(|| spec.rule.evaluate(obs))) {
        Ok(hit) => {
            if hit {
                count(CounterMetric::RuleMatches);
            }
            hit
        }
        Err(_) => {
            tracing::error!(signal = %spec.name, "rule evaluation panicked");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{RiskParams, Rule, Trigger};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    struct Always;

    impl Rule for Always {
        fn evaluate(&self, _obs: Observation<'_>) -> bool {
            true
        }
    }

    struct Panics;

    impl Rule for Panics {
        fn evaluate(&self, _obs: Observation<'_>) -> bool {
            panic!("boom")
        }
    }

    fn spec(name: &str, trigger: Trigger, rule: Arc<dyn Rule>) -> SignalSpec {
        SignalSpec::new(name, trigger, rule, RiskParams::default())
    }

    fn snapshot(ticker: &str) -> TickerSnapshot {
        TickerSnapshot {
            ticker: ticker.to_string(),
            price: dec!(50000),
            candle: None,
            taken_at: Utc::now(),
        }
    }

    #[test]
    fn test_builder_requires_bus() {
        let err = Router::builder().build().unwrap_err();
        assert!(matches!(err, RouterError::MissingDependency("bus")));
    }

    #[test]
    fn test_panicking_rule_is_a_non_match() {
        let spec = spec("p", Trigger::OnPoll, Arc::new(Panics));
        let snapshot = snapshot("BTCUSDT");
        assert!(!evaluate_guarded(&spec, Observation::Snapshot(&snapshot)));
    }

    #[tokio::test]
    async fn test_register_and_applicable() {
        let bus = Arc::new(Bus::default());
        let router = Router::builder().bus(bus).build().unwrap();

        router
            .register(
                &["^BTC".to_string()],
                spec("a", Trigger::OnPoll, Arc::new(Always)),
            )
            .unwrap();
        router
            .register(
                &["^ETH".to_string()],
                spec("a", Trigger::OnPoll, Arc::new(Always)),
            )
            .unwrap();

        assert_eq!(router.group_count(), 1);
        assert_eq!(router.applicable("BTCUSDT").len(), 2);
        assert!(router.applicable("ETHUSDT").is_empty());
    }

    #[tokio::test]
    async fn test_register_rejects_bad_pattern() {
        let bus = Arc::new(Bus::default());
        let router = Router::builder().bus(bus).build().unwrap();

        let err = router
            .register(
                &["(".to_string()],
                spec("a", Trigger::OnPoll, Arc::new(Always)),
            )
            .unwrap_err();
        assert!(matches!(err, RouterError::Pattern { .. }));
        assert_eq!(router.group_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_state_for_unknown_group() {
        let bus = Arc::new(Bus::default());
        let router = Router::builder().bus(bus).build().unwrap();
        assert!(router.subscription_state("nope").is_none());
    }
}
