//! Signal registry and ticker matching

use super::subscription::SubscriptionState;
use super::types::RouterError;
use crate::bus::GroupHandle;
use crate::feed::Trade;
use crate::strategy::SignalSpec;
use fancy_regex::Regex;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// All signals registered under one name
///
/// Patterns and the trade channel are fixed by the first registration; later
/// registrations for the same name only append specs. The trade channel is
/// never closed: once started, its consumer task lives for the rest of the
/// process (there is no deregistration path).
#[derive(Debug)]
pub struct SignalGroup {
    name: String,
    patterns: Vec<Regex>,
    sources: Vec<String>,
    trade_tx: mpsc::UnboundedSender<Trade>,
    trade_rx: Mutex<Option<mpsc::UnboundedReceiver<Trade>>>,
    specs: RwLock<Vec<SignalSpec>>,
    consumer_started: AtomicBool,
    state_tx: watch::Sender<SubscriptionState>,
}

impl SignalGroup {
    fn new(name: String, patterns: Vec<Regex>, sources: Vec<String>, spec: SignalSpec) -> Self {
        let (trade_tx, trade_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(SubscriptionState::Pending);
        Self {
            name,
            patterns,
            sources,
            trade_tx,
            trade_rx: Mutex::new(Some(trade_rx)),
            specs: RwLock::new(vec![spec]),
            consumer_started: AtomicBool::new(false),
            state_tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pattern strings as supplied at first registration
    pub fn pattern_sources(&self) -> &[String] {
        &self.sources
    }

    /// Whether any pattern matches the ticker; engine errors count as no match
    pub fn matches(&self, ticker: &str) -> bool {
        self.patterns
            .iter()
            .any(|re| re.is_match(ticker).unwrap_or(false))
    }

    /// Snapshot of the group's specs
    pub fn specs(&self) -> Vec<SignalSpec> {
        self.specs.read().clone()
    }

    /// Specs evaluated on live trades
    pub fn on_trade_specs(&self) -> Vec<SignalSpec> {
        self.specs
            .read()
            .iter()
            .filter(|spec| spec.is_on_trade())
            .cloned()
            .collect()
    }

    fn push_spec(&self, spec: SignalSpec) {
        self.specs.write().push(spec);
    }

    /// Sender half of the group's trade channel
    pub fn trade_sender(&self) -> mpsc::UnboundedSender<Trade> {
        self.trade_tx.clone()
    }

    /// Receiver half of the trade channel; yields once, to the group's
    /// single consumer task
    pub(crate) fn take_trade_receiver(&self) -> Option<mpsc::UnboundedReceiver<Trade>> {
        self.trade_rx.lock().take()
    }

    /// Claim the right to spawn the group consumer; true exactly once
    pub(crate) fn claim_consumer(&self) -> bool {
        !self.consumer_started.swap(true, Ordering::SeqCst)
    }

    /// Streaming subscription state for this group
    pub fn subscription_state(&self) -> watch::Receiver<SubscriptionState> {
        self.state_tx.subscribe()
    }

    pub(crate) fn set_subscription_state(&self, state: SubscriptionState) {
        self.state_tx.send_replace(state);
    }

    /// Record handed to the streamer peer
    pub fn handle(&self) -> GroupHandle {
        GroupHandle {
            name: self.name.clone(),
            patterns: self.sources.clone(),
            trades: self.trade_tx.clone(),
        }
    }
}

/// Concurrent name → group map
///
/// Entries are added and never removed. Lookups run concurrently with
/// registrations and may or may not see a group added mid-flight.
#[derive(Default, Debug)]
pub struct Registry {
    groups: RwLock<HashMap<String, Arc<SignalGroup>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec under its name
    ///
    /// The first registration for a name compiles `patterns` and creates the
    /// group; a compile failure aborts the call without creating anything.
    /// Later registrations append the spec and discard the supplied patterns.
    /// Returns the group and whether this call created it.
    pub fn register(
        &self,
        patterns: &[String],
        spec: SignalSpec,
    ) -> Result<(Arc<SignalGroup>, bool), RouterError> {
        let mut groups = self.groups.write();
        if let Some(group) = groups.get(&spec.name) {
            if patterns != group.pattern_sources() {
                tracing::debug!(group = %spec.name, "patterns ignored for existing group");
            }
            group.push_spec(spec);
            return Ok((Arc::clone(group), false));
        }

        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let re = Regex::new(pattern).map_err(|e| RouterError::Pattern {
                pattern: pattern.clone(),
                source: Box::new(e),
            })?;
            compiled.push(re);
        }

        let name = spec.name.clone();
        let group = Arc::new(SignalGroup::new(
            name.clone(),
            compiled,
            patterns.to_vec(),
            spec,
        ));
        groups.insert(name, Arc::clone(&group));
        Ok((group, true))
    }

    /// All specs from every group with at least one pattern matching `ticker`
    ///
    /// Group granularity: a single pattern match pulls in the whole group.
    /// Iteration order is unspecified.
    pub fn lookup(&self, ticker: &str) -> Vec<SignalSpec> {
        let groups = self.groups.read();
        let mut out = Vec::new();
        for group in groups.values() {
            if group.matches(ticker) {
                out.extend(group.specs());
            }
        }
        out
    }

    pub fn get(&self, name: &str) -> Option<Arc<SignalGroup>> {
        self.groups.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }
}
