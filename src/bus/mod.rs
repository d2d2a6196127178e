//! Message bus connecting the router to its peers
//!
//! Four channel edges: watcher → router (ticker snapshots), streamer → router
//! (group queries), router → streamer (subscription requests), and router →
//! notifier (triggered signals). The bus is constructed by the embedding
//! application and handed to every participant; receivers are take-once so
//! exactly one consumer drains each edge.

use crate::feed::{TickerSnapshot, Trade};
use crate::strategy::SignalSpec;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Default per-channel buffer size
const DEFAULT_CAPACITY: usize = 64;

/// Group record handed to the streamer peer on a successful query
#[derive(Debug, Clone)]
pub struct GroupHandle {
    /// Group name
    pub name: String,
    /// Ticker patterns fixed at first registration, in source form
    pub patterns: Vec<String>,
    /// Where matching trades should be delivered
    pub trades: mpsc::UnboundedSender<Trade>,
}

/// Streamer peer asks for a group record by name
///
/// On an unknown name the reply sender is dropped without a payload; the
/// requester applies its own timeout.
#[derive(Debug)]
pub struct GroupQuery {
    pub name: String,
    pub reply: oneshot::Sender<GroupHandle>,
}

/// Router asks the streamer peer to deliver trades for a group
#[derive(Debug)]
pub struct SubscribeRequest {
    pub name: String,
    pub patterns: Vec<String>,
    pub trades: mpsc::UnboundedSender<Trade>,
    /// Acknowledgement: true once delivery is in place
    pub reply: oneshot::Sender<bool>,
}

/// What triggered a notification
#[derive(Debug, Clone)]
pub enum TriggerContext {
    /// Poll-path match for the named ticker
    Poll { ticker: String },
    /// Trade-path match
    Trade(Trade),
}

/// A triggered signal forwarded to the notifier peer
#[derive(Debug, Clone)]
pub struct Notification {
    /// Unique notification identifier
    pub id: Uuid,
    /// The signal that fired
    pub spec: SignalSpec,
    /// What it fired on
    pub context: TriggerContext,
    /// When it fired
    pub time: DateTime<Utc>,
}

impl Notification {
    pub fn new(spec: SignalSpec, context: TriggerContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            spec,
            context,
            time: Utc::now(),
        }
    }

    /// Ticker the trigger applies to
    pub fn ticker(&self) -> &str {
        match &self.context {
            TriggerContext::Poll { ticker } => ticker,
            TriggerContext::Trade(trade) => &trade.ticker,
        }
    }
}

/// The message bus
#[derive(Debug)]
pub struct Bus {
    snapshot_tx: mpsc::Sender<TickerSnapshot>,
    snapshot_rx: Mutex<Option<mpsc::Receiver<TickerSnapshot>>>,
    query_tx: mpsc::Sender<GroupQuery>,
    query_rx: Mutex<Option<mpsc::Receiver<GroupQuery>>>,
    subscribe_tx: mpsc::Sender<SubscribeRequest>,
    subscribe_rx: Mutex<Option<mpsc::Receiver<SubscribeRequest>>>,
    notify_tx: mpsc::Sender<Notification>,
    notify_rx: Mutex<Option<mpsc::Receiver<Notification>>>,
}

impl Bus {
    /// Create a bus whose channels buffer up to `capacity` messages each
    pub fn new(capacity: usize) -> Self {
        let (snapshot_tx, snapshot_rx) = mpsc::channel(capacity);
        let (query_tx, query_rx) = mpsc::channel(capacity);
        let (subscribe_tx, subscribe_rx) = mpsc::channel(capacity);
        let (notify_tx, notify_rx) = mpsc::channel(capacity);
        Self {
            snapshot_tx,
            snapshot_rx: Mutex::new(Some(snapshot_rx)),
            query_tx,
            query_rx: Mutex::new(Some(query_rx)),
            subscribe_tx,
            subscribe_rx: Mutex::new(Some(subscribe_rx)),
            notify_tx,
            notify_rx: Mutex::new(Some(notify_rx)),
        }
    }

    /// Sender for watcher → router ticker snapshots
    pub fn snapshot_sender(&self) -> mpsc::Sender<TickerSnapshot> {
        self.snapshot_tx.clone()
    }

    /// Router-side receiver for ticker snapshots; yields once
    pub fn take_snapshot_receiver(&self) -> Option<mpsc::Receiver<TickerSnapshot>> {
        self.snapshot_rx.lock().take()
    }

    /// Sender for streamer → router group queries
    pub fn query_sender(&self) -> mpsc::Sender<GroupQuery> {
        self.query_tx.clone()
    }

    /// Router-side receiver for group queries; yields once
    pub fn take_query_receiver(&self) -> Option<mpsc::Receiver<GroupQuery>> {
        self.query_rx.lock().take()
    }

    /// Sender for router → streamer subscription requests
    pub fn subscribe_sender(&self) -> mpsc::Sender<SubscribeRequest> {
        self.subscribe_tx.clone()
    }

    /// Streamer-side receiver for subscription requests; yields once
    pub fn take_subscribe_receiver(&self) -> Option<mpsc::Receiver<SubscribeRequest>> {
        self.subscribe_rx.lock().take()
    }

    /// Sender for router → notifier notifications
    pub fn notification_sender(&self) -> mpsc::Sender<Notification> {
        self.notify_tx.clone()
    }

    /// Notifier-side receiver for notifications; yields once
    pub fn take_notification_receiver(&self) -> Option<mpsc::Receiver<Notification>> {
        self.notify_rx.lock().take()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
