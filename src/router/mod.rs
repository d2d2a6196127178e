//! Signal evaluation router
//!
//! Maintains the signal registry, matches inbound ticker and trade events
//! against each group's patterns, and dispatches matched evaluations to the
//! notifier peer.

mod engine;
mod registry;
mod subscription;
mod types;

pub use engine::{Router, RouterBuilder, RouterConfig};
pub use registry::{Registry, SignalGroup};
pub use subscription::{SubscriptionConfig, SubscriptionState};
pub use types::RouterError;
