//! Signal definitions and rule evaluation
//!
//! A signal is a named rule with risk parameters attached. Rules are opaque
//! to the router: they see either a watcher snapshot or a live trade and
//! answer yes or no.

mod rules;

pub use rules::{RuleDef, SignalDef};

use crate::feed::{TickerSnapshot, Trade};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What drives a signal's evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Evaluated when the watcher polls computed state for a matching ticker
    #[default]
    OnPoll,
    /// Evaluated against every live trade delivered to the group
    OnTrade,
}

/// The input a rule is evaluated against
#[derive(Debug, Clone, Copy)]
pub enum Observation<'a> {
    /// Watcher-computed per-ticker state
    Snapshot(&'a TickerSnapshot),
    /// A live trade event
    Trade(&'a Trade),
}

/// An evaluable condition
///
/// Implementations must tolerate concurrent calls; the router evaluates
/// rules from several tasks at once.
pub trait Rule: Send + Sync {
    fn evaluate(&self, obs: Observation<'_>) -> bool;
}

/// Risk parameters attached to a signal, carried into notifications
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskParams {
    /// Stop-loss as a signed fraction (e.g., -0.02)
    pub stop_loss: Decimal,
    /// Take-profit as a fraction (e.g., 0.04)
    pub take_profit: Decimal,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            stop_loss: dec!(-0.02),
            take_profit: dec!(0.04),
        }
    }
}

/// A named signal: an evaluable rule plus its risk parameters
///
/// Several specs may share one name; they form a group whose ticker patterns
/// are fixed by the first registration.
#[derive(Clone)]
pub struct SignalSpec {
    /// Signal name (group key)
    pub name: String,
    /// What drives evaluation
    pub trigger: Trigger,
    /// The condition to evaluate
    pub rule: Arc<dyn Rule>,
    /// Risk parameters
    pub risk: RiskParams,
}

impl SignalSpec {
    pub fn new(
        name: impl Into<String>,
        trigger: Trigger,
        rule: Arc<dyn Rule>,
        risk: RiskParams,
    ) -> Self {
        Self {
            name: name.into(),
            trigger,
            rule,
            risk,
        }
    }

    /// Whether this spec is evaluated on live trades
    pub fn is_on_trade(&self) -> bool {
        self.trigger == Trigger::OnTrade
    }
}

impl fmt::Debug for SignalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalSpec")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("risk", &self.risk)
            .finish_non_exhaustive()
    }
}
