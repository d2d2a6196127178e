//! Built-in rule definitions
//!
//! Signals are usually defined as data (JSON files or `[[signals]]` config
//! tables) rather than code; `RuleDef` covers the conditions those
//! definitions can express.

use super::{Observation, RiskParams, Rule, SignalSpec, Trigger};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A rule expressed as data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleDef {
    /// Price at or above a level
    PriceAbove { level: Decimal },
    /// Price at or below a level
    PriceBelow { level: Decimal },
    /// Last candle moved at least `min_pct` close-over-open (fraction)
    ChangePct { min_pct: Decimal },
}

impl RuleDef {
    fn price_of(obs: &Observation<'_>) -> Decimal {
        match obs {
            Observation::Snapshot(snapshot) => snapshot.price,
            Observation::Trade(trade) => trade.price,
        }
    }
}

impl Rule for RuleDef {
    fn evaluate(&self, obs: Observation<'_>) -> bool {
        match self {
            RuleDef::PriceAbove { level } => Self::price_of(&obs) >= *level,
            RuleDef::PriceBelow { level } => Self::price_of(&obs) <= *level,
            RuleDef::ChangePct { min_pct } => {
                // Candle data only arrives on the poll path
                let Observation::Snapshot(snapshot) = obs else {
                    return false;
                };
                match &snapshot.candle {
                    Some(candle) if !candle.open.is_zero() => {
                        (candle.close - candle.open) / candle.open >= *min_pct
                    }
                    _ => false,
                }
            }
        }
    }
}

/// A signal definition as found in config files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalDef {
    /// Signal name (group key)
    pub name: String,
    /// Ticker patterns; only the first registration for a name sets them
    pub patterns: Vec<String>,
    /// What drives evaluation
    #[serde(default)]
    pub trigger: Trigger,
    /// The condition
    pub rule: RuleDef,
    /// Risk parameters
    #[serde(default)]
    pub risk: RiskParams,
}

impl SignalDef {
    /// Parse a definition from raw JSON, as stored in a signals directory
    pub fn from_json(raw: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Build the registrable spec
    pub fn to_spec(&self) -> SignalSpec {
        SignalSpec::new(
            self.name.clone(),
            self.trigger,
            Arc::new(self.rule.clone()),
            self.risk,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{Candle, TickerSnapshot, Trade};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn snapshot(price: Decimal, candle: Option<Candle>) -> TickerSnapshot {
        TickerSnapshot {
            ticker: "BTCUSDT".to_string(),
            price,
            candle,
            taken_at: Utc::now(),
        }
    }

    fn candle(open: Decimal, close: Decimal) -> Candle {
        Candle {
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: dec!(1),
            close_time: Utc::now(),
        }
    }

    #[test]
    fn test_price_above() {
        let rule = RuleDef::PriceAbove { level: dec!(100) };
        assert!(rule.evaluate(Observation::Snapshot(&snapshot(dec!(101), None))));
        assert!(rule.evaluate(Observation::Snapshot(&snapshot(dec!(100), None))));
        assert!(!rule.evaluate(Observation::Snapshot(&snapshot(dec!(99), None))));
    }

    #[test]
    fn test_price_below_on_trade() {
        let rule = RuleDef::PriceBelow { level: dec!(50) };
        let trade = Trade {
            ticker: "ETHUSDT".to_string(),
            price: dec!(49.5),
            quantity: dec!(2),
            time: Utc::now(),
        };
        assert!(rule.evaluate(Observation::Trade(&trade)));
    }

    #[test]
    fn test_change_pct_needs_candle() {
        let rule = RuleDef::ChangePct { min_pct: dec!(0.01) };
        assert!(!rule.evaluate(Observation::Snapshot(&snapshot(dec!(100), None))));

        let moved = snapshot(dec!(102), Some(candle(dec!(100), dec!(102))));
        assert!(rule.evaluate(Observation::Snapshot(&moved)));

        let flat = snapshot(dec!(100.5), Some(candle(dec!(100), dec!(100.5))));
        assert!(!rule.evaluate(Observation::Snapshot(&flat)));
    }

    #[test]
    fn test_signal_def_from_json() {
        let raw = br#"{
            "name": "btc-breakout",
            "patterns": ["^BTC[A-Z]+$"],
            "trigger": "on_trade",
            "rule": { "kind": "price_above", "level": "100000" },
            "risk": { "stop_loss": "-0.02", "take_profit": "0.04" }
        }"#;

        let def = SignalDef::from_json(raw).unwrap();
        assert_eq!(def.name, "btc-breakout");
        assert_eq!(def.trigger, Trigger::OnTrade);
        assert_eq!(def.rule, RuleDef::PriceAbove { level: dec!(100000) });

        let spec = def.to_spec();
        assert!(spec.is_on_trade());
        assert_eq!(spec.risk.take_profit, dec!(0.04));
    }

    #[test]
    fn test_signal_def_defaults() {
        let raw = br#"{
            "name": "dip",
            "patterns": ["USDT$"],
            "rule": { "kind": "price_below", "level": "10" }
        }"#;

        let def = SignalDef::from_json(raw).unwrap();
        assert_eq!(def.trigger, Trigger::OnPoll);
        assert_eq!(def.risk.stop_loss, RiskParams::default().stop_loss);
    }

    #[test]
    fn test_signal_def_rejects_bad_json() {
        assert!(SignalDef::from_json(b"not json").is_err());
    }
}
