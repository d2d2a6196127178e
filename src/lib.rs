//! signal-router: real-time signal evaluation router for market events
//!
//! This library provides the core components for:
//! - A concurrent registry of named signals with regex ticker routing
//! - Poll-driven evaluation of watcher-computed market state
//! - Trade-driven evaluation with one consumer task per signal group
//! - A retrying subscription handshake toward the streaming peer
//! - Notification dispatch to a downstream notifier
//! - Structured logging and Prometheus metrics

pub mod bus;
pub mod cli;
pub mod config;
pub mod feed;
pub mod router;
pub mod strategy;
pub mod telemetry;
