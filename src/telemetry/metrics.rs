//! Router metrics

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Watcher snapshots routed through pattern lookup
    SnapshotsRouted,
    /// Trade events drained from group channels
    TradesConsumed,
    /// Rule evaluations that matched
    RuleMatches,
    /// Notifications forwarded to the notifier peer
    NotificationsSent,
    /// Subscription handshake rounds that failed
    SubscriptionRetries,
    /// Subscriptions abandoned after exhausting the retry budget
    SubscriptionFailures,
}

impl CounterMetric {
    fn name(self) -> &'static str {
        match self {
            CounterMetric::SnapshotsRouted => "sigrouter_snapshots_routed_total",
            CounterMetric::TradesConsumed => "sigrouter_trades_consumed_total",
            CounterMetric::RuleMatches => "sigrouter_rule_matches_total",
            CounterMetric::NotificationsSent => "sigrouter_notifications_sent_total",
            CounterMetric::SubscriptionRetries => "sigrouter_subscription_retries_total",
            CounterMetric::SubscriptionFailures => "sigrouter_subscription_failures_total",
        }
    }
}

/// Increment a counter by one
pub fn count(metric: CounterMetric) {
    ::metrics::counter!(metric.name()).increment(1);
}
