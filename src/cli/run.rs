//! Run command implementation

use crate::bus::Bus;
use crate::config::Config;
use crate::router::Router;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Register configured signals and exit without serving
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let bus = Arc::new(Bus::new(config.bus.channel_capacity));
        let router = Router::builder()
            .bus(Arc::clone(&bus))
            .config(config.router_config())
            .build()?;

        for def in &config.signals {
            router.register(&def.patterns, def.to_spec())?;
            tracing::info!(signal = %def.name, trigger = ?def.trigger, "signal registered");
        }

        if self.dry_run {
            tracing::info!(groups = router.group_count(), "dry run complete");
            return Ok(());
        }

        router.connect();

        // Default notifier sink: structured log output. A deployment wires
        // alerting or order placement here instead.
        if let Some(mut notifications) = bus.take_notification_receiver() {
            tokio::spawn(async move {
                while let Some(notification) = notifications.recv().await {
                    tracing::info!(
                        id = %notification.id,
                        signal = %notification.spec.name,
                        ticker = notification.ticker(),
                        "signal triggered"
                    );
                }
            });
        }

        tracing::info!(
            groups = router.group_count(),
            "router connected, waiting for peers"
        );
        tokio::signal::ctrl_c().await?;
        tracing::info!("shutting down");
        Ok(())
    }
}
