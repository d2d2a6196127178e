use clap::Parser;
use signal_router::cli::{Cli, Commands};
use signal_router::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        toml::from_str(include_str!("../config.toml.example")).expect("Invalid default config")
    });

    // Initialize telemetry
    signal_router::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting signal router");
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Bus: channel capacity {}", config.bus.channel_capacity);
            println!("  Dispatch: max in-flight {}", config.router.max_inflight);
            println!(
                "  Subscription: {} attempts/round, {} rounds max",
                config.subscription.attempts_per_round, config.subscription.max_rounds
            );
            println!("  Signals: {}", config.signals.len());
        }
    }

    Ok(())
}
