use anyhow::{Context, Result};
use clap::Parser;
use imagepool::category::CategoryRegistry;
use imagepool::config::{Cli, Command};
use imagepool::config_validator::ConfigValidator;
use imagepool::redis_store::RedisStore;
use imagepool::seed::seed_category;
use imagepool::server::Server;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = cli.config;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("imagepool={},tower_http=debug", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = config.settings();
    ConfigValidator::validate(&config.redis_url, &settings).context("Invalid configuration")?;

    let store = RedisStore::new(&config.redis_url, config.connect_timeout())
        .context("Failed to create Redis client")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!("Starting imagepool service");
            tracing::info!(
                "Configuration: bind_addr={}, redis_url={}",
                config.bind_addr,
                config.redis_url
            );

            let server = Server::new(config, Arc::new(store))
                .await
                .context("Failed to connect to the backing store")?;
            server.run().await.context("Server error")?;
        }
        Command::Seed(args) => {
            let contents = tokio::fs::read_to_string(&args.file)
                .await
                .with_context(|| format!("Failed to read {}", args.file.display()))?;
            let report = seed_category(&store, &CategoryRegistry::default(), &args.category, &contents)
                .await
                .context("Seeding failed")?;
            tracing::info!(
                parsed = report.parsed,
                skipped = report.skipped,
                added = report.added,
                "Seeded category {}",
                args.category
            );
        }
    }

    Ok(())
}
