use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use estate_db::PgStore;
use estate_worker::cli::{Cli, Command};
use estate_worker::commands;
use estate_worker::config::{LogFormat, WorkerConfig, DEFAULT_LOG_FILTER};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // --- Configuration ---
    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;

    // --- Tracing ---
    // Logs go to stderr; stdout carries the JSON report.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    // --- Database ---
    let pool = estate_db::create_pool(&config.database_url, config.max_connections)
        .await
        .context("Failed to connect to database")?;
    tracing::info!(max_connections = config.max_connections, "Database connection pool created");

    estate_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    estate_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    let store = PgStore::new(pool);

    // --- Command ---
    let report = match &cli.command {
        Command::Import(args) => {
            serde_json::to_string_pretty(&commands::import(&store, args, &config).await?)?
        }
        Command::Reconcile => serde_json::to_string_pretty(&commands::reconcile(&store).await)?,
    };
    println!("{report}");

    Ok(())
}
