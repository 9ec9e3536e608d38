// Main entry point for the harvest server

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use harvest_server::{
    kernel::{start_scheduler, ServerDeps},
    server::build_app,
    Config,
};
use harvester::PostgresStore;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "harvest-server")]
#[command(about = "Trade-show event harvester", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API and run the harvest on schedule (default)
    Serve,
    /// Run a single harvest, print the per-source results as JSON and exit
    RunOnce,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,harvester=debug,harvest_server=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    let store = PostgresStore::from_pool(pool);
    store.run_migrations().await.context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let deps = ServerDeps::new(Arc::new(store), config.harvest.clone())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::RunOnce => run_once(&deps).await,
        Command::Serve => serve(deps, &config).await,
    }
}

async fn run_once(deps: &ServerDeps) -> Result<()> {
    tracing::info!(sources = ?deps.orchestrator.sources(), "Running a single harvest");
    let results = deps.orchestrator.run().await;
    println!(
        "{}",
        serde_json::to_string_pretty(&results).context("Failed to serialize results")?
    );
    Ok(())
}

async fn serve(deps: ServerDeps, config: &Config) -> Result<()> {
    let mut scheduler = start_scheduler(&deps, &config.harvest_schedule)
        .await
        .context("Failed to start scheduler")?;

    let orchestrator = deps.orchestrator.clone();
    let app = build_app(deps);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested, cancelling running sources");
            orchestrator.cancel_all();
        })
        .await
        .context("Server error")?;

    scheduler.shutdown().await.context("Failed to stop scheduler")?;
    Ok(())
}
