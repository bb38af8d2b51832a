use std::net::SocketAddr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kinnect_config::load as load_config;
use kinnect_gateway::{create_router, GatewayState};
use kinnect_runtime::{telemetry, BackendServices};
use tokio::net::TcpListener;
use tracing::info;

mod seed;

#[derive(Parser)]
#[command(name = "kinnect-server")]
#[command(about = "Kinnect family network backend (serves HTTP by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Fill an empty database with demo users, a family, an event and a post
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::Migrate => migrate().await,
        Commands::Seed => seed_data().await,
    }
}

async fn run_server() -> anyhow::Result<()> {
    info!("starting Kinnect backend");

    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let address = format!("{}:{}", config.http.address, config.http.port);
    let state = GatewayState::new(services.db_pool.clone(), config, services.store);
    let app = create_router(state);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(kinnect_runtime::shutdown_signal())
    .await
    .context("http server error")?;

    services.db_pool.close().await;
    info!("backend shut down");
    Ok(())
}

async fn migrate() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(&services.db_pool)
        .await
        .context("failed to read migration history")?;

    println!("Database is up to date ({applied} migrations applied)");
    Ok(())
}

async fn seed_data() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    match seed::seed_demo_data(&services.db_pool, services.store, &config).await? {
        Some(report) => {
            println!("Database seeded with demo data:");
            println!("- {} users (password: {})", report.users, seed::DEMO_PASSWORD);
            println!("- {} families", report.families);
            println!("- {} events", report.events);
            println!("- {} posts", report.posts);
        }
        None => println!("Database already has users; nothing seeded"),
    }
    Ok(())
}
