//! SIMOLA 110 Worker - Backend service for the call-center dashboard
//!
//! This worker connects to NATS and handles messages from the frontend.

mod auth;
mod cli;
mod config;
mod db;
mod handlers;
mod services;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::cli::{Cli, Command};
use crate::services::import::{read_upload, template_for};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logs_dir = config::logs_dir();
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        &logs_dir,
        "worker.log",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,simola_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())  // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))  // file
        .init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Migrate => {
            let config = config::Config::from_env()?;
            let pool = db::create_pool(&config.database_url).await?;
            db::run_migrations(&pool).await
        }
        Command::Template { kind, output } => {
            let template = template_for(kind);
            let path = output.unwrap_or_else(|| template.filename.into());
            std::fs::write(&path, template.to_xlsx()?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Template written to {}", path.display());
            Ok(())
        }
        Command::Import { kind, user, file } => {
            let config = config::Config::from_env()?;
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let filename = file.to_string_lossy();

            // A file that cannot be parsed fails the whole batch before any insert
            let rows = read_upload(&filename, bytes, config.import_max_file_bytes)?;

            let pool = db::create_pool(&config.database_url).await?;
            let result = services::import_processor::import_rows(&pool, kind, user, &rows, None).await;

            println!("{}", result.summary());
            println!("Berhasil: {}, Gagal: {}", result.success, result.failed);
            for message in &result.errors {
                println!("  {}", message);
            }
            Ok(())
        }
    }
}

async fn serve() -> Result<()> {
    info!("Starting SIMOLA Worker...");

    let config = config::Config::from_env()?;
    info!("Configuration loaded (logs in {})", config.logs_dir);

    let pool = db::create_pool(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    db::run_migrations(&pool).await?;

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (&config.nats_user, &config.nats_password) {
        (Some(user), Some(password)) => {
            async_nats::ConnectOptions::new()
                .user_and_password(user.clone(), password.clone())
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    let handler_result = handlers::start_handlers(nats_client, pool, &config).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}
