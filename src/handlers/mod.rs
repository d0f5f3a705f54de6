//! NATS message handlers

pub mod feedback;
pub mod import;
pub mod jobs;
pub mod ping;
pub mod profile;
pub mod report;

use std::sync::Arc;
use anyhow::Result;
use async_nats::Client;
use futures::future::select_all;
use sqlx::PgPool;
use tracing::{info, error};
use tokio::select;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::services::import_processor::ImportProcessor;

/// Start all message handlers
///
/// Returns once any handler task stops; the process is expected to exit then.
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let jwt_secret = Arc::new(config.jwt_secret.clone());

    // Subscribe to the subjects served directly from here
    let ping_sub = client.subscribe("simola.ping").await?;
    let template_sub = client.subscribe("simola.import.template").await?;
    let job_history_sub = client.subscribe("simola.jobs.history").await?;
    let import_submit_sub = client.subscribe("simola.import.submit").await?;

    // Record handlers spawn one task per subject
    let mut record_handles = report::start_handlers(client.clone(), pool.clone(), Arc::clone(&jwt_secret)).await?;
    record_handles.extend(feedback::start_handlers(client.clone(), pool.clone(), Arc::clone(&jwt_secret)).await?);
    record_handles.extend(profile::start_handlers(client.clone(), pool.clone(), Arc::clone(&jwt_secret)).await?);

    let client_ping = client.clone();
    let pool_ping = pool.clone();
    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub, pool_ping).await
    });

    let client_template = client.clone();
    let jwt_secret_template = Arc::clone(&jwt_secret);
    let template_handle = tokio::spawn(async move {
        import::handle_template(client_template, template_sub, jwt_secret_template).await
    });

    let client_job_history = client.clone();
    let jwt_secret_job_history = Arc::clone(&jwt_secret);
    let job_history_handle = tokio::spawn(async move {
        jobs::handle_job_history(client_job_history, job_history_sub, jwt_secret_job_history).await
    });

    // Spreadsheet import: submit handler and queue consumer live and die together
    let client_import = client.clone();
    let pool_import = pool.clone();
    let jwt_secret_import = Arc::clone(&jwt_secret);
    let max_file_bytes = config.import_max_file_bytes;
    let import_handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        let processor = Arc::new(ImportProcessor::new(client_import.clone(), pool_import, max_file_bytes).await?);
        info!("Import processor started");

        let submit = import::handle_import_submit(client_import, import_submit_sub, Arc::clone(&processor), jwt_secret_import);
        select! {
            result = submit => result,
            result = processor.start_processing() => result,
        }
    });

    info!("All handlers started, waiting for messages...");

    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = template_handle => {
            error!("Import template handler finished: {:?}", result);
        }
        result = job_history_handle => {
            error!("Job history handler finished: {:?}", result);
        }
        (result, index, _) = select_all(record_handles) => {
            error!("Record handler #{} finished: {:?}", index, result);
        }
        result = import_handle => {
            error!("Import processor finished: {:?}", result);
        }
    }

    Ok(())
}
