//! Import JetStream processor
//!
//! Wraps spreadsheet imports with JetStream for:
//! - Persistence across restarts
//! - Real-time progress updates
//! - One job at a time, so at most one row insert is in flight
//!
//! A job is acked before its final status goes out, and progress reports
//! double as in-progress acks, so JetStream never hands a job that is
//! still running (or already imported) to the consumer again.
//!
//! ## Streams
//! - `SIMOLA_IMPORT_JOBS` - report and feedback imports

use std::sync::Arc;
use std::time::{Duration, Instant};
use anyhow::{Context, Result};
use async_nats::Client;
use async_nats::jetstream::{self, AckKind, Context as JsContext};
use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, info, warn, error};
use uuid::Uuid;

use crate::services::import::{
    normalize_feedback, normalize_report, read_upload, run_batch, workbook,
    BatchProgress, PgFeedbackCreator, PgReportCreator, ProgressSink, RawRow,
};
use crate::db::queries;
use crate::services::job_history::JOB_HISTORY;
use crate::types::{
    ImportBatchResult, ImportFileRequest, ImportJobStatus, ImportJobStatusUpdate,
    ImportJobSubmitResponse, ImportKind, QueuedImportJob,
};

// Stream and consumer names
const STREAM_NAME: &str = "SIMOLA_IMPORT_JOBS";
const CONSUMER_NAME: &str = "import_workers";
const SUBJECT: &str = "simola.jobs.import";
const STATUS_PREFIX: &str = "simola.job.import.status";

/// Redelivery deadline; every progress report pushes it back
const ACK_WAIT: Duration = Duration::from_secs(60);

/// Run already parsed rows through the importer for `kind`.
///
/// Shared by the queue consumer and the `import` CLI command.
pub async fn import_rows(
    pool: &PgPool,
    kind: ImportKind,
    user_id: Option<Uuid>,
    rows: &[RawRow],
    progress: Option<&dyn ProgressSink>,
) -> ImportBatchResult {
    match kind {
        ImportKind::Report => {
            let creator = PgReportCreator::new(pool.clone());
            run_batch(rows, normalize_report, &creator, progress).await
        }
        ImportKind::Feedback => {
            // feedback.user_id references profiles, which token users may lack
            let owner = match queries::profile::existing_profile_id(pool, user_id).await {
                Ok(owner) => owner,
                Err(e) => {
                    warn!("Failed to look up importer profile: {}", e);
                    None
                }
            };
            if owner.is_none() {
                if let Some(user_id) = user_id {
                    debug!("User {} has no profile, imported feedback stays unattributed", user_id);
                }
            }
            let creator = PgFeedbackCreator::new(pool.clone(), owner);
            run_batch(rows, normalize_feedback, &creator, progress).await
        }
    }
}

/// Decode the base64 file body of an upload
pub fn decode_file(request: &ImportFileRequest) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(request.file_base64.trim())
        .context("File bukan base64 yang valid")
}

/// Acknowledgement side of a queued job
#[async_trait]
pub trait JobAck: Send + Sync {
    /// Push the redelivery deadline back while the job is still running
    async fn heartbeat(&self) -> Result<()>;
    /// Remove the job from the queue for good
    async fn complete(&self) -> Result<()>;
}

#[async_trait]
impl JobAck for jetstream::Message {
    async fn heartbeat(&self) -> Result<()> {
        self.ack_with(AckKind::Progress).await.map_err(|e| anyhow::anyhow!("{}", e))
    }

    async fn complete(&self) -> Result<()> {
        self.ack().await.map_err(|e| anyhow::anyhow!("{}", e))
    }
}

/// Destination of job status updates
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(&self, job_id: Uuid, status: ImportJobStatus) -> Result<()>;
}

/// Ack the job, then announce its final status. A failed publish leaves
/// the job acked.
async fn finish_job(publisher: &dyn StatusPublisher, ack: &dyn JobAck, job_id: Uuid, status: ImportJobStatus) {
    if let Err(e) = ack.complete().await {
        error!("Failed to ack import job {}: {}", job_id, e);
    }
    if let Err(e) = publisher.publish(job_id, status).await {
        warn!("Failed to publish final status for import job {}: {}", job_id, e);
    }
}

/// Import job processor with JetStream integration
pub struct ImportProcessor {
    client: Client,
    js: JsContext,
    pool: PgPool,
    max_file_bytes: usize,
}

impl ImportProcessor {
    /// Create a new import processor, initializing JetStream stream
    pub async fn new(client: Client, pool: PgPool, max_file_bytes: usize) -> Result<Self> {
        let js = jetstream::new(client.clone());

        let stream_config = jetstream::stream::Config {
            name: STREAM_NAME.to_string(),
            subjects: vec![format!("{}.*", SUBJECT)], // simola.jobs.import.*
            max_messages: 1_000,
            max_bytes: 200 * 1024 * 1024, // base64 spreadsheets
            retention: jetstream::stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        };
        js.get_or_create_stream(stream_config).await?;
        info!("JetStream import stream '{}' ready", STREAM_NAME);

        Ok(Self {
            client,
            js,
            pool,
            max_file_bytes,
        })
    }

    /// Submit an import job to the queue
    ///
    /// The file name and encoding are checked here so obviously wrong
    /// uploads are rejected before they are queued.
    pub async fn submit_job(&self, user_id: Uuid, request: ImportFileRequest) -> Result<ImportJobSubmitResponse> {
        if !workbook::accepts_filename(&request.filename) {
            anyhow::bail!(
                "Format file tidak didukung ({}). Gunakan file .xlsx atau .xls",
                request.filename
            );
        }
        let size = decode_file(&request)?.len();
        if size > self.max_file_bytes {
            anyhow::bail!("Ukuran file {} byte melebihi batas {} byte", size, self.max_file_bytes);
        }

        let kind = request.kind;
        let job = QueuedImportJob::new(user_id, request);
        let job_id = job.id;

        let subject = format!("{}.{}", SUBJECT, kind.as_str());
        let payload = serde_json::to_vec(&job)?;
        self.js.publish(subject, payload.into()).await?.await?;

        info!("Import job {} submitted: {} ({} bytes)", job_id, kind.as_str(), size);

        self.publish_status(job_id, ImportJobStatus::Queued { position: 1 }).await?;

        Ok(ImportJobSubmitResponse {
            job_id,
            kind,
            message: "Import job submitted".to_string(),
        })
    }

    /// Publish an import job status update
    pub async fn publish_status(&self, job_id: Uuid, status: ImportJobStatus) -> Result<()> {
        let update = ImportJobStatusUpdate::new(job_id, status);
        let subject = format!("{}.{}", STATUS_PREFIX, job_id);
        let payload = serde_json::to_vec(&update)?;

        self.client.publish(subject, payload.into()).await?;
        Ok(())
    }

    /// Start processing import jobs from the queue
    pub async fn start_processing(self: Arc<Self>) -> Result<()> {
        let stream = self.js.get_stream(STREAM_NAME).await?;

        let consumer_config = jetstream::consumer::pull::Config {
            durable_name: Some(CONSUMER_NAME.to_string()),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            max_deliver: 3,
            ack_wait: ACK_WAIT,
            filter_subject: format!("{}.>", SUBJECT),
            ..Default::default()
        };

        let consumer = stream.get_or_create_consumer(CONSUMER_NAME, consumer_config).await?;
        info!("JetStream import consumer '{}' ready", CONSUMER_NAME);

        let mut messages = consumer.messages().await?;

        while let Some(msg) = messages.next().await {
            match msg {
                Ok(msg) => {
                    // Sequential: one job, one row insert at a time
                    if let Err(e) = self.process_job(msg).await {
                        error!("Failed to process import job: {}", e);
                    }
                }
                Err(e) => {
                    error!("Error receiving import message: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Process a single import job
    async fn process_job(&self, msg: jetstream::Message) -> Result<()> {
        let start_time = Instant::now();
        let started_at = Utc::now();
        let job: QueuedImportJob = match serde_json::from_slice(&msg.payload) {
            Ok(job) => job,
            Err(e) => {
                // Unreadable payloads will not get better on redelivery
                if let Err(ack_err) = msg.complete().await {
                    error!("Failed to ack malformed import job: {}", ack_err);
                }
                return Err(e.into());
            }
        };
        let job_id = job.id;
        let kind = job.request.kind;

        info!("Processing import job {} ({}, {})", job_id, kind.as_str(), job.request.filename);

        if let Err(e) = self.publish_status(job_id, ImportJobStatus::Parsing).await {
            warn!("Failed to publish parsing status for import job {}: {}", job_id, e);
        }

        let rows = decode_file(&job.request)
            .and_then(|bytes| {
                read_upload(&job.request.filename, bytes, self.max_file_bytes).map_err(anyhow::Error::from)
            });

        let final_status = match rows {
            Ok(rows) => {
                let sink = StatusSink { publisher: self, ack: &msg, job_id };
                let result = import_rows(&self.pool, kind, Some(job.user_id), &rows, Some(&sink)).await;
                let duration_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX);

                info!(
                    "Import job {} completed in {}ms: {} succeeded, {} failed",
                    job_id, duration_ms, result.success, result.failed
                );

                JOB_HISTORY.record_completed(&job, started_at, result.clone());

                ImportJobStatus::Completed {
                    success: result.success,
                    failed: result.failed,
                    errors: result.errors,
                    duration_ms,
                }
            }
            Err(e) => {
                // Batch-fatal: the file could not be read, no row was processed.
                // Acked like any other job; a broken file will not parse on redelivery either.
                warn!("Import job {} failed: {}", job_id, e);

                JOB_HISTORY.record_failed(&job, started_at, e.to_string());

                ImportJobStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        finish_job(self, &msg, job_id, final_status).await;

        Ok(())
    }
}

#[async_trait]
impl StatusPublisher for ImportProcessor {
    async fn publish(&self, job_id: Uuid, status: ImportJobStatus) -> Result<()> {
        self.publish_status(job_id, status).await
    }
}

/// Forwards batch progress as `Importing` status updates and keeps the
/// job's ack deadline moving
struct StatusSink<'a> {
    publisher: &'a dyn StatusPublisher,
    ack: &'a dyn JobAck,
    job_id: Uuid,
}

#[async_trait]
impl ProgressSink for StatusSink<'_> {
    async fn report(&self, progress: BatchProgress) {
        if let Err(e) = self.ack.heartbeat().await {
            warn!("Failed to extend ack deadline for import job {}: {}", self.job_id, e);
        }

        let status = ImportJobStatus::Importing {
            processed: progress.processed,
            total: progress.total,
            succeeded: progress.succeeded,
            failed: progress.failed,
        };
        if let Err(e) = self.publisher.publish(self.job_id, status).await {
            warn!("Failed to publish progress for import job {}: {}", self.job_id, e);
        }
    }
}

// ==========================================================================
// Tests
// ==========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::import::{template_for, CreateError, CreatedRecord, RecordCreator};
    use crate::types::{ImportKind, ImportedReport};
    use parking_lot::Mutex;

    type Events = Arc<Mutex<Vec<String>>>;

    struct FakeAck {
        events: Events,
    }

    #[async_trait]
    impl JobAck for FakeAck {
        async fn heartbeat(&self) -> Result<()> {
            self.events.lock().push("heartbeat".to_string());
            Ok(())
        }

        async fn complete(&self) -> Result<()> {
            self.events.lock().push("ack".to_string());
            Ok(())
        }
    }

    struct FakePublisher {
        events: Events,
        fail: bool,
    }

    #[async_trait]
    impl StatusPublisher for FakePublisher {
        async fn publish(&self, _job_id: Uuid, status: ImportJobStatus) -> Result<()> {
            let label = match status {
                ImportJobStatus::Importing { processed, .. } => format!("importing {}", processed),
                ImportJobStatus::Completed { .. } => "completed".to_string(),
                ImportJobStatus::Failed { .. } => "failed".to_string(),
                _ => "other".to_string(),
            };
            self.events.lock().push(label);
            if self.fail {
                anyhow::bail!("no responders");
            }
            Ok(())
        }
    }

    struct AcceptAll;

    #[async_trait]
    impl RecordCreator<ImportedReport> for AcceptAll {
        async fn create(&self, _record: &ImportedReport) -> Result<CreatedRecord, CreateError> {
            Ok(CreatedRecord { id: Uuid::new_v4(), reference: None })
        }
    }

    fn upload(file_base64: &str) -> ImportFileRequest {
        ImportFileRequest {
            kind: ImportKind::Report,
            filename: "laporan.xlsx".to_string(),
            file_base64: file_base64.to_string(),
        }
    }

    #[test]
    fn test_stream_names() {
        assert_eq!(STREAM_NAME, "SIMOLA_IMPORT_JOBS");
        assert!(SUBJECT.starts_with("simola.jobs.import"));
        assert!(STATUS_PREFIX.starts_with("simola.job.import.status"));
    }

    #[test]
    fn test_decode_file_accepts_padded_base64() {
        let bytes = decode_file(&upload(" UEsDBA== ")).unwrap();
        assert_eq!(bytes, vec![0x50, 0x4b, 0x03, 0x04]);
    }

    #[test]
    fn test_decode_file_rejects_garbage() {
        assert!(decode_file(&upload("not base64 at all!")).is_err());
    }

    #[tokio::test]
    async fn test_job_is_acked_before_final_status() {
        let events = Events::default();
        let ack = FakeAck { events: events.clone() };
        let publisher = FakePublisher { events: events.clone(), fail: false };

        finish_job(&publisher, &ack, Uuid::new_v4(), ImportJobStatus::Failed { error: "x".to_string() }).await;

        assert_eq!(*events.lock(), vec!["ack", "failed"]);
    }

    #[tokio::test]
    async fn test_failed_status_publish_still_acks() {
        let events = Events::default();
        let ack = FakeAck { events: events.clone() };
        let publisher = FakePublisher { events: events.clone(), fail: true };
        let status = ImportJobStatus::Completed { success: 3, failed: 0, errors: vec![], duration_ms: 12 };

        finish_job(&publisher, &ack, Uuid::new_v4(), status).await;

        assert!(events.lock().contains(&"ack".to_string()));
    }

    #[tokio::test]
    async fn test_progress_reports_extend_ack_deadline() {
        let events = Events::default();
        let ack = FakeAck { events: events.clone() };
        let publisher = FakePublisher { events: events.clone(), fail: false };
        let sink = StatusSink { publisher: &publisher, ack: &ack, job_id: Uuid::new_v4() };
        let row = template_for(ImportKind::Report).raw_rows().remove(0);
        let rows = vec![row; 23];

        let result = run_batch(&rows, normalize_report, &AcceptAll, Some(&sink)).await;

        assert_eq!(result.success, 23);
        assert_eq!(
            *events.lock(),
            vec!["heartbeat", "importing 10", "heartbeat", "importing 20", "heartbeat", "importing 23"]
        );
    }

    // Needs DATABASE_URL pointing at a scratch Postgres
    #[tokio::test]
    #[ignore]
    async fn test_feedback_import_by_user_without_profile() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = crate::db::create_pool(&url).await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        let rows = template_for(ImportKind::Feedback).raw_rows();

        let result = import_rows(&pool, ImportKind::Feedback, Some(Uuid::new_v4()), &rows, None).await;

        assert_eq!(result.failed, 0, "{:?}", result.errors);
        assert_eq!(result.success as usize, rows.len());
    }
}
