//! Job history service
//!
//! Keeps the outcome of recent import jobs in memory, mirrored to a JSON
//! file under the logs directory so the history survives worker restarts.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config;
use crate::types::{ImportBatchResult, ImportKind, QueuedImportJob};

const MAX_HISTORY_SIZE: usize = 100;
const HISTORY_FILENAME: &str = "job-history.json";

/// How an import job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOutcome {
    /// Every row was attempted; the tally says how many made it
    Completed,
    /// The file could not be read, no row was attempted
    Failed,
}

/// One finished import job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHistoryEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: ImportKind,
    pub filename: String,
    pub outcome: JobOutcome,
    pub submitted_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tally: Option<ImportBatchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobHistoryEntry {
    fn finished(job: &QueuedImportJob, started_at: DateTime<Utc>, outcome: JobOutcome) -> Self {
        let completed_at = Utc::now();
        let duration_ms = u64::try_from((completed_at - started_at).num_milliseconds()).unwrap_or(0);

        Self {
            id: job.id,
            user_id: job.user_id,
            kind: job.request.kind,
            filename: job.request.filename.clone(),
            outcome,
            submitted_at: job.submitted_at,
            started_at,
            completed_at,
            duration_ms,
            tally: None,
            error: None,
        }
    }
}

/// Filters for a history read; all set filters must match
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub user_id: Option<Uuid>,
    pub kind: Option<ImportKind>,
    pub outcome: Option<JobOutcome>,
    pub limit: usize,
}

impl HistoryQuery {
    fn matches(&self, entry: &JobHistoryEntry) -> bool {
        self.user_id.map_or(true, |id| entry.user_id == id)
            && self.kind.map_or(true, |kind| entry.kind == kind)
            && self.outcome.map_or(true, |outcome| entry.outcome == outcome)
    }
}

/// Newest first; `total` counts every matching entry, not just the page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHistoryResponse {
    pub jobs: Vec<JobHistoryEntry>,
    pub total: usize,
}

/// Job history storage backed by an in-memory deque + JSON file on disk.
pub struct JobHistoryService {
    path: Option<PathBuf>,
    history: RwLock<VecDeque<JobHistoryEntry>>,
}

impl JobHistoryService {
    /// History persisted at `path`, loading whatever is already there
    pub fn open(path: PathBuf) -> Self {
        let mut deque = VecDeque::with_capacity(MAX_HISTORY_SIZE);
        if let Some(loaded) = load_from_disk(&path) {
            deque.extend(loaded.into_iter().take(MAX_HISTORY_SIZE));
            info!("Loaded {} job history entries from {}", deque.len(), path.display());
        }
        Self {
            path: Some(path),
            history: RwLock::new(deque),
        }
    }

    /// Empty history that is never written to disk
    #[cfg(test)]
    pub(crate) fn in_memory() -> Self {
        Self {
            path: None,
            history: RwLock::new(VecDeque::with_capacity(MAX_HISTORY_SIZE)),
        }
    }

    /// Record a job whose rows were all attempted
    pub fn record_completed(&self, job: &QueuedImportJob, started_at: DateTime<Utc>, tally: ImportBatchResult) {
        let mut entry = JobHistoryEntry::finished(job, started_at, JobOutcome::Completed);
        entry.tally = Some(tally);
        self.add_entry(entry);
    }

    /// Record a job that failed before any row was attempted
    pub fn record_failed(&self, job: &QueuedImportJob, started_at: DateTime<Utc>, error: String) {
        let mut entry = JobHistoryEntry::finished(job, started_at, JobOutcome::Failed);
        entry.error = Some(error);
        self.add_entry(entry);
    }

    fn add_entry(&self, entry: JobHistoryEntry) {
        let mut history = self.history.write();

        if history.len() >= MAX_HISTORY_SIZE {
            history.pop_back();
        }
        history.push_front(entry);

        if let Some(path) = &self.path {
            save_to_disk(path, &history);
        }
    }

    pub fn query(&self, query: &HistoryQuery) -> JobHistoryResponse {
        let history = self.history.read();
        let matching: Vec<&JobHistoryEntry> = history.iter().filter(|e| query.matches(e)).collect();

        JobHistoryResponse {
            total: matching.len(),
            jobs: matching.into_iter().take(query.limit).cloned().collect(),
        }
    }
}

fn load_from_disk(path: &Path) -> Option<Vec<JobHistoryEntry>> {
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<Vec<JobHistoryEntry>>(&content) {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!("Failed to parse job history file: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("Failed to read job history file: {}", e);
            None
        }
    }
}

fn save_to_disk(path: &Path, history: &VecDeque<JobHistoryEntry>) {
    if let Some(dir) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Failed to create job history directory: {}", e);
            return;
        }
    }
    match serde_json::to_string_pretty(history) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                warn!("Failed to write job history file: {}", e);
            }
        }
        Err(e) => warn!("Failed to serialize job history: {}", e),
    }
}

lazy_static::lazy_static! {
    pub static ref JOB_HISTORY: JobHistoryService =
        JobHistoryService::open(Path::new(&config::logs_dir()).join(HISTORY_FILENAME));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImportFileRequest;

    fn job(kind: ImportKind, user_id: Uuid) -> QueuedImportJob {
        QueuedImportJob::new(user_id, ImportFileRequest {
            kind,
            filename: "laporan_maret.xlsx".to_string(),
            file_base64: String::new(),
        })
    }

    fn all() -> HistoryQuery {
        HistoryQuery { limit: 200, ..Default::default() }
    }

    #[test]
    fn test_record_completed_keeps_tally() {
        let history = JobHistoryService::in_memory();
        let job = job(ImportKind::Report, Uuid::new_v4());
        let tally = ImportBatchResult { success: 10, failed: 2, errors: vec!["Baris 4: x".to_string()] };

        history.record_completed(&job, Utc::now() - chrono::Duration::seconds(5), tally.clone());

        let entries = history.query(&all()).jobs;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, job.id);
        assert_eq!(entries[0].outcome, JobOutcome::Completed);
        assert_eq!(entries[0].filename, "laporan_maret.xlsx");
        assert_eq!(entries[0].tally, Some(tally));
        assert!(entries[0].error.is_none());
        assert!(entries[0].duration_ms >= 5000);
    }

    #[test]
    fn test_record_failed_keeps_error() {
        let history = JobHistoryService::in_memory();
        history.record_failed(&job(ImportKind::Feedback, Uuid::new_v4()), Utc::now(), "File tidak dapat dibaca".to_string());

        let entries = history.query(&all()).jobs;
        assert_eq!(entries[0].outcome, JobOutcome::Failed);
        assert_eq!(entries[0].error.as_deref(), Some("File tidak dapat dibaca"));
        assert!(entries[0].tally.is_none());
    }

    #[test]
    fn test_history_limit_keeps_newest() {
        let history = JobHistoryService::in_memory();
        let user_id = Uuid::new_v4();
        let mut last = None;

        for _ in 0..150 {
            let job = job(ImportKind::Report, user_id);
            last = Some(job.id);
            history.record_completed(&job, Utc::now(), ImportBatchResult::default());
        }

        let response = history.query(&all());
        assert_eq!(response.total, MAX_HISTORY_SIZE);
        assert_eq!(response.jobs[0].id, last.unwrap());
    }

    #[test]
    fn test_query_filters_combine_and_total_counts_all_matches() {
        let history = JobHistoryService::in_memory();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();

        history.record_completed(&job(ImportKind::Report, user_a), Utc::now(), ImportBatchResult::default());
        history.record_failed(&job(ImportKind::Report, user_a), Utc::now(), "x".to_string());
        history.record_completed(&job(ImportKind::Feedback, user_a), Utc::now(), ImportBatchResult::default());
        history.record_completed(&job(ImportKind::Report, user_b), Utc::now(), ImportBatchResult::default());

        let query = HistoryQuery {
            user_id: Some(user_a),
            kind: Some(ImportKind::Report),
            limit: 1,
            ..Default::default()
        };
        let response = history.query(&query);
        assert_eq!(response.total, 2);
        assert_eq!(response.jobs.len(), 1);
        assert_eq!(response.jobs[0].outcome, JobOutcome::Failed);

        let failed = HistoryQuery { outcome: Some(JobOutcome::Failed), ..all() };
        assert_eq!(history.query(&failed).total, 1);
    }

    #[test]
    fn test_history_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("simola-history-{}", Uuid::new_v4()));
        let path = dir.join(HISTORY_FILENAME);
        let job = job(ImportKind::Feedback, Uuid::new_v4());

        JobHistoryService::open(path.clone()).record_completed(&job, Utc::now(), ImportBatchResult::default());
        let reopened = JobHistoryService::open(path);

        let entries = reopened.query(&all()).jobs;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, job.id);
        assert_eq!(entries[0].kind, ImportKind::Feedback);

        let _ = std::fs::remove_dir_all(dir);
    }
}
