//! Import batch types for spreadsheet import functionality

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FeedbackType, ReportKind, ReportPriority};

/// How many error messages are handed back for display after a batch
pub const MAX_DISPLAYED_ERRORS: usize = 10;

/// Which record kind a spreadsheet holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    Report,
    Feedback,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportKind::Report => "report",
            ImportKind::Feedback => "feedback",
        }
    }
}

impl std::str::FromStr for ImportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "report" | "laporan" => Ok(ImportKind::Report),
            "feedback" => Ok(ImportKind::Feedback),
            other => Err(format!("unknown import kind: {}", other)),
        }
    }
}

// =============================================================================
// CANONICAL RECORDS
// =============================================================================

/// A report row after normalization and validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedReport {
    pub jenis: ReportKind,
    pub kategori: String,
    pub deskripsi: String,
    pub prioritas: ReportPriority,
    pub lokasi: String,
    pub pelapor: String,
    pub telepon: String,
    pub email: String,
    pub petugas_nama: String,
    pub petugas_polres: String,
    pub petugas_hp: String,
}

/// A feedback row after normalization and validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedFeedback {
    pub feedback_type: FeedbackType,
    pub subject: String,
    pub message: String,
    pub rating: i32,
    pub email: Option<String>,
    pub nama: String,
}

// =============================================================================
// BATCH RESULT
// =============================================================================

/// Tally of one batch. `success + failed` always equals the row count;
/// `errors` holds at most `MAX_DISPLAYED_ERRORS` messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatchResult {
    pub success: u32,
    pub failed: u32,
    pub errors: Vec<String>,
}

impl ImportBatchResult {
    pub fn total(&self) -> u32 {
        self.success + self.failed
    }

    /// Human-readable summary line, e.g. for the job history
    pub fn summary(&self) -> String {
        format!("{}/{} berhasil diimport", self.success, self.total())
    }
}

// =============================================================================
// JOB REQUESTS
// =============================================================================

/// Upload request: a spreadsheet file as base64
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFileRequest {
    pub kind: ImportKind,
    pub filename: String,
    pub file_base64: String,
}

/// Request for a downloadable import template
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTemplateRequest {
    pub kind: ImportKind,
}

/// Binary file handed back to the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDownloadResponse {
    pub filename: String,
    pub content_type: String,
    pub file_base64: String,
    pub size_bytes: u64,
}

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A queued import job in JetStream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedImportJob {
    pub id: Uuid,
    pub user_id: Uuid,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub request: ImportFileRequest,
}

impl QueuedImportJob {
    pub fn new(user_id: Uuid, request: ImportFileRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            submitted_at: chrono::Utc::now(),
            request,
        }
    }
}

/// Status of an import job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ImportJobStatus {
    /// Job is waiting in queue
    #[serde(rename_all = "camelCase")]
    Queued { position: u32 },
    /// Workbook is being read
    Parsing,
    /// Rows are being submitted
    #[serde(rename_all = "camelCase")]
    Importing {
        processed: u32,
        total: u32,
        succeeded: u32,
        failed: u32,
    },
    #[serde(rename_all = "camelCase")]
    Completed {
        success: u32,
        failed: u32,
        errors: Vec<String>,
        duration_ms: u64,
    },
    /// The file could not be read at all; no rows were processed
    #[serde(rename_all = "camelCase")]
    Failed { error: String },
}

/// Status update for import job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobStatusUpdate {
    pub job_id: Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub status: ImportJobStatus,
}

impl ImportJobStatusUpdate {
    pub fn new(job_id: Uuid, status: ImportJobStatus) -> Self {
        Self {
            job_id,
            timestamp: chrono::Utc::now(),
            status,
        }
    }
}

/// Response when an import job is submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobSubmitResponse {
    pub job_id: Uuid,
    pub kind: ImportKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_kind_parses_case_insensitively() {
        assert_eq!("Report".parse::<ImportKind>().unwrap(), ImportKind::Report);
        assert_eq!(" feedback ".parse::<ImportKind>().unwrap(), ImportKind::Feedback);
        assert!("customer".parse::<ImportKind>().is_err());
    }

    #[test]
    fn test_import_job_status_completed_serializes() {
        let status = ImportJobStatus::Completed {
            success: 10,
            failed: 2,
            errors: vec!["Baris 5: Field wajib tidak lengkap".to_string()],
            duration_ms: 1200,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"type\":\"completed\""));
        assert!(json.contains("durationMs"));
    }

    #[test]
    fn test_import_file_request_deserializes_camel_case() {
        let json = r#"{"kind":"feedback","filename":"a.xlsx","fileBase64":"AAAA"}"#;
        let req: ImportFileRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.kind, ImportKind::Feedback);
        assert_eq!(req.file_base64, "AAAA");
    }

    #[test]
    fn test_batch_result_summary() {
        let result = ImportBatchResult { success: 10, failed: 2, errors: vec![] };
        assert_eq!(result.total(), 12);
        assert_eq!(result.summary(), "10/12 berhasil diimport");
    }
}
