//! Database-backed create collaborators for the batch importer

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::batch::{CreateError, CreatedRecord, RecordCreator};
use crate::db::queries;
use crate::types::{CreateFeedbackRequest, CreateReportRequest, ImportedFeedback, ImportedReport};

impl From<anyhow::Error> for CreateError {
    fn from(err: anyhow::Error) -> Self {
        // Keep the SQLSTATE (e.g. 23505) when the database rejected the row
        let code = err
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .and_then(|db| db.code())
            .map(|code| code.into_owned());

        let message = match err.downcast_ref::<sqlx::Error>() {
            Some(sqlx::Error::Database(db)) => db.message().to_string(),
            _ => err.to_string(),
        };

        CreateError {
            message: (!message.trim().is_empty()).then_some(message),
            code,
        }
    }
}

/// Inserts imported reports through the same query as the manual form
pub struct PgReportCreator {
    pool: PgPool,
}

impl PgReportCreator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordCreator<ImportedReport> for PgReportCreator {
    async fn create(&self, record: &ImportedReport) -> Result<CreatedRecord, CreateError> {
        let request = CreateReportRequest::from(record.clone());
        let report = queries::report::create_report(&self.pool, &request).await?;
        Ok(CreatedRecord {
            id: report.id,
            reference: Some(report.nomor_laporan),
        })
    }
}

/// Inserts imported feedback on behalf of the importing staff member
pub struct PgFeedbackCreator {
    pool: PgPool,
    user_id: Option<Uuid>,
}

impl PgFeedbackCreator {
    pub fn new(pool: PgPool, user_id: Option<Uuid>) -> Self {
        Self { pool, user_id }
    }
}

#[async_trait]
impl RecordCreator<ImportedFeedback> for PgFeedbackCreator {
    async fn create(&self, record: &ImportedFeedback) -> Result<CreatedRecord, CreateError> {
        let request = CreateFeedbackRequest::from(record.clone());
        let feedback = queries::feedback::create_feedback(&self.pool, self.user_id, &request).await?;
        Ok(CreatedRecord {
            id: feedback.id,
            reference: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_error_from_plain_error_keeps_message() {
        let err = CreateError::from(anyhow::anyhow!("connection refused"));
        assert_eq!(err.message.as_deref(), Some("connection refused"));
        assert!(err.code.is_none());
    }

    #[test]
    fn test_create_error_from_sqlx_error_without_database_code() {
        let err = CreateError::from(anyhow::Error::from(sqlx::Error::PoolTimedOut));
        assert!(err.code.is_none());
        assert!(err.message.is_some());
    }
}
