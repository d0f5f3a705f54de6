//! Job history handler
//!
//! Import jobs record their outcome in the in-memory job history; this
//! serves it to the dashboard. Admins see every job, other staff only
//! their own.

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, error};
use uuid::Uuid;

use crate::auth::{self, AuthInfo};
use crate::services::job_history::{HistoryQuery, JobHistoryResponse, JobHistoryService, JobOutcome, JOB_HISTORY};
use crate::types::{codes, ErrorResponse, ImportKind, Request, SuccessResponse};

const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Request to get job history
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJobHistoryRequest {
    pub limit: Option<usize>,
    pub kind: Option<ImportKind>,
    pub outcome: Option<JobOutcome>,
    /// Only honored for admins
    pub user_id: Option<Uuid>,
}

/// Pick the history slice visible to the caller
fn visible_history(
    history: &JobHistoryService,
    auth_info: &AuthInfo,
    request: &ListJobHistoryRequest,
) -> JobHistoryResponse {
    let user_id = if auth_info.is_admin() {
        request.user_id
    } else {
        Some(auth_info.user_id)
    };

    history.query(&HistoryQuery {
        user_id,
        kind: request.kind,
        outcome: request.outcome,
        limit: request.limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
    })
}

/// Handle jobs.history requests
pub async fn handle_job_history(
    client: Client,
    mut subscriber: async_nats::Subscriber,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received jobs.history message");

        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<ListJobHistoryRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse job history request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), codes::INVALID_REQUEST, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let auth_info = match auth::extract_auth(&request, &jwt_secret) {
            Ok(info) => info,
            Err(_) => {
                let error = ErrorResponse::new(request.id, codes::UNAUTHORIZED, "Authentication required");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let history = visible_history(&JOB_HISTORY, &auth_info, &request.payload);

        let success = SuccessResponse::new(request.id, history);
        let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImportBatchResult, ImportFileRequest, QueuedImportJob, StaffRole};
    use chrono::Utc;

    fn staff(role: StaffRole) -> AuthInfo {
        AuthInfo {
            user_id: Uuid::new_v4(),
            email: "staff@polda.id".to_string(),
            role,
        }
    }

    fn record(history: &JobHistoryService, kind: ImportKind, user_id: Uuid) {
        let job = QueuedImportJob::new(user_id, ImportFileRequest {
            kind,
            filename: "data.xlsx".to_string(),
            file_base64: String::new(),
        });
        history.record_completed(&job, Utc::now(), ImportBatchResult::default());
    }

    #[test]
    fn test_non_admin_sees_only_own_jobs() {
        let history = JobHistoryService::in_memory();
        let petugas = staff(StaffRole::Petugas);
        let other = Uuid::new_v4();
        record(&history, ImportKind::Report, petugas.user_id);
        record(&history, ImportKind::Report, other);

        // Asking for someone else's jobs does not widen the view
        let request = ListJobHistoryRequest { user_id: Some(other), ..Default::default() };
        let visible = visible_history(&history, &petugas, &request);
        assert_eq!(visible.total, 1);
        assert_eq!(visible.jobs[0].user_id, petugas.user_id);
    }

    #[test]
    fn test_admin_filters_by_kind() {
        let history = JobHistoryService::in_memory();
        let admin = staff(StaffRole::Admin);
        record(&history, ImportKind::Report, Uuid::new_v4());
        record(&history, ImportKind::Feedback, Uuid::new_v4());

        let all = visible_history(&history, &admin, &ListJobHistoryRequest::default());
        assert_eq!(all.jobs.len(), 2);

        let request = ListJobHistoryRequest {
            kind: Some(ImportKind::Feedback),
            ..Default::default()
        };
        let feedback_only = visible_history(&history, &admin, &request);
        assert_eq!(feedback_only.jobs.len(), 1);
        assert_eq!(feedback_only.jobs[0].kind, ImportKind::Feedback);
    }

    #[test]
    fn test_request_deserializes_typed_filters() {
        let json = r#"{"limit":5,"kind":"report","outcome":"failed"}"#;
        let request: ListJobHistoryRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.kind, Some(ImportKind::Report));
        assert_eq!(request.outcome, Some(JobOutcome::Failed));
        assert!(request.user_id.is_none());
    }
}
