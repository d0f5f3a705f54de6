//! Feedback types

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use super::ImportedFeedback;

/// Feedback category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "feedback_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Saran,
    Keluhan,
    Pujian,
    BugReport,
    FiturRequest,
}

impl FeedbackType {
    pub const ALL: [FeedbackType; 5] = [
        FeedbackType::Saran,
        FeedbackType::Keluhan,
        FeedbackType::Pujian,
        FeedbackType::BugReport,
        FeedbackType::FiturRequest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Saran => "saran",
            FeedbackType::Keluhan => "keluhan",
            FeedbackType::Pujian => "pujian",
            FeedbackType::BugReport => "bug_report",
            FeedbackType::FiturRequest => "fitur_request",
        }
    }

    /// Parse an already trimmed, lowercased value
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_FEEDBACK_STATUS: &str = "menunggu";

/// Feedback entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: Uuid,
    pub feedback_type: FeedbackType,
    pub subject: String,
    pub message: String,
    pub rating: i32,
    pub nama: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub status: String,
    pub response: Option<String>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create feedback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeedbackRequest {
    pub feedback_type: FeedbackType,
    pub subject: String,
    pub message: String,
    pub rating: i32,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub nama: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl From<ImportedFeedback> for CreateFeedbackRequest {
    fn from(row: ImportedFeedback) -> Self {
        Self {
            feedback_type: row.feedback_type,
            subject: row.subject,
            message: row.message,
            rating: row.rating,
            email: row.email,
            nama: Some(row.nama),
            photo_url: None,
            status: None,
        }
    }
}

/// Request to update feedback (triage)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFeedbackRequest {
    pub id: Uuid,
    pub status: Option<String>,
    pub response: Option<String>,
}

/// Filter for the feedback list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackFilter {
    #[serde(default)]
    pub feedback_type: Option<FeedbackType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackStats {
    pub total: i64,
    pub today: i64,
    pub average_rating: f64,
    pub by_type: HashMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_type_snake_case_names() {
        assert_eq!(FeedbackType::parse("bug_report"), Some(FeedbackType::BugReport));
        assert_eq!(FeedbackType::parse("fitur_request"), Some(FeedbackType::FiturRequest));
        assert_eq!(FeedbackType::parse("sugestion"), None);
        let json = serde_json::to_string(&FeedbackType::FiturRequest).unwrap();
        assert_eq!(json, "\"fitur_request\"");
    }

    #[test]
    fn test_create_request_from_import_keeps_name() {
        let imported = ImportedFeedback {
            feedback_type: FeedbackType::Pujian,
            subject: "Pelayanan Sangat Baik".to_string(),
            message: "Terima kasih".to_string(),
            rating: 5,
            email: None,
            nama: "Alice Johnson".to_string(),
        };
        let req = CreateFeedbackRequest::from(imported);
        assert_eq!(req.nama.as_deref(), Some("Alice Johnson"));
        assert!(req.status.is_none());
    }

    #[test]
    fn test_list_request_flattens_feedback_filter() {
        let json = r#"{"limit":20,"feedbackType":"bug_report"}"#;
        let req: crate::types::ListRequest<FeedbackFilter> = serde_json::from_str(json).unwrap();
        assert_eq!(req.limit, 20);
        assert_eq!(req.filter.feedback_type, Some(FeedbackType::BugReport));
    }
}
