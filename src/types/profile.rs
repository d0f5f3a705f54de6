//! Staff profile types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Staff role, as carried in the access token and stored on the profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Admin,
    #[default]
    Petugas,
    Dispatcher,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Admin => "admin",
            StaffRole::Petugas => "petugas",
            StaffRole::Dispatcher => "dispatcher",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(StaffRole::Admin),
            "petugas" => Some(StaffRole::Petugas),
            "dispatcher" => Some(StaffRole::Dispatcher),
            _ => None,
        }
    }
}

/// Profile entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub nama: String,
    pub nomor_telepon: Option<String>,
    pub role: StaffRole,
    pub unit_kerja: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a profile (admin only).
///
/// `id` should be the identity provider's user id so tokens map onto the
/// profile; a fresh id is generated when it is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub email: String,
    pub nama: String,
    #[serde(default)]
    pub nomor_telepon: Option<String>,
    #[serde(default)]
    pub role: Option<StaffRole>,
    #[serde(default)]
    pub unit_kerja: Option<String>,
}

/// Request to update a profile (admin only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub id: Uuid,
    pub nama: Option<String>,
    pub nomor_telepon: Option<String>,
    pub role: Option<StaffRole>,
    pub unit_kerja: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFilter {
    #[serde(default)]
    pub role: Option<StaffRole>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub total: i64,
    pub by_role: HashMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_profile_request_defaults() {
        let json = r#"{"email":"sari@polda.id","nama":"Sari"}"#;
        let req: CreateProfileRequest = serde_json::from_str(json).unwrap();
        assert!(req.id.is_none());
        assert!(req.role.is_none());
        assert_eq!(req.role.unwrap_or_default(), StaffRole::Petugas);
    }

    #[test]
    fn test_staff_role_parse() {
        assert_eq!(StaffRole::parse(" Admin "), Some(StaffRole::Admin));
        assert_eq!(StaffRole::parse("dispatcher"), Some(StaffRole::Dispatcher));
        assert_eq!(StaffRole::parse("customer"), None);
    }
}
