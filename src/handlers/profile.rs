//! Staff profile handlers for NATS messages

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth;
use crate::db::queries;
use tokio::task::JoinHandle;

use crate::types::{
    codes, ErrorResponse, Request, SuccessResponse,
    CreateProfileRequest, EmptyPayload, IdRequest, ListRequest, ListResponse,
    ProfileFilter, UpdateProfileRequest,
};

const PROFILE_NOT_FOUND: &str = "Profil tidak ditemukan";

/// Start all profile-related NATS handlers
pub async fn start_handlers(
    client: Client,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<Vec<JoinHandle<Result<()>>>> {
    info!("Starting profile handlers...");

    let create_sub = client.subscribe("simola.profile.create").await?;
    let list_sub = client.subscribe("simola.profile.list").await?;
    let get_sub = client.subscribe("simola.profile.get").await?;
    let update_sub = client.subscribe("simola.profile.update").await?;
    let delete_sub = client.subscribe("simola.profile.delete").await?;
    let stats_sub = client.subscribe("simola.profile.stats").await?;

    let handles = vec![
        tokio::spawn(handle_create(client.clone(), create_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_list(client.clone(), list_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_get(client.clone(), get_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_update(client.clone(), update_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_delete(client.clone(), delete_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_stats(client.clone(), stats_sub, pool.clone(), jwt_secret.clone())),
    ];

    info!("Profile handlers started");
    Ok(handles)
}

/// Validate a new profile before it reaches the database
fn check_create(req: &CreateProfileRequest) -> Option<String> {
    if req.nama.trim().is_empty() {
        return Some("Nama wajib diisi".to_string());
    }
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Some(format!("Email tidak valid: {}", req.email));
    }
    None
}

/// Handle profile.create messages (admin only)
pub async fn handle_create(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received profile.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<CreateProfileRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
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

        if !auth_info.is_admin() {
            let error = ErrorResponse::new(request.id, codes::FORBIDDEN, "Hanya admin yang dapat menambah pengguna");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        if let Some(message) = check_create(&request.payload) {
            let error = ErrorResponse::new(request.id, codes::INVALID_REQUEST, message);
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::profile::create_profile(&pool, &request.payload).await {
            Ok(profile) => {
                info!("Profile {} ({}) created by {}", profile.id, profile.email, auth_info.user_id);
                let response = SuccessResponse::new(request.id, profile);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to create profile: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle profile.list messages
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received profile.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ListRequest<ProfileFilter>> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), codes::INVALID_REQUEST, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if auth::extract_auth(&request, &jwt_secret).is_err() {
            let error = ErrorResponse::new(request.id, codes::UNAUTHORIZED, "Authentication required");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let list = &request.payload;
        let role = list.filter.role;

        let items = queries::profile::list_profiles(&pool, role, list.limit, list.offset).await;
        let total = queries::profile::count_profiles(&pool, role).await;

        match (items, total) {
            (Ok(items), Ok(total)) => {
                let response = SuccessResponse::new(request.id, ListResponse {
                    items,
                    total,
                    limit: list.limit,
                    offset: list.offset,
                });
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to list profiles: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle profile.get messages
pub async fn handle_get(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received profile.get message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<IdRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), codes::INVALID_REQUEST, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if auth::extract_auth(&request, &jwt_secret).is_err() {
            let error = ErrorResponse::new(request.id, codes::UNAUTHORIZED, "Authentication required");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::profile::get_profile(&pool, request.payload.id).await {
            Ok(Some(profile)) => {
                let response = SuccessResponse::new(request.id, profile);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, codes::NOT_FOUND, PROFILE_NOT_FOUND);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to get profile: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle profile.update messages (admin only)
pub async fn handle_update(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received profile.update message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UpdateProfileRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
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

        if !auth_info.is_admin() {
            let error = ErrorResponse::new(request.id, codes::FORBIDDEN, "Hanya admin yang dapat mengubah profil");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::profile::update_profile(&pool, &request.payload).await {
            Ok(Some(profile)) => {
                info!("Profile {} updated by {}", profile.id, auth_info.user_id);
                let response = SuccessResponse::new(request.id, profile);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, codes::NOT_FOUND, PROFILE_NOT_FOUND);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to update profile: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle profile.delete messages (admin only)
pub async fn handle_delete(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received profile.delete message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<IdRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
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

        if !auth_info.is_admin() {
            let error = ErrorResponse::new(request.id, codes::FORBIDDEN, "Hanya admin yang dapat menghapus pengguna");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::profile::delete_profile(&pool, request.payload.id).await {
            Ok(true) => {
                info!("Profile {} deleted by {}", request.payload.id, auth_info.user_id);
                let response = SuccessResponse::new(request.id, serde_json::json!({ "deleted": true }));
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(false) => {
                let error = ErrorResponse::new(request.id, codes::NOT_FOUND, PROFILE_NOT_FOUND);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to delete profile: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle profile.stats messages
pub async fn handle_stats(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received profile.stats message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<EmptyPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), codes::INVALID_REQUEST, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if auth::extract_auth(&request, &jwt_secret).is_err() {
            let error = ErrorResponse::new(request.id, codes::UNAUTHORIZED, "Authentication required");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::profile::get_profile_stats(&pool).await {
            Ok(stats) => {
                let response = SuccessResponse::new(request.id, stats);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to get profile stats: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StaffRole;

    fn create(email: &str, nama: &str) -> CreateProfileRequest {
        CreateProfileRequest {
            id: None,
            email: email.to_string(),
            nama: nama.to_string(),
            nomor_telepon: None,
            role: Some(StaffRole::Dispatcher),
            unit_kerja: Some("Polres Sleman".to_string()),
        }
    }

    #[test]
    fn test_check_create_accepts_valid_profile() {
        assert!(check_create(&create("dewi@polda.id", "Dewi")).is_none());
    }

    #[test]
    fn test_check_create_requires_name() {
        assert_eq!(check_create(&create("dewi@polda.id", "  ")).as_deref(), Some("Nama wajib diisi"));
    }

    #[test]
    fn test_check_create_rejects_bad_email() {
        assert!(check_create(&create("dewi.polda.id", "Dewi")).is_some());
        assert!(check_create(&create("", "Dewi")).is_some());
    }
}
