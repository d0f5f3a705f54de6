//! Feedback handlers for NATS messages

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth;
use crate::db::queries;
use crate::types::{
    codes, ErrorResponse, Request, SuccessResponse,
    CreateFeedbackRequest, EmptyPayload, FeedbackFilter, IdRequest, ListRequest, ListResponse,
    UpdateFeedbackRequest,
};

const FEEDBACK_NOT_FOUND: &str = "Feedback tidak ditemukan";

/// Start all feedback-related NATS handlers
pub async fn start_handlers(
    client: Client,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<Vec<JoinHandle<Result<()>>>> {
    info!("Starting feedback handlers...");

    let create_sub = client.subscribe("simola.feedback.create").await?;
    let list_sub = client.subscribe("simola.feedback.list").await?;
    let get_sub = client.subscribe("simola.feedback.get").await?;
    let update_sub = client.subscribe("simola.feedback.update").await?;
    let delete_sub = client.subscribe("simola.feedback.delete").await?;
    let stats_sub = client.subscribe("simola.feedback.stats").await?;

    let handles = vec![
        tokio::spawn(handle_create(client.clone(), create_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_list(client.clone(), list_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_get(client.clone(), get_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_update(client.clone(), update_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_delete(client.clone(), delete_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_stats(client.clone(), stats_sub, pool.clone(), jwt_secret.clone())),
    ];

    info!("Feedback handlers started");
    Ok(handles)
}

/// Validate a manually entered feedback before it reaches the database
fn check_create(req: &CreateFeedbackRequest) -> Option<String> {
    if req.subject.trim().is_empty() || req.message.trim().is_empty() {
        return Some("Subjek dan pesan wajib diisi".to_string());
    }
    if !(1..=5).contains(&req.rating) {
        return Some(format!("Rating {} harus antara 1-5", req.rating));
    }
    None
}

/// Handle feedback.create messages
pub async fn handle_create(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received feedback.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<CreateFeedbackRequest> = match serde_json::from_slice(&msg.payload) {
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

        if let Some(message) = check_create(&request.payload) {
            let error = ErrorResponse::new(request.id, codes::INVALID_REQUEST, message);
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let owner = match queries::profile::existing_profile_id(&pool, Some(auth_info.user_id)).await {
            Ok(owner) => owner,
            Err(e) => {
                warn!("Failed to look up profile {}: {}", auth_info.user_id, e);
                None
            }
        };

        match queries::feedback::create_feedback(&pool, owner, &request.payload).await {
            Ok(feedback) => {
                let response = SuccessResponse::new(request.id, feedback);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to create feedback: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle feedback.list messages
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received feedback.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ListRequest<FeedbackFilter>> = match serde_json::from_slice(&msg.payload) {
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
        let feedback_type = list.filter.feedback_type;
        let search = list.search.as_deref();

        let items = queries::feedback::list_feedback(&pool, feedback_type, search, list.limit, list.offset).await;
        let total = queries::feedback::count_feedback(&pool, feedback_type, search).await;

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
                error!("Failed to list feedback: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle feedback.get messages
pub async fn handle_get(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received feedback.get message");

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

        match queries::feedback::get_feedback(&pool, request.payload.id).await {
            Ok(Some(feedback)) => {
                let response = SuccessResponse::new(request.id, feedback);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, codes::NOT_FOUND, FEEDBACK_NOT_FOUND);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to get feedback: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle feedback.update messages
pub async fn handle_update(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received feedback.update message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UpdateFeedbackRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::feedback::update_feedback(&pool, &request.payload).await {
            Ok(Some(feedback)) => {
                let response = SuccessResponse::new(request.id, feedback);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, codes::NOT_FOUND, FEEDBACK_NOT_FOUND);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to update feedback: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle feedback.delete messages (admin only)
pub async fn handle_delete(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received feedback.delete message");

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
            let error = ErrorResponse::new(request.id, codes::FORBIDDEN, "Hanya admin yang dapat menghapus feedback");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::feedback::delete_feedback(&pool, request.payload.id).await {
            Ok(true) => {
                let response = SuccessResponse::new(request.id, serde_json::json!({ "deleted": true }));
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(false) => {
                let error = ErrorResponse::new(request.id, codes::NOT_FOUND, FEEDBACK_NOT_FOUND);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to delete feedback: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle feedback.stats messages
pub async fn handle_stats(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received feedback.stats message");

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

        match queries::feedback::get_feedback_stats(&pool).await {
            Ok(stats) => {
                let response = SuccessResponse::new(request.id, stats);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to get feedback stats: {}", e);
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
    use crate::types::FeedbackType;

    fn create(subject: &str, rating: i32) -> CreateFeedbackRequest {
        CreateFeedbackRequest {
            feedback_type: FeedbackType::Saran,
            subject: subject.to_string(),
            message: "Mohon tambah petugas di malam hari".to_string(),
            rating,
            email: None,
            nama: None,
            photo_url: None,
            status: None,
        }
    }

    #[test]
    fn test_check_create_accepts_valid_feedback() {
        assert!(check_create(&create("Saran jam layanan", 4)).is_none());
    }

    #[test]
    fn test_check_create_rejects_rating_out_of_range() {
        assert!(check_create(&create("Saran", 0)).is_some());
        assert!(check_create(&create("Saran", 6)).is_some());
    }

    #[test]
    fn test_check_create_rejects_blank_subject() {
        assert!(check_create(&create("   ", 3)).is_some());
    }
}
