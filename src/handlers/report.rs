//! Report handlers for NATS messages

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
use crate::services::report_export::{self, ReportExportRequest};
use crate::types::{
    codes, ErrorResponse, Request, SuccessResponse,
    CreateReportRequest, EmptyPayload, GetReportRequest, IdRequest, ListRequest, ListResponse,
    ReportFilter, UpdateReportRequest, UpdateReportStatusRequest,
};

const REPORT_NOT_FOUND: &str = "Laporan tidak ditemukan";

/// Start all report-related NATS handlers
pub async fn start_handlers(
    client: Client,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<Vec<JoinHandle<Result<()>>>> {
    info!("Starting report handlers...");

    let create_sub = client.subscribe("simola.report.create").await?;
    let list_sub = client.subscribe("simola.report.list").await?;
    let get_sub = client.subscribe("simola.report.get").await?;
    let update_sub = client.subscribe("simola.report.update").await?;
    let status_sub = client.subscribe("simola.report.status").await?;
    let delete_sub = client.subscribe("simola.report.delete").await?;
    let stats_sub = client.subscribe("simola.report.stats").await?;
    let export_sub = client.subscribe("simola.report.export").await?;

    let handles = vec![
        tokio::spawn(handle_create(client.clone(), create_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_list(client.clone(), list_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_get(client.clone(), get_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_update(client.clone(), update_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_status(client.clone(), status_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_delete(client.clone(), delete_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_stats(client.clone(), stats_sub, pool.clone(), jwt_secret.clone())),
        tokio::spawn(handle_export(client.clone(), export_sub, pool.clone(), jwt_secret.clone())),
    ];

    info!("Report handlers started");
    Ok(handles)
}

/// Handle report.create messages
pub async fn handle_create(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received report.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<CreateReportRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::report::create_report(&pool, &request.payload).await {
            Ok(report) => {
                info!("Report {} created by {}", report.nomor_laporan, auth_info.email);
                if let Err(e) = queries::activity::log_activity(
                    &pool, report.id, auth_info.user_id, "create", Some("Laporan dibuat"),
                ).await {
                    warn!("Failed to log activity for report {}: {}", report.nomor_laporan, e);
                }
                let response = SuccessResponse::new(request.id, report);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to create report: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle report.list messages
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received report.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ListRequest<ReportFilter>> = match serde_json::from_slice(&msg.payload) {
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
        let search = list.search.as_deref();

        let items = queries::report::list_reports(&pool, &list.filter, search, list.limit, list.offset).await;
        let total = queries::report::count_reports(&pool, &list.filter, search).await;

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
                error!("Failed to list reports: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle report.get messages (by report number or id)
pub async fn handle_get(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received report.get message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<GetReportRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::report::find_report(&pool, &request.payload.reference).await {
            Ok(Some(report)) => {
                let response = SuccessResponse::new(request.id, report);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, codes::NOT_FOUND, REPORT_NOT_FOUND);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to get report: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle report.update messages
pub async fn handle_update(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received report.update message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UpdateReportRequest> = match serde_json::from_slice(&msg.payload) {
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

        match queries::report::update_report(&pool, &request.payload).await {
            Ok(Some(report)) => {
                if let Err(e) = queries::activity::log_activity(
                    &pool, report.id, auth_info.user_id, "update", Some("Laporan diperbarui"),
                ).await {
                    warn!("Failed to log activity for report {}: {}", report.nomor_laporan, e);
                }
                let response = SuccessResponse::new(request.id, report);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, codes::NOT_FOUND, REPORT_NOT_FOUND);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to update report: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle report.status messages
pub async fn handle_status(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received report.status message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UpdateReportStatusRequest> = match serde_json::from_slice(&msg.payload) {
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

        let status = request.payload.status;

        match queries::report::update_report_status(&pool, request.payload.id, status).await {
            Ok(Some(report)) => {
                let description = format!("Status diubah menjadi {}", status);
                if let Err(e) = queries::activity::log_activity(
                    &pool, report.id, auth_info.user_id, "status_change", Some(&description),
                ).await {
                    warn!("Failed to log activity for report {}: {}", report.nomor_laporan, e);
                }
                let response = SuccessResponse::new(request.id, report);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, codes::NOT_FOUND, REPORT_NOT_FOUND);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to update report status: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle report.delete messages (admin only)
pub async fn handle_delete(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received report.delete message");

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
            let error = ErrorResponse::new(request.id, codes::FORBIDDEN, "Hanya admin yang dapat menghapus laporan");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::report::delete_report(&pool, request.payload.id).await {
            Ok(true) => {
                info!("Report {} deleted by {}", request.payload.id, auth_info.user_id);
                let response = SuccessResponse::new(request.id, serde_json::json!({ "deleted": true }));
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(false) => {
                let error = ErrorResponse::new(request.id, codes::NOT_FOUND, REPORT_NOT_FOUND);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to delete report: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle report.stats messages
pub async fn handle_stats(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received report.stats message");

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

        match queries::report::get_report_stats(&pool).await {
            Ok(stats) => {
                let response = SuccessResponse::new(request.id, stats);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to get report stats: {}", e);
                let error = ErrorResponse::new(request.id, codes::DATABASE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle report.export messages
pub async fn handle_export(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received report.export message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ReportExportRequest> = match serde_json::from_slice(&msg.payload) {
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

        match report_export::export_reports(&pool, &request.payload).await {
            Ok(file) => {
                info!("Report export {} ({} bytes)", file.filename, file.size_bytes);
                let response = SuccessResponse::new(request.id, file);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                warn!("Report export failed: {}", e);
                let error = ErrorResponse::new(request.id, codes::EXPORT_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
