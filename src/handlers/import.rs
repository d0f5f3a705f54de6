//! Spreadsheet import handlers: job submission and template download

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use base64::Engine;
use futures::StreamExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth;
use crate::services::import::{template_for, TemplateError};
use crate::services::import_processor::ImportProcessor;
use crate::types::{
    codes, ErrorResponse, Request, SuccessResponse,
    FileDownloadResponse, ImportFileRequest, ImportKind, ImportTemplateRequest, XLSX_CONTENT_TYPE,
};

/// Render the blank template for `kind` as a download
pub fn template_download(kind: ImportKind) -> Result<FileDownloadResponse, TemplateError> {
    let template = template_for(kind);
    let bytes = template.to_xlsx()?;

    Ok(FileDownloadResponse {
        filename: template.filename.to_string(),
        content_type: XLSX_CONTENT_TYPE.to_string(),
        size_bytes: bytes.len() as u64,
        file_base64: base64::engine::general_purpose::STANDARD.encode(&bytes),
    })
}

/// Handle import.submit messages
pub async fn handle_import_submit(
    client: Client,
    mut subscriber: Subscriber,
    processor: Arc<ImportProcessor>,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received import.submit message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ImportFileRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse import submit request: {}", e);
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

        let request_id = request.id;
        match processor.submit_job(auth_info.user_id, request.payload).await {
            Ok(response) => {
                let success = SuccessResponse::new(request_id, response);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                warn!("Failed to submit import job: {}", e);
                let error = ErrorResponse::new(request_id, codes::SUBMIT_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle import.template messages
pub async fn handle_template(
    client: Client,
    mut subscriber: Subscriber,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received import.template message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ImportTemplateRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse template request: {}", e);
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

        match template_download(request.payload.kind) {
            Ok(file) => {
                info!("Serving {} template ({} bytes)", request.payload.kind.as_str(), file.size_bytes);
                let success = SuccessResponse::new(request.id, file);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                error!("Failed to build template: {}", e);
                let error = ErrorResponse::new(request.id, codes::TEMPLATE_ERROR, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
