use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use editer_core::{is_url_safe, DocumentResponse};
use serde::Deserialize;

use super::{ApiError, AppState};

/// Body of create and update requests
#[derive(Debug, Deserialize)]
pub struct DocumentRequest {
    content: String,
}

/// Checks a request body and returns the content it carries.
fn validate(
    payload: Result<Json<DocumentRequest>, JsonRejection>,
    max_document_size: usize,
) -> Result<String, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::ContentTooLarge(format!(
                "Content exceeds {} bytes",
                max_document_size
            ))
        } else {
            ApiError::InvalidRequest(rejection.body_text())
        }
    })?;

    if request.content.is_empty() {
        return Err(ApiError::EmptyContent);
    }
    if request.content.len() > max_document_size {
        return Err(ApiError::ContentTooLarge(format!(
            "Content exceeds {} bytes",
            max_document_size
        )));
    }
    Ok(request.content)
}

/// `POST /documents`
pub async fn create_document(
    State(state): State<AppState>,
    payload: Result<Json<DocumentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    let content = validate(payload, state.max_document_size)?;
    let doc = state.service.create_document(&content).await?;
    Ok((StatusCode::CREATED, Json(doc.into())))
}

/// `GET /documents/{share_id}`
pub async fn get_document(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
) -> Result<Json<DocumentResponse>, ApiError> {
    // Anything the generator could not have produced cannot exist.
    if !is_url_safe(&share_id) {
        return Err(ApiError::NotFound);
    }

    match state.service.get_document(&share_id).await? {
        Some(doc) => Ok(Json(doc.into())),
        None => Err(ApiError::NotFound),
    }
}

/// `PUT /documents/{share_id}`
pub async fn update_document(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
    payload: Result<Json<DocumentRequest>, JsonRejection>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let content = validate(payload, state.max_document_size)?;
    if !is_url_safe(&share_id) {
        return Err(ApiError::NotFound);
    }

    match state.service.update_document(&share_id, &content).await? {
        Some(doc) => Ok(Json(doc.into())),
        None => Err(ApiError::NotFound),
    }
}
