use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::letters::model::{LetterPayload, LetterResponse};
use crate::letters::query::{LetterListResponse, RawListQuery};
use crate::letters::service::{self, NOT_FOUND_MESSAGE};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub format: Option<String>,
}

/// `format` is optional; when given it must be `docx` in any case.
pub fn ensure_docx_format(format: Option<&str>) -> Result<(), AppError> {
    match format {
        Some(format) if !format.trim().eq_ignore_ascii_case("docx") => {
            Err(AppError::UnsupportedFormat(format!(
                "Unsupported format '{format}'; only 'docx' is available"
            )))
        }
        _ => Ok(()),
    }
}

/// Path ids that are not UUIDs cannot name any letter.
fn parse_letter_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(NOT_FOUND_MESSAGE.to_string()))
}

fn payload_from(body: Result<Json<LetterPayload>, JsonRejection>) -> Result<LetterPayload, AppError> {
    body.map(|Json(payload)| payload)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// GET /api/application-letters
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(raw): Query<RawListQuery>,
) -> Result<Json<LetterListResponse>, AppError> {
    let response = service::list(state.letters.as_ref(), user.id, raw).await?;
    Ok(Json(response))
}

/// POST /api/application-letters
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<LetterPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<LetterResponse>), AppError> {
    let payload = payload_from(body)?;
    let letter = service::create(state.letters.as_ref(), user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(letter)))
}

/// GET /api/application-letters/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<LetterResponse>, AppError> {
    let id = parse_letter_id(&id)?;
    Ok(Json(service::get(state.letters.as_ref(), user.id, id).await?))
}

/// PUT /api/application-letters/:id
pub async fn handle_update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<LetterPayload>, JsonRejection>,
) -> Result<Json<LetterResponse>, AppError> {
    let id = parse_letter_id(&id)?;
    let payload = payload_from(body)?;
    Ok(Json(
        service::update(state.letters.as_ref(), user.id, id, payload).await?,
    ))
}

/// DELETE /api/application-letters/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_letter_id(&id)?;
    service::delete(state.letters.as_ref(), user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/application-letters/:id/duplicate
pub async fn handle_duplicate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<LetterResponse>), AppError> {
    let id = parse_letter_id(&id)?;
    let copy = service::duplicate(state.letters.as_ref(), user.id, id).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

/// GET /api/application-letters/:id/download?format=docx
pub async fn handle_download(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Query(params): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    ensure_docx_format(params.format.as_deref())?;

    let id = parse_letter_id(&id)?;
    let document = service::generate_docx(
        state.letters.as_ref(),
        state.renderer.clone(),
        user.id,
        id,
    )
    .await?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        document.file_name
    ))
    .map_err(|e| AppError::Internal(e.into()))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(document.mime_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response())
}
