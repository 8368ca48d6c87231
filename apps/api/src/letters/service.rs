//! Letter operations. Every function takes the repository explicitly and
//! resolves ownership before touching a row; a letter that belongs to someone
//! else is reported exactly like one that does not exist.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::letters::mapper::{template_context, to_response, to_storage};
use crate::letters::model::{LetterPayload, LetterRecord, LetterResponse};
use crate::letters::query::{execute_list, validate_list_query, LetterListResponse, RawListQuery};
use crate::letters::repository::LetterRepository;
use crate::letters::validation::validate_payload;
use crate::render::{file_stem, DocumentRenderer, DOCX_MIME_TYPE};

pub const NOT_FOUND_MESSAGE: &str = "Application letter not found";

fn not_found() -> AppError {
    AppError::NotFound(NOT_FOUND_MESSAGE.to_string())
}

/// A rendered download.
#[derive(Debug)]
pub struct GeneratedDocument {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub file_name: String,
}

pub async fn list(
    repo: &dyn LetterRepository,
    owner_id: Uuid,
    raw: RawListQuery,
) -> Result<LetterListResponse, AppError> {
    let query = validate_list_query(raw)?;
    execute_list(repo, owner_id, &query).await
}

pub async fn create(
    repo: &dyn LetterRepository,
    owner_id: Uuid,
    payload: LetterPayload,
) -> Result<LetterResponse, AppError> {
    validate_payload(&payload)?;
    let now = Utc::now();

    let letter = repo
        .create(LetterRecord {
            id: Uuid::new_v4(),
            user_id: owner_id,
            fields: to_storage(payload),
            created_at: now,
            updated_at: now,
        })
        .await?;

    info!("Created application letter {} for user {owner_id}", letter.id);
    Ok(to_response(&letter))
}

pub async fn get(
    repo: &dyn LetterRepository,
    owner_id: Uuid,
    id: Uuid,
) -> Result<LetterResponse, AppError> {
    let letter = find_owned(repo, owner_id, id).await?;
    Ok(to_response(&letter))
}

pub async fn update(
    repo: &dyn LetterRepository,
    owner_id: Uuid,
    id: Uuid,
    payload: LetterPayload,
) -> Result<LetterResponse, AppError> {
    find_owned(repo, owner_id, id).await?;
    validate_payload(&payload)?;

    let letter = repo
        .update(id, to_storage(payload), Utc::now())
        .await?
        .ok_or_else(not_found)?;

    info!("Updated application letter {id} for user {owner_id}");
    Ok(to_response(&letter))
}

pub async fn delete(repo: &dyn LetterRepository, owner_id: Uuid, id: Uuid) -> Result<(), AppError> {
    find_owned(repo, owner_id, id).await?;
    if !repo.delete(id).await? {
        return Err(not_found());
    }

    info!("Deleted application letter {id} for user {owner_id}");
    Ok(())
}

/// Copies every mutable field into a new row with its own id and timestamps.
pub async fn duplicate(
    repo: &dyn LetterRepository,
    owner_id: Uuid,
    id: Uuid,
) -> Result<LetterResponse, AppError> {
    let source = find_owned(repo, owner_id, id).await?;
    let now = Utc::now();

    let copy = repo
        .create(LetterRecord {
            id: Uuid::new_v4(),
            user_id: owner_id,
            fields: source.fields,
            created_at: now,
            updated_at: now,
        })
        .await?;

    info!("Duplicated application letter {id} as {} for user {owner_id}", copy.id);
    Ok(to_response(&copy))
}

/// Renders the owned letter into a DOCX. Rendering runs on the blocking pool.
pub async fn generate_docx(
    repo: &dyn LetterRepository,
    renderer: Arc<dyn DocumentRenderer>,
    owner_id: Uuid,
    id: Uuid,
) -> Result<GeneratedDocument, AppError> {
    let letter = find_owned(repo, owner_id, id).await?;
    let context = template_context(&letter);

    let bytes = tokio::task::spawn_blocking(move || renderer.render(&context))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    let stem = file_stem(
        letter.fields.name.as_deref(),
        Some(letter.fields.company_name.as_str()),
    );
    info!("Generated DOCX for application letter {id} ({} bytes)", bytes.len());

    Ok(GeneratedDocument {
        bytes,
        mime_type: DOCX_MIME_TYPE,
        file_name: format!("{stem}.docx"),
    })
}

async fn find_owned(
    repo: &dyn LetterRepository,
    owner_id: Uuid,
    id: Uuid,
) -> Result<LetterRecord, AppError> {
    repo.find_first(id, owner_id).await?.ok_or_else(not_found)
}
