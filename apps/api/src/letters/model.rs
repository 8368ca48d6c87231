use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stored application letter. Identity and timestamps are managed by the
/// service; everything the caller can edit lives in [`LetterFields`].
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct LetterRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(flatten)]
    pub fields: LetterFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The mutable columns of `application_letters`.
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct LetterFields {
    pub name: Option<String>,
    pub birth_place_date: Option<String>,
    pub gender: Option<String>,
    pub marital_status: Option<String>,
    pub education: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub subject: String,
    pub applicant_city: Option<String>,
    pub application_date: Option<String>,
    pub receiver_title: Option<String>,
    pub company_name: String,
    pub company_city: Option<String>,
    pub company_address: Option<String>,
    pub opening_paragraph: Option<String>,
    pub body_paragraph: Option<String>,
    pub attachments: Option<String>,
    pub closing_paragraph: Option<String>,
    pub signature: Option<String>,
    pub language: Option<String>,
}

/// Create/update request body. Required fields default to empty so that a
/// missing value surfaces as a validation error rather than a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LetterPayload {
    pub name: Option<String>,
    pub birth_place_date: Option<String>,
    pub gender: Option<String>,
    pub marital_status: Option<String>,
    pub education: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub subject: String,
    pub applicant_city: Option<String>,
    pub application_date: Option<String>,
    pub receiver_title: Option<String>,
    #[serde(default)]
    pub company_name: String,
    pub company_city: Option<String>,
    pub company_address: Option<String>,
    pub opening_paragraph: Option<String>,
    pub body_paragraph: Option<String>,
    pub attachments: Option<String>,
    pub closing_paragraph: Option<String>,
    pub signature: Option<String>,
    pub language: Option<String>,
}

/// JSON shape returned for a single letter. Nullable fields are always
/// present (as `null`), never omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetterResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: Option<String>,
    pub birth_place_date: Option<String>,
    pub gender: Option<String>,
    pub marital_status: Option<String>,
    pub education: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub subject: String,
    pub applicant_city: Option<String>,
    pub application_date: Option<String>,
    pub receiver_title: Option<String>,
    pub company_name: String,
    pub company_city: Option<String>,
    pub company_address: Option<String>,
    pub opening_paragraph: Option<String>,
    pub body_paragraph: Option<String>,
    pub attachments: Option<String>,
    pub closing_paragraph: Option<String>,
    pub signature: Option<String>,
    pub language: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
