//! Persistence boundary for application letters.
//!
//! `AppState` holds an `Arc<dyn LetterRepository>`; production wires in
//! [`PgLetterRepository`], tests use the in-memory store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::letters::model::{LetterFields, LetterRecord};
use crate::letters::query::{LetterFilter, LetterOrder};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgLetterRepository;

/// Filter and order arguments are passed through unchanged from the query
/// builder. Ownership checks are the caller's job: `update` and `delete` act
/// on the id alone.
#[async_trait]
pub trait LetterRepository: Send + Sync {
    async fn count(&self, filter: &LetterFilter) -> Result<u64, AppError>;

    async fn find_many(
        &self,
        filter: &LetterFilter,
        order: LetterOrder,
        skip: u64,
        take: u64,
    ) -> Result<Vec<LetterRecord>, AppError>;

    /// Returns the letter only if it belongs to `owner_id`.
    async fn find_first(&self, id: Uuid, owner_id: Uuid) -> Result<Option<LetterRecord>, AppError>;

    async fn create(&self, letter: LetterRecord) -> Result<LetterRecord, AppError>;

    /// Replaces the mutable fields. `None` if the row no longer exists.
    async fn update(
        &self,
        id: Uuid,
        fields: LetterFields,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<LetterRecord>, AppError>;

    /// `false` if there was nothing to delete.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}
