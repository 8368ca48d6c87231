//! In-memory repository for tests. Mirrors the SQL semantics of
//! `PgLetterRepository`: case-sensitive substring search, NULLs sorted last
//! ascending and first descending, `id` as tie-breaker.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::errors::AppError;
use crate::letters::model::{LetterFields, LetterRecord};
use crate::letters::query::{LetterFilter, LetterOrder, SortField, SortOrder};
use crate::letters::repository::LetterRepository;

#[derive(Default)]
pub struct MemoryLetterRepository {
    rows: Mutex<Vec<LetterRecord>>,
    calls: AtomicUsize,
}

impl MemoryLetterRepository {
    pub fn with_letters(letters: impl IntoIterator<Item = LetterRecord>) -> Self {
        Self {
            rows: Mutex::new(letters.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of repository calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<LetterRecord> {
        self.rows.lock().clone()
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

fn contains(value: Option<&str>, needle: &str) -> bool {
    value.is_some_and(|v| v.contains(needle))
}

fn matches(filter: &LetterFilter, letter: &LetterRecord) -> bool {
    let fields = &letter.fields;
    if letter.user_id != filter.owner_id {
        return false;
    }
    if let Some(search) = filter.search.as_deref() {
        let hit = contains(fields.name.as_deref(), search)
            || fields.subject.contains(search)
            || fields.company_name.contains(search)
            || contains(fields.receiver_title.as_deref(), search)
            || contains(fields.applicant_city.as_deref(), search);
        if !hit {
            return false;
        }
    }
    if let Some(language) = filter.language.as_deref() {
        if fields.language.as_deref() != Some(language) {
            return false;
        }
    }
    if let Some(company_name) = filter.company_name.as_deref() {
        if !fields.company_name.contains(company_name) {
            return false;
        }
    }
    if let Some(application_date) = filter.application_date.as_deref() {
        if fields.application_date.as_deref() != Some(application_date) {
            return false;
        }
    }
    true
}

fn compare_nullable(a: Option<&str>, b: Option<&str>, direction: SortOrder) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match direction {
            SortOrder::Asc => a.cmp(b),
            SortOrder::Desc => b.cmp(a),
        },
        (None, None) => Ordering::Equal,
        // Postgres treats NULL as larger than any value
        (None, Some(_)) => match direction {
            SortOrder::Asc => Ordering::Greater,
            SortOrder::Desc => Ordering::Less,
        },
        (Some(_), None) => match direction {
            SortOrder::Asc => Ordering::Less,
            SortOrder::Desc => Ordering::Greater,
        },
    }
}

fn compare(a: &LetterRecord, b: &LetterRecord, order: LetterOrder) -> Ordering {
    let primary = match order.field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::ApplicationDate => {
            return compare_nullable(
                a.fields.application_date.as_deref(),
                b.fields.application_date.as_deref(),
                order.direction,
            )
            .then_with(|| a.id.cmp(&b.id));
        }
        SortField::CompanyName => a.fields.company_name.cmp(&b.fields.company_name),
        SortField::Subject => a.fields.subject.cmp(&b.fields.subject),
    };
    let primary = match order.direction {
        SortOrder::Asc => primary,
        SortOrder::Desc => primary.reverse(),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl LetterRepository for MemoryLetterRepository {
    async fn count(&self, filter: &LetterFilter) -> Result<u64, AppError> {
        self.record_call();
        let rows = self.rows.lock();
        Ok(rows.iter().filter(|l| matches(filter, l)).count() as u64)
    }

    async fn find_many(
        &self,
        filter: &LetterFilter,
        order: LetterOrder,
        skip: u64,
        take: u64,
    ) -> Result<Vec<LetterRecord>, AppError> {
        self.record_call();
        let rows = self.rows.lock();
        let mut matching: Vec<LetterRecord> =
            rows.iter().filter(|l| matches(filter, l)).cloned().collect();
        matching.sort_by(|a, b| compare(a, b, order));
        Ok(matching
            .into_iter()
            .skip(skip as usize)
            .take(take as usize)
            .collect())
    }

    async fn find_first(&self, id: Uuid, owner_id: Uuid) -> Result<Option<LetterRecord>, AppError> {
        self.record_call();
        let rows = self.rows.lock();
        Ok(rows
            .iter()
            .find(|l| l.id == id && l.user_id == owner_id)
            .cloned())
    }

    async fn create(&self, letter: LetterRecord) -> Result<LetterRecord, AppError> {
        self.record_call();
        self.rows.lock().push(letter.clone());
        Ok(letter)
    }

    async fn update(
        &self,
        id: Uuid,
        fields: LetterFields,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<LetterRecord>, AppError> {
        self.record_call();
        let mut rows = self.rows.lock();
        Ok(rows.iter_mut().find(|l| l.id == id).map(|letter| {
            letter.fields = fields;
            letter.updated_at = updated_at;
            letter.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        self.record_call();
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|l| l.id != id);
        Ok(rows.len() < before)
    }
}
