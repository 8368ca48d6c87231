//! List query engine: validates the untrusted query string into a typed
//! [`ListQuery`], turns it into a [`LetterFilter`] and runs the count and the
//! page fetch side by side.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::letters::mapper::to_response;
use crate::letters::model::LetterResponse;
use crate::letters::repository::LetterRepository;

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;
const MAX_FILTER_LEN: usize = 255;

// ────────────────────────────────────────────────────────────────────────────
// Sorting
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    ApplicationDate,
    CompanyName,
    Subject,
}

/// External `sort_by` names and the field each one orders by.
const SORT_FIELDS: [(&str, SortField); 5] = [
    ("created_at", SortField::CreatedAt),
    ("updated_at", SortField::UpdatedAt),
    ("application_date", SortField::ApplicationDate),
    ("company_name", SortField::CompanyName),
    ("subject", SortField::Subject),
];

impl SortField {
    pub fn from_external(name: &str) -> Option<Self> {
        SORT_FIELDS
            .iter()
            .find(|(external, _)| *external == name)
            .map(|(_, field)| *field)
    }

    /// Column name in `application_letters`.
    pub fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::ApplicationDate => "application_date",
            SortField::CompanyName => "company_name",
            SortField::Subject => "subject",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LetterOrder {
    pub field: SortField,
    pub direction: SortOrder,
}

impl Default for LetterOrder {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortOrder::Desc,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Filter / paging
// ────────────────────────────────────────────────────────────────────────────

/// Predicate handed to the repository. Every recognized filter is a named
/// field; `None` means "no constraint".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LetterFilter {
    pub owner_id: Uuid,
    /// Substring of any of [`SEARCH_FIELDS`].
    pub search: Option<String>,
    pub language: Option<String>,
    /// Substring of `company_name`.
    pub company_name: Option<String>,
    pub application_date: Option<String>,
}

/// Columns the free-text `q` parameter searches.
pub const SEARCH_FIELDS: [&str; 5] = [
    "name",
    "subject",
    "company_name",
    "receiver_title",
    "applicant_city",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn skip(self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    pub fn take(self) -> u64 {
        u64::from(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// `0` for an empty result, otherwise `ceil(total_items / max(per_page, 1))`.
pub fn total_pages(total_items: u64, per_page: u32) -> u64 {
    if total_items == 0 {
        return 0;
    }
    total_items.div_ceil(u64::from(per_page.max(1)))
}

// ────────────────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────────────────

/// The list query exactly as it arrives on the URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawListQuery {
    pub q: Option<String>,
    pub language: Option<String>,
    pub company_name: Option<String>,
    pub application_date: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub search: Option<String>,
    pub language: Option<String>,
    pub company_name: Option<String>,
    pub application_date: Option<String>,
    pub order: LetterOrder,
    pub page: PageRequest,
}

impl ListQuery {
    pub fn filter_for(&self, owner_id: Uuid) -> LetterFilter {
        LetterFilter {
            owner_id,
            search: self.search.clone(),
            language: self.language.clone(),
            company_name: self.company_name.clone(),
            application_date: self.application_date.clone(),
        }
    }
}

/// Validates a raw query. Blank values count as absent; an unknown
/// `sort_by` or `sort_order` is rejected rather than silently replaced.
pub fn validate_list_query(raw: RawListQuery) -> Result<ListQuery, AppError> {
    let mut problems = Vec::new();

    let search = text_filter(&mut problems, "q", raw.q);
    let language = text_filter(&mut problems, "language", raw.language);
    let company_name = text_filter(&mut problems, "company_name", raw.company_name);
    let application_date = text_filter(&mut problems, "application_date", raw.application_date);

    let mut order = LetterOrder::default();
    if let Some(sort_by) = present(raw.sort_by) {
        match SortField::from_external(&sort_by) {
            Some(field) => order.field = field,
            None => problems.push(format!(
                "sort_by must be one of: {}",
                SORT_FIELDS
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
    if let Some(sort_order) = present(raw.sort_order) {
        match SortOrder::parse(&sort_order) {
            Some(direction) => order.direction = direction,
            None => problems.push("sort_order must be 'asc' or 'desc'".to_string()),
        }
    }

    let mut page = PageRequest::default();
    if let Some(value) = present(raw.page) {
        match parse_positive(&value) {
            Some(n) => page.page = n,
            None => problems.push("page must be a positive integer".to_string()),
        }
    }
    if let Some(value) = present(raw.per_page) {
        match parse_positive(&value) {
            Some(n) if n <= MAX_PER_PAGE => page.per_page = n,
            _ => problems.push(format!(
                "per_page must be an integer between 1 and {MAX_PER_PAGE}"
            )),
        }
    }

    if !problems.is_empty() {
        return Err(AppError::Validation(problems.join("; ")));
    }

    Ok(ListQuery {
        search,
        language,
        company_name,
        application_date,
        order,
        page,
    })
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn text_filter(problems: &mut Vec<String>, field: &str, value: Option<String>) -> Option<String> {
    let value = present(value)?;
    if value.chars().count() > MAX_FILTER_LEN {
        problems.push(format!("{field} must be at most {MAX_FILTER_LEN} characters"));
        return None;
    }
    Some(value)
}

fn parse_positive(value: &str) -> Option<u32> {
    value.parse::<u32>().ok().filter(|n| *n >= 1)
}

// ────────────────────────────────────────────────────────────────────────────
// Execution
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LetterListResponse {
    pub items: Vec<LetterResponse>,
    pub pagination: Pagination,
}

/// Runs a validated query for one owner. Count and fetch share the same
/// filter value and are issued concurrently.
pub async fn execute_list(
    repo: &dyn LetterRepository,
    owner_id: Uuid,
    query: &ListQuery,
) -> Result<LetterListResponse, AppError> {
    let filter = query.filter_for(owner_id);
    let page = query.page;

    let (total_items, records) = tokio::try_join!(
        repo.count(&filter),
        repo.find_many(&filter, query.order, page.skip(), page.take()),
    )?;

    debug!(
        "Listed {} of {total_items} letters for user {owner_id} (page {})",
        records.len(),
        page.page
    );

    Ok(LetterListResponse {
        items: records.iter().map(to_response).collect(),
        pagination: Pagination {
            page: page.page,
            per_page: page.per_page,
            total_items,
            total_pages: total_pages(total_items, page.per_page),
        },
    })
}
