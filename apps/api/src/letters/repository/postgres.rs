use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::errors::AppError;
use crate::letters::model::{LetterFields, LetterRecord};
use crate::letters::query::{LetterFilter, LetterOrder, SEARCH_FIELDS};
use crate::letters::repository::LetterRepository;

#[derive(Clone)]
pub struct PgLetterRepository {
    pool: PgPool,
}

impl PgLetterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends the WHERE clause. `strpos` keeps `%` and `_` in user input literal
/// and matches case-sensitively, like a plain substring test.
fn push_filter<'a>(builder: &mut QueryBuilder<'a, Postgres>, filter: &'a LetterFilter) {
    builder.push(" WHERE user_id = ").push_bind(filter.owner_id);

    if let Some(search) = filter.search.as_deref() {
        builder.push(" AND (");
        for (i, column) in SEARCH_FIELDS.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder
                .push(format!("strpos({column}, "))
                .push_bind(search)
                .push(") > 0");
        }
        builder.push(")");
    }

    if let Some(language) = filter.language.as_deref() {
        builder.push(" AND language = ").push_bind(language);
    }

    if let Some(company_name) = filter.company_name.as_deref() {
        builder
            .push(" AND strpos(company_name, ")
            .push_bind(company_name)
            .push(") > 0");
    }

    if let Some(application_date) = filter.application_date.as_deref() {
        builder
            .push(" AND application_date = ")
            .push_bind(application_date);
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl LetterRepository for PgLetterRepository {
    async fn count(&self, filter: &LetterFilter) -> Result<u64, AppError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM application_letters");
        push_filter(&mut builder, filter);

        let total: i64 = builder.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    async fn find_many(
        &self,
        filter: &LetterFilter,
        order: LetterOrder,
        skip: u64,
        take: u64,
    ) -> Result<Vec<LetterRecord>, AppError> {
        let mut builder = QueryBuilder::new("SELECT * FROM application_letters");
        push_filter(&mut builder, filter);

        // column and direction come from closed enums, never from input
        builder.push(format!(
            " ORDER BY {} {}, id ASC",
            order.field.column(),
            order.direction.as_sql()
        ));
        builder
            .push(" LIMIT ")
            .push_bind(to_i64(take))
            .push(" OFFSET ")
            .push_bind(to_i64(skip));

        Ok(builder
            .build_query_as::<LetterRecord>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_first(&self, id: Uuid, owner_id: Uuid) -> Result<Option<LetterRecord>, AppError> {
        Ok(sqlx::query_as::<_, LetterRecord>(
            "SELECT * FROM application_letters WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create(&self, letter: LetterRecord) -> Result<LetterRecord, AppError> {
        let LetterRecord {
            id,
            user_id,
            fields,
            created_at,
            updated_at,
        } = letter;

        Ok(sqlx::query_as::<_, LetterRecord>(
            r#"
            INSERT INTO application_letters
                (id, user_id, name, birth_place_date, gender, marital_status,
                 education, phone, email, address, subject, applicant_city,
                 application_date, receiver_title, company_name, company_city,
                 company_address, opening_paragraph, body_paragraph, attachments,
                 closing_paragraph, signature, language, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(fields.name)
        .bind(fields.birth_place_date)
        .bind(fields.gender)
        .bind(fields.marital_status)
        .bind(fields.education)
        .bind(fields.phone)
        .bind(fields.email)
        .bind(fields.address)
        .bind(fields.subject)
        .bind(fields.applicant_city)
        .bind(fields.application_date)
        .bind(fields.receiver_title)
        .bind(fields.company_name)
        .bind(fields.company_city)
        .bind(fields.company_address)
        .bind(fields.opening_paragraph)
        .bind(fields.body_paragraph)
        .bind(fields.attachments)
        .bind(fields.closing_paragraph)
        .bind(fields.signature)
        .bind(fields.language)
        .bind(created_at)
        .bind(updated_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update(
        &self,
        id: Uuid,
        fields: LetterFields,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<LetterRecord>, AppError> {
        Ok(sqlx::query_as::<_, LetterRecord>(
            r#"
            UPDATE application_letters SET
                name = $1, birth_place_date = $2, gender = $3, marital_status = $4,
                education = $5, phone = $6, email = $7, address = $8, subject = $9,
                applicant_city = $10, application_date = $11, receiver_title = $12,
                company_name = $13, company_city = $14, company_address = $15,
                opening_paragraph = $16, body_paragraph = $17, attachments = $18,
                closing_paragraph = $19, signature = $20, language = $21,
                updated_at = $22
            WHERE id = $23
            RETURNING *
            "#,
        )
        .bind(fields.name)
        .bind(fields.birth_place_date)
        .bind(fields.gender)
        .bind(fields.marital_status)
        .bind(fields.education)
        .bind(fields.phone)
        .bind(fields.email)
        .bind(fields.address)
        .bind(fields.subject)
        .bind(fields.applicant_city)
        .bind(fields.application_date)
        .bind(fields.receiver_title)
        .bind(fields.company_name)
        .bind(fields.company_city)
        .bind(fields.company_address)
        .bind(fields.opening_paragraph)
        .bind(fields.body_paragraph)
        .bind(fields.attachments)
        .bind(fields.closing_paragraph)
        .bind(fields.signature)
        .bind(fields.language)
        .bind(updated_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM application_letters WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
