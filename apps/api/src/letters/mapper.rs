//! Field mapping between the snake_case wire format and stored rows, plus the
//! render-time derivations (title-cased enumerations, attachment lists).
//!
//! All null/absent coalescing rules live here so call sites never decide on
//! their own what an empty field looks like.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::letters::model::{LetterFields, LetterPayload, LetterRecord, LetterResponse};
use crate::render::TemplateContext;

/// Maps a validated request payload onto the mutable stored fields.
/// Absent and explicit-null nullable columns both become `None`.
pub fn to_storage(payload: LetterPayload) -> LetterFields {
    LetterFields {
        name: payload.name,
        birth_place_date: payload.birth_place_date,
        gender: payload.gender,
        marital_status: payload.marital_status,
        education: payload.education,
        phone: payload.phone,
        email: payload.email,
        address: payload.address,
        subject: payload.subject,
        applicant_city: payload.applicant_city,
        application_date: payload.application_date,
        receiver_title: payload.receiver_title,
        company_name: payload.company_name,
        company_city: payload.company_city,
        company_address: payload.company_address,
        opening_paragraph: payload.opening_paragraph,
        body_paragraph: payload.body_paragraph,
        attachments: payload.attachments,
        closing_paragraph: payload.closing_paragraph,
        signature: payload.signature,
        language: payload.language,
    }
}

pub fn to_response(record: &LetterRecord) -> LetterResponse {
    let fields = record.fields.clone();
    LetterResponse {
        id: record.id,
        user_id: record.user_id,
        name: fields.name,
        birth_place_date: fields.birth_place_date,
        gender: fields.gender,
        marital_status: fields.marital_status,
        education: fields.education,
        phone: fields.phone,
        email: fields.email,
        address: fields.address,
        subject: fields.subject,
        applicant_city: fields.applicant_city,
        application_date: fields.application_date,
        receiver_title: fields.receiver_title,
        company_name: fields.company_name,
        company_city: fields.company_city,
        company_address: fields.company_address,
        opening_paragraph: fields.opening_paragraph,
        body_paragraph: fields.body_paragraph,
        attachments: fields.attachments,
        closing_paragraph: fields.closing_paragraph,
        signature: fields.signature,
        language: fields.language,
        created_at: format_timestamp(&record.created_at),
        updated_at: format_timestamp(&record.updated_at),
    }
}

/// RFC 3339 in UTC with millisecond precision, e.g. `2026-01-02T03:04:05.678Z`.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `single_parent` -> `Single Parent`. Empty segments are dropped, so the
/// output never contains underscores and re-applying it is a no-op.
pub fn title_case(value: &str) -> String {
    value
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits the free-text attachments field on `,`, `;` or newlines.
pub fn parse_attachment_items(value: Option<&str>) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };

    value
        .split([',', ';', '\n'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// Builds the placeholder values for the DOCX template. Every key is always
/// present; missing optional fields render as empty strings.
pub fn template_context(record: &LetterRecord) -> TemplateContext {
    let fields = &record.fields;
    let mut context = TemplateContext::new();

    context.insert_text("applicant_city", text(&fields.applicant_city));
    context.insert_text("application_date", text(&fields.application_date));
    context.insert_text("subject", fields.subject.clone());
    context.insert_text("receiver_title", text(&fields.receiver_title));
    context.insert_text("company_name", fields.company_name.clone());
    context.insert_text("company_address", text(&fields.company_address));
    context.insert_text("company_city", text(&fields.company_city));
    context.insert_text("opening_paragraph", text(&fields.opening_paragraph));
    context.insert_text("body_paragraph", text(&fields.body_paragraph));
    context.insert_text("attachments", text(&fields.attachments));
    context.insert_list(
        "attachments_items",
        parse_attachment_items(fields.attachments.as_deref()),
    );
    context.insert_text("closing_paragraph", text(&fields.closing_paragraph));
    context.insert_text("name", text(&fields.name));
    context.insert_text("birth_place_date", text(&fields.birth_place_date));
    context.insert_text("gender", title_case(fields.gender.as_deref().unwrap_or("")));
    context.insert_text(
        "marital_status",
        title_case(fields.marital_status.as_deref().unwrap_or("")),
    );
    context.insert_text("education", text(&fields.education));
    context.insert_text("phone", text(&fields.phone));
    context.insert_text("email", text(&fields.email));
    context.insert_text("address", text(&fields.address));
    context.insert_text(
        "signature",
        fields
            .signature
            .clone()
            .or_else(|| fields.name.clone())
            .unwrap_or_default(),
    );

    context
}
