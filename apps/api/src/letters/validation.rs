use crate::errors::AppError;
use crate::letters::model::LetterPayload;

pub const GENDERS: &[&str] = &["male", "female"];
pub const MARITAL_STATUSES: &[&str] = &["single", "married", "divorced", "widowed"];

const MAX_TEXT_LEN: usize = 255;
const MAX_PARAGRAPH_LEN: usize = 10_000;
const MAX_LANGUAGE_LEN: usize = 16;

/// Validates a create/update body, collecting every failing field so the
/// caller sees all problems at once.
pub fn validate_payload(payload: &LetterPayload) -> Result<(), AppError> {
    let mut problems = Vec::new();

    if payload.subject.trim().is_empty() {
        problems.push("subject is required".to_string());
    }
    if payload.company_name.trim().is_empty() {
        problems.push("company_name is required".to_string());
    }

    let short_fields = [
        ("name", payload.name.as_deref()),
        ("birth_place_date", payload.birth_place_date.as_deref()),
        ("education", payload.education.as_deref()),
        ("phone", payload.phone.as_deref()),
        ("email", payload.email.as_deref()),
        ("subject", Some(payload.subject.as_str())),
        ("applicant_city", payload.applicant_city.as_deref()),
        ("application_date", payload.application_date.as_deref()),
        ("receiver_title", payload.receiver_title.as_deref()),
        ("company_name", Some(payload.company_name.as_str())),
        ("company_city", payload.company_city.as_deref()),
        ("signature", payload.signature.as_deref()),
    ];
    for (field, value) in short_fields {
        check_length(&mut problems, field, value, MAX_TEXT_LEN);
    }

    let long_fields = [
        ("address", payload.address.as_deref()),
        ("company_address", payload.company_address.as_deref()),
        ("opening_paragraph", payload.opening_paragraph.as_deref()),
        ("body_paragraph", payload.body_paragraph.as_deref()),
        ("attachments", payload.attachments.as_deref()),
        ("closing_paragraph", payload.closing_paragraph.as_deref()),
    ];
    for (field, value) in long_fields {
        check_length(&mut problems, field, value, MAX_PARAGRAPH_LEN);
    }

    check_enum(&mut problems, "gender", payload.gender.as_deref(), GENDERS);
    check_enum(
        &mut problems,
        "marital_status",
        payload.marital_status.as_deref(),
        MARITAL_STATUSES,
    );

    if let Some(email) = payload.email.as_deref() {
        if !is_plausible_email(email) {
            problems.push("email must be a valid email address".to_string());
        }
    }

    if let Some(language) = payload.language.as_deref() {
        if !is_language_tag(language) {
            problems.push(format!(
                "language must be 2-{MAX_LANGUAGE_LEN} letters, digits or '-'"
            ));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(problems.join("; ")))
    }
}

fn check_length(problems: &mut Vec<String>, field: &str, value: Option<&str>, max: usize) {
    if let Some(value) = value {
        if value.chars().count() > max {
            problems.push(format!("{field} must be at most {max} characters"));
        }
    }
}

fn check_enum(problems: &mut Vec<String>, field: &str, value: Option<&str>, allowed: &[&str]) {
    if let Some(value) = value {
        if !allowed.contains(&value) {
            problems.push(format!("{field} must be one of: {}", allowed.join(", ")));
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !domain.is_empty()
                && !email.chars().any(char::is_whitespace)
        }
        _ => false,
    }
}

fn is_language_tag(language: &str) -> bool {
    (2..=MAX_LANGUAGE_LEN).contains(&language.len())
        && language
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}
