//! DOCX generation from a pre-authored template.
//!
//! The template is a regular `.docx` whose text contains `{tag}` placeholders.
//! Rendering is CPU-bound and synchronous; callers run it inside
//! `tokio::task::spawn_blocking`.

pub mod context;
pub mod docx;
mod engine;
#[cfg(test)]
pub mod test_support;

use thiserror::Error;

pub use context::{TemplateContext, TemplateValue};
pub use docx::DocxTemplate;

pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Used when a letter has neither a usable name nor company name.
pub const DEFAULT_FILE_STEM: &str = "application-letter";
const MAX_FILE_STEM_LEN: usize = 60;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("template I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("template is missing part {0}")]
    MissingPart(&'static str),

    #[error("template part {0} is not valid UTF-8")]
    Encoding(String),

    #[error("malformed template: {0}")]
    Malformed(String),

    #[error("template tag {{{0}}} has no value")]
    UnknownTag(String),
}

/// Anything that can turn a filled-in context into a finished document.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, context: &TemplateContext) -> Result<Vec<u8>, RenderError>;
}

/// Download file name (without extension) for a letter: `name-company`,
/// lower-cased, with every run of characters outside `[a-z0-9]` collapsed to
/// one hyphen.
pub fn file_stem(name: Option<&str>, company_name: Option<&str>) -> String {
    let base = format!(
        "{}-{}",
        name.unwrap_or("application"),
        company_name.unwrap_or("letter")
    )
    .to_lowercase();

    let mut slug = String::with_capacity(base.len());
    for c in base.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug: String = slug
        .trim_matches('-')
        .chars()
        .take(MAX_FILE_STEM_LEN)
        .collect();

    if slug.is_empty() {
        DEFAULT_FILE_STEM.to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem_slugifies_name_and_company() {
        assert_eq!(
            file_stem(Some("Jane Doe"), Some("Acme Corp!!")),
            "jane-doe-acme-corp"
        );
    }

    #[test]
    fn test_file_stem_falls_back_when_empty() {
        assert_eq!(file_stem(Some(""), Some("")), DEFAULT_FILE_STEM);
        assert_eq!(file_stem(Some("!!"), Some("??")), DEFAULT_FILE_STEM);
    }

    #[test]
    fn test_file_stem_uses_placeholders_for_missing_parts() {
        assert_eq!(file_stem(None, Some("Acme")), "application-acme");
        assert_eq!(file_stem(Some("Jane"), None), "jane-letter");
    }

    #[test]
    fn test_file_stem_is_truncated_to_60_chars() {
        let long = "a".repeat(80);
        let stem = file_stem(Some(&long), Some("Acme"));
        assert_eq!(stem.len(), 60);
        assert!(stem.chars().all(|c| c == 'a'));
    }

    #[test]
    fn test_file_stem_replaces_non_ascii_letters() {
        assert_eq!(file_stem(Some("Zoë Ärzt"), Some("Café")), "zo-rzt-caf");
    }
}
