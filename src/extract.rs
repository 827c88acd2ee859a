use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::AppError;

const PREVIEW_CHARS: usize = 160;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("fenced block pattern is valid")
});

#[derive(Debug, Error)]
#[error("{schema}: could not parse model output as JSON ({reason}); output began with {preview:?}")]
pub struct ExtractionError {
    pub schema: &'static str,
    pub reason: String,
    pub preview: String,
}

impl From<ExtractionError> for AppError {
    fn from(error: ExtractionError) -> Self {
        AppError::Extraction(error.to_string())
    }
}

/// Parses a completion into `T`.
///
/// Strict parsing is tried first. If that fails the first fenced code block
/// and then the first balanced `{...}` object are each parsed strictly. The
/// error from the strict attempt is the one reported when everything fails.
pub fn extract_json<T: DeserializeOwned>(
    raw: &str,
    schema: &'static str,
) -> Result<T, ExtractionError> {
    let trimmed = raw.trim();

    let strict_error = match serde_json::from_str::<T>(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    debug!(schema, error = %strict_error, "Strict parse failed, trying fallbacks");

    let candidates = fenced_block(trimmed)
        .into_iter()
        .chain(first_balanced_object(trimmed));

    for candidate in candidates {
        if let Ok(value) = serde_json::from_str::<T>(candidate) {
            warn!(schema, "Recovered JSON from surrounding text in model output");
            return Ok(value);
        }
    }

    Err(ExtractionError {
        schema,
        reason: strict_error.to_string(),
        preview: trimmed.chars().take(PREVIEW_CHARS).collect(),
    })
}

fn fenced_block(text: &str) -> Option<&str> {
    FENCED_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// First `{` through its matching `}`, ignoring braces inside string literals.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Summary {
        summary: String,
        #[serde(default)]
        tags: Vec<String>,
    }

    #[test]
    fn parses_clean_json() {
        let parsed: Summary =
            extract_json(r#"{"summary": "Good energy", "tags": ["closeouts"]}"#, "summary").unwrap();
        assert_eq!(parsed.summary, "Good energy");
        assert_eq!(parsed.tags, vec!["closeouts"]);
    }

    #[test]
    fn recovers_from_code_fence() {
        let raw = "Here you go:\n```json\n{\"summary\": \"Fenced\"}\n```\nLet me know!";
        let parsed: Summary = extract_json(raw, "summary").unwrap();
        assert_eq!(parsed.summary, "Fenced");
    }

    #[test]
    fn recovers_first_object_from_prose() {
        let raw = r#"Sure! {"summary": "Uses {braces} in text", "tags": []} and also {"summary": "second"}"#;
        let parsed: Summary = extract_json(raw, "summary").unwrap();
        assert_eq!(parsed.summary, "Uses {braces} in text");
    }

    #[test]
    fn handles_escaped_quotes_inside_strings() {
        let raw = r#"note: {"summary": "He said \"box out}\" twice"} end"#;
        let parsed: Summary = extract_json(raw, "summary").unwrap();
        assert_eq!(parsed.summary, "He said \"box out}\" twice");
    }

    #[test]
    fn schema_mismatch_is_an_error() {
        let err = extract_json::<Summary>(r#"{"headline": "no summary"}"#, "summary").unwrap_err();
        assert_eq!(err.schema, "summary");
        assert!(err.reason.contains("summary"));
    }

    #[test]
    fn garbage_reports_a_preview() {
        let err = extract_json::<Summary>("I cannot help with that.", "summary").unwrap_err();
        assert_eq!(err.preview, "I cannot help with that.");

        let app_error: AppError = err.into();
        assert!(matches!(app_error, AppError::Extraction(_)));
    }

    #[test]
    fn unbalanced_object_is_not_extracted() {
        assert_eq!(first_balanced_object(r#"{"summary": "open"#), None);
    }
}
