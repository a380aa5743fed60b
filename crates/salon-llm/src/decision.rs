//! Tolerant parsing of selection decisions
//!
//! The decision prompt asks the model for a JSON object of the shape
//! `{"reason": "...", "next": "..."}`. Models routinely wrap that object in
//! commentary, markdown fences, or extra keys, so parsing scans the output
//! for balanced objects and extracts the two expected fields by key.

use crate::error::{Error, Result};
use serde_json::Value;

/// A parsed selection decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Model-stated rationale for the choice
    pub reason: String,
    /// Chosen agent or room name
    pub next: String,
}

/// Extract a [`Decision`] from raw model output.
///
/// # Errors
/// Returns [`Error::InvalidResponse`] when no balanced JSON object carrying
/// both `reason` and `next` string fields can be found.
pub fn extract_decision(text: &str) -> Result<Decision> {
    for candidate in balanced_objects(text) {
        let Ok(value) = serde_json::from_str::<Value>(candidate) else {
            continue;
        };
        let (Some(reason), Some(next)) = (
            value.get("reason").and_then(Value::as_str),
            value.get("next").and_then(Value::as_str),
        ) else {
            continue;
        };
        let next = next.trim();
        if next.is_empty() {
            continue;
        }
        return Ok(Decision {
            reason: reason.trim().to_string(),
            next: next.to_string(),
        });
    }

    Err(Error::InvalidResponse(format!(
        "no decision object found in model output: {}",
        truncate(text, 120)
    )))
}

/// Yield every balanced `{...}` substring of `text`, outermost first.
fn balanced_objects(text: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let bytes = text.as_bytes();
    let mut start = None;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start.take() {
                            objects.push(&text[s..=i]);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    objects
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_object() {
        let d = extract_decision(r#"{"reason": "turn order", "next": "Scout"}"#).unwrap();
        assert_eq!(d.reason, "turn order");
        assert_eq!(d.next, "Scout");
    }

    #[test]
    fn test_extract_with_surrounding_commentary() {
        let text = "Sure! Here is my choice:\n```json\n{\"reason\": \"asked directly\", \"next\": \"Archivist\"}\n```\nHope that helps.";
        let d = extract_decision(text).unwrap();
        assert_eq!(d.next, "Archivist");
    }

    #[test]
    fn test_extract_ignores_extra_keys() {
        let text = r#"{"confidence": 0.9, "reason": "r", "next": "Guide", "notes": []}"#;
        let d = extract_decision(text).unwrap();
        assert_eq!(d.next, "Guide");
    }

    #[test]
    fn test_extract_skips_objects_missing_fields() {
        let text = r#"{"next": "incomplete"} then {"reason": "ok", "next": "Scout"}"#;
        // First object has no reason; the scan keeps going.
        let d = extract_decision(text).unwrap();
        assert_eq!(d.reason, "ok");
        assert_eq!(d.next, "Scout");
    }

    #[test]
    fn test_extract_braces_inside_strings() {
        let text = r#"{"reason": "brace } in text", "next": "Scout"}"#;
        let d = extract_decision(text).unwrap();
        assert_eq!(d.reason, "brace } in text");
    }

    #[test]
    fn test_extract_rejects_empty_next() {
        let err = extract_decision(r#"{"reason": "r", "next": "  "}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_extract_no_object() {
        assert!(extract_decision("no json here").is_err());
    }
}
