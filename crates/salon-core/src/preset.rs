//! Preset rule evaluation
//!
//! Presets are small boolean rule expressions matched against a candidate
//! name (an agent or room). Four grammars are recognized, tried in order;
//! the first syntactically matching form wins:
//!
//! 1. single token:     `Token`
//! 2. colon-labeled:    `Label: Value`
//! 3. equals-single:    `Label = Value`
//! 4. equals-multiple:  `Label = [a, b, c]`
//!
//! Any form may be prefixed with the negation token `Not`. The prefix does
//! not invert the candidate match itself; it selects which mapping entry
//! (`("Not", label)` vs `("", label)`) supplies the returned boolean.
//!
//! Evaluation is pure and stateless. A preset whose value part does not
//! match the candidate yields [`Opinion::NoOpinion`] so callers can fall
//! through to their own default.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Negation prefix token
pub const NEGATION_PREFIX: &str = "Not";

/// Result of evaluating a preset against a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opinion {
    /// The preset matched; the mapped boolean applies
    Decided(bool),
    /// The preset expresses no opinion about this candidate
    NoOpinion,
}

impl Opinion {
    /// Collapse to a boolean, substituting `default` for no opinion
    #[must_use]
    pub fn unwrap_or(self, default: bool) -> bool {
        match self {
            Self::Decided(value) => value,
            Self::NoOpinion => default,
        }
    }
}

/// Registry of `(prefix, label) -> bool` mapping entries.
///
/// Unregistered pairs fall back to the standard mapping: an unprefixed
/// match affirms (`true`), a `Not`-prefixed match denies (`false`).
#[derive(Debug, Clone, Default)]
pub struct PresetTable {
    overrides: HashMap<(String, String), bool>,
}

impl PresetTable {
    /// Table with only the standard prefix-derived mappings
    #[must_use]
    pub fn standard() -> Self {
        Self::default()
    }

    /// Register (or override) the mapping for a `(prefix, label)` pair
    pub fn register(
        &mut self,
        prefix: impl Into<String>,
        label: impl Into<String>,
        value: bool,
    ) {
        self.overrides.insert((prefix.into(), label.into()), value);
    }

    /// Mapped boolean for a matched `(prefix, label)` pair
    #[must_use]
    pub fn mapping(&self, prefix: &str, label: &str) -> bool {
        if let Some(value) = self.overrides.get(&(prefix.to_string(), label.to_string())) {
            return *value;
        }
        prefix != NEGATION_PREFIX
    }
}

/// A syntactically parsed preset
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedPreset {
    prefix: String,
    label: String,
    values: Vec<String>,
}

/// Evaluate a preset expression against a candidate name.
///
/// Malformed presets yield [`Opinion::NoOpinion`]; syntax problems are
/// reported separately by [`validate`] at configuration-load time.
#[must_use]
pub fn evaluate(table: &PresetTable, preset: &str, candidate: &str) -> Opinion {
    let Some(parsed) = parse(preset) else {
        return Opinion::NoOpinion;
    };
    let matched = parsed
        .values
        .iter()
        .any(|value| value.eq_ignore_ascii_case(candidate.trim()));
    if matched {
        Opinion::Decided(table.mapping(&parsed.prefix, &parsed.label))
    } else {
        Opinion::NoOpinion
    }
}

/// Check syntactic well-formedness of a preset without a candidate.
///
/// # Errors
/// Returns [`Error::Configuration`] describing the first problem found.
pub fn validate(preset: &str) -> Result<()> {
    if preset.trim().is_empty() {
        return Err(Error::Configuration("empty preset".to_string()));
    }
    match parse(preset) {
        Some(_) => Ok(()),
        None => Err(Error::Configuration(format!(
            "unrecognized preset syntax: {preset:?}"
        ))),
    }
}

fn parse(preset: &str) -> Option<ParsedPreset> {
    let trimmed = preset.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Optional negation prefix, its own whitespace-separated token.
    let (prefix, body) = match trimmed.split_once(char::is_whitespace) {
        Some((first, rest)) if first == NEGATION_PREFIX && !rest.trim().is_empty() => {
            (NEGATION_PREFIX.to_string(), rest.trim())
        }
        _ => (String::new(), trimmed),
    };

    // 1. single token (a bare negation prefix is not a preset)
    if !body.contains(':') && !body.contains('=') {
        if body.split_whitespace().count() != 1 || body == NEGATION_PREFIX {
            return None;
        }
        return Some(ParsedPreset {
            prefix,
            label: body.to_string(),
            values: vec![body.to_string()],
        });
    }

    // 2. colon-labeled, unless the colon comes after an equals sign
    let colon = body.find(':');
    let equals = body.find('=');
    if let Some(colon_pos) = colon {
        if equals.is_none_or(|eq_pos| colon_pos < eq_pos) {
            let label = body[..colon_pos].trim();
            let value = body[colon_pos + 1..].trim();
            if label.is_empty() || value.is_empty() {
                return None;
            }
            return Some(ParsedPreset {
                prefix,
                label: label.to_string(),
                values: vec![value.to_string()],
            });
        }
    }

    // 3/4. equals forms
    let eq_pos = equals?;
    let label = body[..eq_pos].trim();
    let rhs = body[eq_pos + 1..].trim();
    if label.is_empty() || rhs.is_empty() {
        return None;
    }

    if let Some(list) = rhs.strip_prefix('[') {
        let list = list.strip_suffix(']')?;
        let values: Vec<String> = list
            .split(',')
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if values.is_empty() {
            return None;
        }
        return Some(ParsedPreset {
            prefix,
            label: label.to_string(),
            values,
        });
    }

    Some(ParsedPreset {
        prefix,
        label: label.to_string(),
        values: vec![rhs.to_string()],
    })
}

/// True when the preset affirms at least one of the given candidate names.
///
/// Used by selection preconditions: a precondition "matches" when it
/// decides `true` for any agent currently in the room.
#[must_use]
pub fn matches_any(table: &PresetTable, preset: &str, candidates: &[String]) -> bool {
    candidates
        .iter()
        .any(|name| evaluate(table, preset, name) == Opinion::Decided(true))
}
