//! Template field parser.
//!
//! # Responsibility
//! - Parse input/display template strings into ordered field descriptors.
//! - Support the three coexisting grammars behind one entry point.
//!
//! # Invariants
//! - Dialects are tried in a fixed order (new, legacy, brace); the first one
//!   producing fields wins and the others never fire for the same template.
//! - Section labels `[T,…]` and read-only displays `[L,…]` are recognized
//!   independently of the molecule-field dialect.
//! - A template matching no grammar yields an empty field list, not an error.

use crate::model::molecule::MoleculeDefinition;
use crate::model::template::{FieldKind, TemplateField};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static NEW_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[M,\s*([A-Za-z0-9_]+),\s*"([^"]*)",\s*"([RUN]*)",\s*"([^"]*)"\]"#)
        .expect("valid new-dialect regex")
});
static LEGACY_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[M,\s*([A-Za-z0-9_]+),\s*"([^"]*)",\s*(R|O),\s*"([^"]*)"\]"#)
        .expect("valid legacy-dialect regex")
});
static BRACE_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z0-9_]+):([^:{}]*):([^:{}]*):([^{}]*)\}")
        .expect("valid brace-dialect regex")
});
static SECTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\[T,\s*"([^"]*)"\]"#).expect("valid section regex"));
static DISPLAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[L,\s*([A-Za-z0-9_]+)\]").expect("valid display regex"));

/// Molecule metadata the parser consults for labels and cascade parents.
pub trait FieldCatalog {
    fn definition(&self, key: &str) -> Option<&MoleculeDefinition>;
}

impl FieldCatalog for BTreeMap<String, MoleculeDefinition> {
    fn definition(&self, key: &str) -> Option<&MoleculeDefinition> {
        self.get(key)
    }
}

/// Catalog that knows nothing; prompts fall back to the raw template text.
pub struct NoCatalog;

impl FieldCatalog for NoCatalog {
    fn definition(&self, _key: &str) -> Option<&MoleculeDefinition> {
        None
    }
}

enum Token {
    Molecule {
        key: String,
        width: String,
        required: bool,
        force_upper: bool,
        numeric_only: bool,
        prompt: String,
    },
    Section(String),
    Display {
        key: String,
    },
}

/// Parses a template body into ordered field descriptors.
///
/// Rows are assigned by accumulating grid spans: a field that would overflow
/// the 12-unit row starts a new one, and section labels always occupy a row
/// of their own.
pub fn parse_template(body: &str, catalog: &dyn FieldCatalog) -> Vec<TemplateField> {
    let mut tokens: Vec<(usize, Token)> = Vec::new();

    if let Some(dialect_re) = detect_dialect(body) {
        for caps in dialect_re.captures_iter(body) {
            let Some(whole) = caps.get(0) else { continue };
            tokens.push((whole.start(), molecule_token(dialect_re, &caps)));
        }
    }

    for caps in SECTION_RE.captures_iter(body) {
        let Some(whole) = caps.get(0) else { continue };
        tokens.push((whole.start(), Token::Section(caps[1].to_string())));
    }
    for caps in DISPLAY_RE.captures_iter(body) {
        let Some(whole) = caps.get(0) else { continue };
        tokens.push((
            whole.start(),
            Token::Display {
                key: caps[1].to_string(),
            },
        ));
    }

    tokens.sort_by_key(|(start, _)| *start);
    assemble(tokens, catalog)
}

/// Returns every molecule key a template body mentions across all grammars.
///
/// Used to prefetch definitions before parsing; over-collecting across
/// dialects is harmless since unknown keys simply miss the catalog.
pub fn referenced_keys(body: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    let mut push = |key: &str| {
        if !keys.iter().any(|existing| existing == key) {
            keys.push(key.to_string());
        }
    };

    for re in [&*NEW_FIELD_RE, &*LEGACY_FIELD_RE, &*BRACE_FIELD_RE, &*DISPLAY_RE] {
        for caps in re.captures_iter(body) {
            push(&caps[1]);
        }
    }
    keys
}

/// Maps a width bucket name or bare percentage onto the 12-unit grid.
pub fn grid_span(width: &str) -> u8 {
    let trimmed = width.trim().trim_end_matches('%');
    let percent = match trimmed.to_ascii_lowercase().as_str() {
        "quarter" => 25,
        "third" => 33,
        "half" => 50,
        "three-quarters" => 75,
        "full" => 100,
        other => other.parse::<u32>().unwrap_or(0),
    };
    span_for_percent(percent)
}

fn span_for_percent(percent: u32) -> u8 {
    match percent {
        p if p >= 100 => 12,
        p if p >= 75 => 9,
        p if p >= 67 => 8,
        p if p >= 50 => 6,
        p if p >= 33 => 4,
        p if p >= 25 => 3,
        _ => 4,
    }
}

fn detect_dialect(body: &str) -> Option<&'static Regex> {
    [&*NEW_FIELD_RE, &*LEGACY_FIELD_RE, &*BRACE_FIELD_RE]
        .into_iter()
        .find(|re| re.is_match(body))
}

fn molecule_token(dialect_re: &Regex, caps: &regex::Captures<'_>) -> Token {
    if std::ptr::eq(dialect_re, &*BRACE_FIELD_RE) {
        let required_text = caps[3].trim().to_ascii_uppercase();
        return Token::Molecule {
            key: caps[1].to_string(),
            width: caps[2].to_string(),
            required: matches!(required_text.as_str(), "R" | "Y" | "1" | "TRUE"),
            force_upper: false,
            numeric_only: false,
            prompt: caps[4].to_string(),
        };
    }

    let flags = caps[3].to_ascii_uppercase();
    Token::Molecule {
        key: caps[1].to_string(),
        width: caps[2].to_string(),
        required: flags.contains('R'),
        force_upper: flags.contains('U'),
        numeric_only: flags.contains('N'),
        prompt: caps[4].to_string(),
    }
}

fn assemble(tokens: Vec<(usize, Token)>, catalog: &dyn FieldCatalog) -> Vec<TemplateField> {
    let mut fields = Vec::with_capacity(tokens.len());
    let mut row: u32 = 1;
    let mut row_used: u32 = 0;

    for (sort_order, (_, token)) in tokens.into_iter().enumerate() {
        match token {
            Token::Section(text) => {
                if row_used > 0 {
                    row += 1;
                    row_used = 0;
                }
                let mut field = TemplateField::section(text);
                field.row_number = row;
                field.sort_order = sort_order as u32;
                fields.push(field);
                row += 1;
            }
            Token::Molecule {
                key,
                width,
                required,
                force_upper,
                numeric_only,
                prompt,
            } => {
                let span = grid_span(&width);
                if row_used + u32::from(span) > 12 {
                    row += 1;
                    row_used = 0;
                }
                let definition = catalog.definition(&key);
                let prompt = if prompt.trim().is_empty() {
                    definition
                        .map(|def| def.label.clone())
                        .unwrap_or_else(|| key.clone())
                } else {
                    prompt
                };
                fields.push(TemplateField {
                    kind: FieldKind::Molecule,
                    filter_by: definition.and_then(|def| def.filter_by.clone()),
                    molecule_key: Some(key),
                    prompt,
                    grid_span: span,
                    required,
                    force_upper,
                    numeric_only,
                    row_number: row,
                    sort_order: sort_order as u32,
                });
                row_used += u32::from(span);
            }
            Token::Display { key } => {
                let definition = catalog.definition(&key);
                let span = definition
                    .and_then(|def| def.display_width)
                    .map(span_for_percent)
                    .unwrap_or(6);
                if row_used + u32::from(span) > 12 {
                    row += 1;
                    row_used = 0;
                }
                fields.push(TemplateField {
                    kind: FieldKind::Label,
                    prompt: definition
                        .map(|def| def.label.clone())
                        .unwrap_or_else(|| key.clone()),
                    filter_by: None,
                    molecule_key: Some(key),
                    grid_span: span,
                    required: false,
                    force_upper: false,
                    numeric_only: false,
                    row_number: row,
                    sort_order: sort_order as u32,
                });
                row_used += u32::from(span);
            }
        }
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::grid_span;

    #[test]
    fn named_buckets_and_percentages_agree() {
        assert_eq!(grid_span("half"), 6);
        assert_eq!(grid_span("50"), 6);
        assert_eq!(grid_span("50%"), 6);
        assert_eq!(grid_span("full"), 12);
        assert_eq!(grid_span("three-quarters"), 9);
        assert_eq!(grid_span("third"), 4);
        assert_eq!(grid_span("quarter"), 3);
    }

    #[test]
    fn thresholds_match_bucket_edges() {
        assert_eq!(grid_span("100"), 12);
        assert_eq!(grid_span("75"), 9);
        assert_eq!(grid_span("67"), 8);
        assert_eq!(grid_span("49"), 4);
        assert_eq!(grid_span("25"), 3);
        assert_eq!(grid_span("10"), 4);
        assert_eq!(grid_span("garbage"), 4);
    }
}
