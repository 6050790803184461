//! Molecule definition and value records.
//!
//! # Responsibility
//! - Define the configurable field primitive (the molecule) and its variants.
//! - Keep alias normalization for stored discriminators in one place.
//!
//! # Invariants
//! - `ValueKind` is a closed set; unknown stored kinds are rejected at read
//!   time instead of being carried around as strings.
//! - `normalized_label` is always the trimmed, lowercased label.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a tenant.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type TenantId = Uuid;

/// Variant discriminator for a molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Fixed or system-generated single value.
    Scalar,
    /// Internally managed pick-list with owned value rows.
    List,
    /// Externally looked-up reference; no owned value rows.
    Lookup,
    /// Categorized embedded list; value rows carry a category.
    EmbeddedList,
}

impl ValueKind {
    /// Returns whether this kind owns value rows and supports encode/decode.
    pub fn is_encodable(self) -> bool {
        matches!(self, Self::List | Self::EmbeddedList)
    }
}

/// Scalar payload type for `ValueKind::Scalar` molecules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Text,
    Numeric,
    Date,
}

/// Widget selection hint for list-like molecules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    Dropdown,
    Typeahead,
}

/// Tenant-scoped, named, typed attribute definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoleculeDefinition {
    pub id: i64,
    pub tenant_id: TenantId,
    /// Stable key used by templates and interpolation placeholders.
    pub molecule_key: String,
    pub label: String,
    pub value_kind: ValueKind,
    /// Meaningful only when `value_kind == ValueKind::Scalar`.
    pub scalar_type: Option<ScalarType>,
    /// Constant payload for plain scalars.
    pub constant_value: Option<String>,
    /// Named external computation for system-generated scalars.
    pub generator: Option<String>,
    /// Meaningful for list-like and lookup molecules.
    pub input_type: Option<InputType>,
    /// Display width as a percentage hint for read-only rendering.
    pub display_width: Option<u32>,
    /// Whether evaluation depends on a member context.
    pub contextual: bool,
    /// Whether the attribute is historized per member (point-in-time lookup).
    pub historized: bool,
    /// Parent molecule key for cascading template fields.
    pub filter_by: Option<String>,
}

/// Owned value row for List/EmbeddedList molecules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoleculeValue {
    pub id: i64,
    pub molecule_id: i64,
    pub code: String,
    pub label: String,
    /// Empty string for plain lists; EmbeddedList rows carry a category.
    pub category: String,
    /// Parent value code used to scope cascaded option reloads.
    pub parent_code: Option<String>,
    pub sort_order: i64,
}

/// External table binding for Lookup molecules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupBinding {
    pub molecule_id: i64,
    pub table_name: String,
    pub code_column: String,
    pub name_column: String,
}

/// Merged configuration returned by `get_definition`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoleculeConfig {
    pub definition: MoleculeDefinition,
    /// Owned value rows; empty for Scalar and Lookup molecules.
    pub values: Vec<MoleculeValue>,
    /// Present only for Lookup molecules.
    pub lookup: Option<LookupBinding>,
}

/// One resolved option/value as seen by templates and interpolation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedItem {
    pub code: String,
    pub label: String,
    pub category: String,
}

impl From<MoleculeValue> for ResolvedItem {
    fn from(value: MoleculeValue) -> Self {
        Self {
            code: value.code,
            label: value.label,
            category: value.category,
        }
    }
}

/// Parses a stored kind discriminator, accepting legacy aliases.
///
/// Aliases are normalized here once; downstream code only ever sees the
/// canonical enum.
pub fn parse_value_kind(value: &str) -> Option<ValueKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "scalar" | "constant" => Some(ValueKind::Scalar),
        "list" | "internal_list" => Some(ValueKind::List),
        "lookup" | "external" | "external_lookup" => Some(ValueKind::Lookup),
        "embedded_list" | "categorized_list" => Some(ValueKind::EmbeddedList),
        _ => None,
    }
}

/// Canonical storage form for a kind discriminator.
pub fn value_kind_to_db(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Scalar => "scalar",
        ValueKind::List => "list",
        ValueKind::Lookup => "lookup",
        ValueKind::EmbeddedList => "embedded_list",
    }
}

pub fn parse_scalar_type(value: &str) -> Option<ScalarType> {
    match value.trim().to_ascii_lowercase().as_str() {
        "text" => Some(ScalarType::Text),
        "numeric" | "number" => Some(ScalarType::Numeric),
        "date" => Some(ScalarType::Date),
        _ => None,
    }
}

pub fn scalar_type_to_db(value: ScalarType) -> &'static str {
    match value {
        ScalarType::Text => "text",
        ScalarType::Numeric => "numeric",
        ScalarType::Date => "date",
    }
}

pub fn parse_input_type(value: &str) -> Option<InputType> {
    match value.trim().to_ascii_lowercase().as_str() {
        "dropdown" | "select" => Some(InputType::Dropdown),
        "typeahead" | "autocomplete" => Some(InputType::Typeahead),
        _ => None,
    }
}

pub fn input_type_to_db(value: InputType) -> &'static str {
    match value {
        InputType::Dropdown => "dropdown",
        InputType::Typeahead => "typeahead",
    }
}

/// Normalizes a user-entered value label for dictionary-encoding equality.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Derives a storage code slug from a value label.
pub fn code_slug(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    let mut last_was_separator = true;
    for ch in label.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_separator = false;
        } else if !last_was_separator {
            slug.push('_');
            last_was_separator = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push('_');
    }
    slug
}
