//! Parsed template field descriptors.
//!
//! # Responsibility
//! - Define the field shape produced by the template parser and consumed by
//!   form rendering and the cascade controller.
//!
//! # Invariants
//! - `row_number` and `sort_order` are assigned by the parser; fields sharing
//!   a row render together, ordered ascending by `sort_order`.

use serde::{Deserialize, Serialize};

/// Discriminator for a parsed template field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Editable input bound to a molecule.
    Molecule,
    /// Non-interactive section label.
    Text,
    /// Read-only resolved-value display bound to a molecule.
    Label,
}

/// One ordered field descriptor produced from a template string.
///
/// Not persisted as such; recomputed from the template body on each parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateField {
    pub kind: FieldKind,
    /// Bound molecule key; `None` for section labels.
    pub molecule_key: Option<String>,
    /// Prompt or section text shown to the operator.
    pub prompt: String,
    /// Span on a 12-unit grid derived from the width bucket/percentage.
    pub grid_span: u8,
    pub required: bool,
    /// Force-uppercase input flag (`U`, new dialect only).
    pub force_upper: bool,
    /// Numeric-only input flag (`N`, new dialect only).
    pub numeric_only: bool,
    /// Parent molecule key when this field's options cascade from another.
    pub filter_by: Option<String>,
    pub row_number: u32,
    pub sort_order: u32,
}

impl TemplateField {
    /// Creates a section-label field; span is always the full row.
    pub fn section(text: impl Into<String>) -> Self {
        Self {
            kind: FieldKind::Text,
            molecule_key: None,
            prompt: text.into(),
            grid_span: 12,
            required: false,
            force_upper: false,
            numeric_only: false,
            filter_by: None,
            row_number: 0,
            sort_order: 0,
        }
    }
}

/// Stored template row fetched by the template repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: i64,
    pub tenant_id: crate::model::molecule::TenantId,
    pub name: String,
    /// Optional activity-type scope used by template listing.
    pub activity_type: Option<String>,
    /// Opaque template body authored by the excluded admin UI.
    pub body: String,
}
