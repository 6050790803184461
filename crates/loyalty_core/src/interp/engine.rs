//! Atom interpolation engine.
//!
//! # Responsibility
//! - Parse `{{source,identifier,field[,length][,case]}}` placeholders.
//! - Resolve each atom through the molecule resolver or the allow-listed
//!   linked-table adapter.
//! - Apply the transform pipeline: trim, truncate-only, then case fold.
//!
//! # Invariants
//! - Atoms with fewer than three parameters are returned verbatim; this
//!   engine never raises to its caller.
//! - Each atom resolves independently and sequentially; a failed atom yields
//!   an empty string without aborting the remaining atoms.
//! - Truncation never pads, and always happens before the case transform.

use crate::repo::catalog_repo::CatalogRepository;
use crate::repo::link_repo::{parse_entity, LinkSource};
use crate::model::molecule::TenantId;
use crate::service::resolver::{EvalContext, MoleculeResolver};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

static ATOM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{[^{}]*\}\}").expect("valid atom regex"));

/// Where an atom's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomSource {
    /// Resolved through the molecule resolver.
    Molecule,
    /// Fetched from an allow-listed linked table row.
    Table,
}

/// Case transform applied after truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTransform {
    Upper,
    Lower,
    /// Uppercase first character, lowercase the remainder (whole string, not
    /// per word).
    Proper,
}

/// One parsed placeholder; ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAtom {
    pub source: AtomSource,
    pub identifier: String,
    pub field: String,
    pub length: Option<usize>,
    pub case: Option<CaseTransform>,
}

/// Parses the inner text of one `{{…}}` span.
///
/// Returns `None` for anything the grammar does not cover (fewer than three
/// parameters, unknown source); such atoms are left verbatim.
pub fn parse_atom(inner: &str) -> Option<ParsedAtom> {
    let params: Vec<&str> = inner.split(',').map(str::trim).collect();
    if params.len() < 3 {
        return None;
    }

    let source = match params[0].to_ascii_uppercase().as_str() {
        "M" => AtomSource::Molecule,
        "T" => AtomSource::Table,
        _ => return None,
    };

    let mut length = None;
    let mut case = None;
    for param in &params[3..] {
        if case.is_none() && length.is_none() {
            if let Ok(number) = param.parse::<usize>() {
                if number > 0 {
                    length = Some(number);
                }
                continue;
            }
        }
        if case.is_none() {
            case = parse_case(param);
        }
    }

    Some(ParsedAtom {
        source,
        identifier: params[1].to_string(),
        field: params[2].to_string(),
        length,
        case,
    })
}

fn parse_case(value: &str) -> Option<CaseTransform> {
    match value.to_ascii_uppercase().as_str() {
        "U" => Some(CaseTransform::Upper),
        "L" => Some(CaseTransform::Lower),
        "P" => Some(CaseTransform::Proper),
        _ => None,
    }
}

/// Transform pipeline: trim, truncate-only, then case fold.
fn apply_transforms(raw: &str, length: Option<usize>, case: Option<CaseTransform>) -> String {
    let trimmed = raw.trim();
    let truncated: String = match length {
        Some(limit) => trimmed.chars().take(limit).collect(),
        None => trimmed.to_string(),
    };

    match case {
        None => truncated,
        Some(CaseTransform::Upper) => truncated.to_uppercase(),
        Some(CaseTransform::Lower) => truncated.to_lowercase(),
        Some(CaseTransform::Proper) => {
            let mut chars = truncated.chars();
            match chars.next() {
                None => truncated,
                Some(first) => {
                    let mut result: String = first.to_uppercase().collect();
                    result.push_str(&chars.as_str().to_lowercase());
                    result
                }
            }
        }
    }
}

/// Interpolation engine bound to one request's tenant and link context.
pub struct AtomEngine<'a, R: CatalogRepository> {
    resolver: &'a mut MoleculeResolver<R>,
    links: &'a dyn LinkSource,
    tenant: TenantId,
    ctx: EvalContext,
}

impl<'a, R: CatalogRepository> AtomEngine<'a, R> {
    pub fn new(
        resolver: &'a mut MoleculeResolver<R>,
        links: &'a dyn LinkSource,
        tenant: TenantId,
        ctx: EvalContext,
    ) -> Self {
        Self {
            resolver,
            links,
            tenant,
            ctx,
        }
    }

    /// Substitutes every `{{…}}` span in `text`.
    ///
    /// Spans resolve independently; one atom's resolution never sees
    /// another's result, and a failure empties only its own span.
    pub fn resolve_atoms(&mut self, text: &str) -> String {
        let mut output = String::with_capacity(text.len());
        let mut last_end = 0;

        for span in ATOM_RE.find_iter(text) {
            output.push_str(&text[last_end..span.start()]);
            let inner = &text[span.start() + 2..span.end() - 2];
            match parse_atom(inner) {
                Some(atom) => output.push_str(&self.resolve_one(&atom)),
                None => output.push_str(span.as_str()),
            }
            last_end = span.end();
        }
        output.push_str(&text[last_end..]);
        output
    }

    fn resolve_one(&mut self, atom: &ParsedAtom) -> String {
        let raw = match atom.source {
            AtomSource::Molecule => {
                match self
                    .resolver
                    .evaluate(self.tenant, &atom.identifier, &self.ctx)
                {
                    Ok(Some(resolved)) => resolved.field(&atom.field).to_string(),
                    Ok(None) => String::new(),
                    Err(err) => {
                        debug!(
                            "event=atom_resolve module=interp status=error source=molecule key={} error={}",
                            atom.identifier, err
                        );
                        String::new()
                    }
                }
            }
            AtomSource::Table => {
                let Some(entity) = parse_entity(&atom.identifier) else {
                    return String::new();
                };
                match self.links.linked_field(entity, &atom.field) {
                    Ok(Some(value)) => value,
                    Ok(None) => String::new(),
                    Err(err) => {
                        debug!(
                            "event=atom_resolve module=interp status=error source=table entity={} error={}",
                            atom.identifier, err
                        );
                        String::new()
                    }
                }
            }
        };

        apply_transforms(&raw, atom.length, atom.case)
    }
}
