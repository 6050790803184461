//! Molecule value resolver.
//!
//! # Responsibility
//! - Provide encode/decode/definition/evaluate over one catalog entry.
//! - Dispatch evaluation on the canonical `ValueKind` variants.
//! - Select point-in-time values for historized attributes.
//!
//! # Invariants
//! - Temporal selection picks the greatest `effective_date <= as_of`; ties on
//!   the effective date are broken by the most recently written record.
//! - `encode` is idempotent for repeated identical text and race-safe against
//!   concurrent first encodes (closed in the repository layer).
//! - Storage failures propagate as `ResolveError::Repo`, never as `NotFound`.

use crate::cache::MoleculeCache;
use crate::model::molecule::{
    normalize_label, MoleculeConfig, MoleculeValue, ResolvedItem, TenantId, ValueKind,
};
use crate::repo::catalog_repo::{CatalogRepository, RepoError};
use crate::service::generators::GeneratorRegistry;
use chrono::{Local, NaiveDate};
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Resolver-level error taxonomy surfaced to the request layer.
#[derive(Debug)]
pub enum ResolveError {
    /// Unknown molecule, value, or reference id for the tenant.
    NotFound,
    /// Operation unsupported for the molecule's value kind.
    InvalidKind {
        kind: ValueKind,
        operation: &'static str,
    },
    /// Evaluation needs context that was not supplied.
    ContextRequired(&'static str),
    /// Encode input was empty after trimming.
    EmptyValue,
    /// A system-generated scalar names a generator nobody registered.
    UnknownGenerator(String),
    /// Persistence-layer failure, kept distinct from "record absent".
    Repo(RepoError),
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "molecule or value not found"),
            Self::InvalidKind { kind, operation } => {
                write!(f, "operation `{operation}` is unsupported for {kind:?}")
            }
            Self::ContextRequired(what) => write!(f, "evaluation requires {what}"),
            Self::EmptyValue => write!(f, "value text is empty after trimming"),
            Self::UnknownGenerator(name) => write!(f, "unregistered scalar generator: {name}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ResolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ResolveError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Per-request evaluation context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalContext {
    pub member_id: Option<i64>,
    /// Point-in-time date for historized attributes; defaults to today.
    pub as_of: Option<NaiveDate>,
}

impl EvalContext {
    pub fn for_member(member_id: i64) -> Self {
        Self {
            member_id: Some(member_id),
            as_of: None,
        }
    }

    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }
}

/// One evaluation outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Constant, generated, or historized text value.
    Scalar(String),
    /// A list/lookup option row.
    Item(ResolvedItem),
}

impl Resolved {
    /// Returns the named field of the resolved value; unknown fields and
    /// scalars fall back to the display text.
    pub fn field(&self, field: &str) -> &str {
        match self {
            Self::Scalar(text) => text,
            Self::Item(item) => match field.trim().to_ascii_lowercase().as_str() {
                "code" => &item.code,
                "category" => &item.category,
                _ => &item.label,
            },
        }
    }

    /// Returns the user-facing display text.
    pub fn display(&self) -> &str {
        match self {
            Self::Scalar(text) => text,
            Self::Item(item) => &item.label,
        }
    }
}

/// Resolver over one catalog repository plus an explicit config cache.
pub struct MoleculeResolver<R: CatalogRepository> {
    repo: R,
    cache: MoleculeCache,
    generators: GeneratorRegistry,
}

impl<R: CatalogRepository> MoleculeResolver<R> {
    /// Creates a resolver; the cache is constructed at startup and owned
    /// here rather than living in ambient global state.
    pub fn new(repo: R, cache: MoleculeCache) -> Self {
        Self {
            repo,
            cache,
            generators: GeneratorRegistry::new(),
        }
    }

    pub fn with_generators(repo: R, cache: MoleculeCache, generators: GeneratorRegistry) -> Self {
        Self {
            repo,
            cache,
            generators,
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Returns the merged configuration for a molecule.
    ///
    /// # Errors
    /// - `NotFound` when the key is unknown for the tenant.
    pub fn definition(&mut self, tenant: TenantId, key: &str) -> ResolveResult<MoleculeConfig> {
        if let Some(config) = self.cache.get(tenant, key) {
            return Ok(config);
        }

        let config = self.repo.config(tenant, key)?.ok_or(ResolveError::NotFound)?;
        self.cache.insert(tenant, key, config.clone());
        Ok(config)
    }

    /// Dictionary-encodes `text` into a value reference id, inserting a new
    /// value row when no case-insensitive match exists.
    ///
    /// # Errors
    /// - `InvalidKind` for Scalar/Lookup molecules (not encodable).
    /// - `EmptyValue` when the trimmed text is empty.
    pub fn encode(&mut self, tenant: TenantId, key: &str, text: &str) -> ResolveResult<i64> {
        let config = self.definition(tenant, key)?;
        let definition = &config.definition;
        if !definition.value_kind.is_encodable() {
            return Err(ResolveError::InvalidKind {
                kind: definition.value_kind,
                operation: "encode",
            });
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ResolveError::EmptyValue);
        }

        let normalized = normalize_label(trimmed);
        if let Some(existing) = self
            .repo
            .value_by_label(definition.id, "", &normalized)?
        {
            return Ok(existing.id);
        }

        let interned = self.repo.intern_value(definition.id, "", trimmed)?;
        // The cached value set no longer matches storage.
        self.cache.invalidate(tenant, key);
        Ok(interned.id)
    }

    /// Reverse lookup of a reference id produced by `encode`.
    ///
    /// # Errors
    /// - `NotFound` when the id does not belong to that molecule/tenant.
    pub fn decode(&mut self, tenant: TenantId, key: &str, reference_id: i64) -> ResolveResult<String> {
        let config = self.definition(tenant, key)?;
        let definition = &config.definition;
        if !definition.value_kind.is_encodable() {
            return Err(ResolveError::InvalidKind {
                kind: definition.value_kind,
                operation: "decode",
            });
        }

        let value = self
            .repo
            .value_by_id(definition.id, reference_id)?
            .ok_or(ResolveError::NotFound)?;
        Ok(value.label)
    }

    /// Evaluates a molecule for the given context, dispatching on value kind.
    ///
    /// Returns `Ok(None)` when no value applies (contextual molecule without
    /// a member, empty value set, no qualifying history record).
    pub fn evaluate(
        &mut self,
        tenant: TenantId,
        key: &str,
        ctx: &EvalContext,
    ) -> ResolveResult<Option<Resolved>> {
        let config = self.definition(tenant, key)?;
        let definition = &config.definition;

        if definition.historized {
            let Some(member_id) = ctx.member_id else {
                return Err(ResolveError::ContextRequired("member_id"));
            };
            let as_of = ctx.as_of.unwrap_or_else(today);
            let value = self
                .repo
                .history_value_as_of(definition.id, member_id, as_of)?;
            debug!(
                "event=evaluate module=resolver kind=historized molecule={} found={}",
                definition.molecule_key,
                value.is_some()
            );
            return Ok(value.map(Resolved::Scalar));
        }

        match definition.value_kind {
            ValueKind::Scalar => {
                if let Some(name) = &definition.generator {
                    let generator = self
                        .generators
                        .get(name)
                        .ok_or_else(|| ResolveError::UnknownGenerator(name.clone()))?;
                    return generator.generate(ctx).map(|v| v.map(Resolved::Scalar));
                }
                Ok(definition.constant_value.clone().map(Resolved::Scalar))
            }
            ValueKind::List | ValueKind::EmbeddedList => {
                if definition.contextual {
                    let Some(member_id) = ctx.member_id else {
                        return Ok(None);
                    };
                    let as_of = ctx.as_of.unwrap_or_else(today);
                    let Some(code) = self
                        .repo
                        .history_value_as_of(definition.id, member_id, as_of)?
                    else {
                        return Ok(None);
                    };
                    return Ok(Some(match self.repo.value_by_code(definition.id, &code)? {
                        Some(value) => Resolved::Item(value.into()),
                        None => Resolved::Scalar(code),
                    }));
                }

                Ok(default_value(&config.values).map(|value| Resolved::Item(value.clone().into())))
            }
            ValueKind::Lookup => {
                let binding = config.lookup.as_ref().ok_or(ResolveError::NotFound)?;
                let rows = self.repo.lookup_rows(binding, tenant)?;
                Ok(rows.into_iter().next().map(Resolved::Item))
            }
        }
    }
}

/// Default/first value of a list: lowest sort order, then lowest id.
fn default_value(values: &[MoleculeValue]) -> Option<&MoleculeValue> {
    values
        .iter()
        .min_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.id.cmp(&b.id)))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
