//! Template use-case service.
//!
//! # Responsibility
//! - Provide stored-template fetch APIs for the request surface.
//! - Orchestrate parse: prefetch referenced molecule definitions, then hand
//!   the body to the grammar parsers.

use crate::model::molecule::{MoleculeDefinition, TenantId};
use crate::model::template::{TemplateField, TemplateRecord};
use crate::repo::catalog_repo::{CatalogRepository, RepoResult};
use crate::repo::template_repo::TemplateRepository;
use crate::template::parser::{parse_template, referenced_keys};
use std::collections::BTreeMap;

/// Use-case service wrapper for stored templates.
pub struct TemplateService<T: TemplateRepository> {
    repo: T,
}

impl<T: TemplateRepository> TemplateService<T> {
    pub fn new(repo: T) -> Self {
        Self { repo }
    }

    /// Lists templates for a tenant, optionally scoped to an activity type.
    pub fn list(
        &self,
        tenant: TenantId,
        activity_type: Option<&str>,
    ) -> RepoResult<Vec<TemplateRecord>> {
        self.repo.list(tenant, activity_type)
    }

    pub fn get(&self, tenant: TenantId, id: i64) -> RepoResult<Option<TemplateRecord>> {
        self.repo.get(tenant, id)
    }

    /// Fetches a template and parses it into ordered field descriptors.
    ///
    /// An unparseable body yields an empty field list, not an error; a
    /// missing template yields `None`.
    pub fn parse_fields(
        &self,
        tenant: TenantId,
        id: i64,
        catalog: &dyn CatalogRepository,
    ) -> RepoResult<Option<Vec<TemplateField>>> {
        let Some(record) = self.repo.get(tenant, id)? else {
            return Ok(None);
        };

        let mut definitions: BTreeMap<String, MoleculeDefinition> = BTreeMap::new();
        for key in referenced_keys(&record.body) {
            if let Some(definition) = catalog.definition(tenant, &key)? {
                definitions.insert(key, definition);
            }
        }

        Ok(Some(parse_template(&record.body, &definitions)))
    }
}
