//! Core resolution and templating logic for the loyalty back office.
//!
//! The crate owns the molecule attribute model (tenant-scoped typed
//! attributes), value resolution with point-in-time semantics, the template
//! field grammars, cascading field dependencies, and `{{…}}` atom
//! interpolation. Transport, schema authoring, and UI rendering live in
//! excluded collaborators.

pub mod cache;
pub mod db;
pub mod interp;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod template;

pub use cache::MoleculeCache;
pub use interp::engine::{parse_atom, AtomEngine, AtomSource, CaseTransform, ParsedAtom};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::molecule::{
    InputType, LookupBinding, MoleculeConfig, MoleculeDefinition, MoleculeValue, ResolvedItem,
    ScalarType, TenantId, ValueKind,
};
pub use model::template::{FieldKind, TemplateField, TemplateRecord};
pub use repo::catalog_repo::{
    CatalogRepository, NewDefinition, NewValue, RepoError, RepoResult, SqliteCatalogRepository,
};
pub use repo::link_repo::{LinkContext, LinkSource, LinkedEntity, SqliteLinkRepository};
pub use repo::template_repo::{SqliteTemplateRepository, TemplateRepository};
pub use service::generators::{GeneratorRegistry, GeneratorRegistryError, ScalarGenerator};
pub use service::resolver::{EvalContext, MoleculeResolver, Resolved, ResolveError, ResolveResult};
pub use service::template_service::TemplateService;
pub use template::cascade::{dependency_graph, CascadeController, ReloadTicket};
pub use template::parser::{grid_span, parse_template, referenced_keys, FieldCatalog, NoCatalog};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
