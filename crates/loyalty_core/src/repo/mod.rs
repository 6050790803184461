//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for the catalog.
//! - Isolate SQLite query details from resolver/template orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic absence (`Option`) separately from DB
//!   transport errors; connectivity failures are never folded into "absent".
//! - Table/column names spliced into SQL come only from fixed allow-lists.

pub mod catalog_repo;
pub mod link_repo;
pub mod template_repo;
