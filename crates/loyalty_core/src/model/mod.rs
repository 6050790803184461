//! Domain model for the tenant-scoped attribute catalog.
//!
//! # Responsibility
//! - Define canonical data structures used by resolution and templating.
//! - Normalize legacy storage aliases into closed enums at decode time.
//!
//! # Invariants
//! - `value_kind` is immutable after creation; stored encode/decode contracts
//!   depend on it.
//! - Value `code` is unique within `(molecule_id, category)`.

pub mod molecule;
pub mod template;
