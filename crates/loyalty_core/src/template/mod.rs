//! Template parsing and cascading-field machinery.
//!
//! # Responsibility
//! - Turn stored template strings into ordered field descriptors.
//! - Drive dependent-dropdown state from the parsed field set.

pub mod cascade;
pub mod parser;
