//! Placeholder interpolation over free text.
//!
//! # Responsibility
//! - Scan arbitrary text for `{{…}}` atoms and substitute resolved values.
//! - Keep substitution fail-soft: one bad atom never blanks the message.

pub mod engine;
