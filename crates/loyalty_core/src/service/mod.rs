//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into resolution-level APIs.
//! - Keep the excluded HTTP/UI layers decoupled from storage details.

pub mod generators;
pub mod resolver;
pub mod template_service;
