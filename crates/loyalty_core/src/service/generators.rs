//! Registry of named scalar generators.
//!
//! System-generated scalars defer to an external computation identified by
//! name; the surrounding product registers its implementations here at
//! startup. The registry is the extension seam only — no generator logic
//! lives in this crate.

use crate::service::resolver::{EvalContext, ResolveResult};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// One named external computation backing a system-generated scalar.
pub trait ScalarGenerator {
    fn name(&self) -> &str;
    /// Computes the scalar for the given evaluation context.
    fn generate(&self, ctx: &EvalContext) -> ResolveResult<Option<String>>;
}

/// Registration errors for the generator registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorRegistryError {
    InvalidGeneratorName(String),
    DuplicateGeneratorName(String),
}

impl Display for GeneratorRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidGeneratorName(value) => write!(f, "generator name is invalid: {value}"),
            Self::DuplicateGeneratorName(value) => {
                write!(f, "generator name already registered: {value}")
            }
        }
    }
}

impl Error for GeneratorRegistryError {}

/// Runtime registry of scalar generators.
#[derive(Default)]
pub struct GeneratorRegistry {
    generators: BTreeMap<String, Arc<dyn ScalarGenerator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one generator implementation.
    pub fn register(
        &mut self,
        generator: Arc<dyn ScalarGenerator>,
    ) -> Result<(), GeneratorRegistryError> {
        let name = generator.name().trim().to_string();
        if !is_valid_generator_name(&name) {
            return Err(GeneratorRegistryError::InvalidGeneratorName(name));
        }
        if self.generators.contains_key(name.as_str()) {
            return Err(GeneratorRegistryError::DuplicateGeneratorName(name));
        }

        self.generators.insert(name, generator);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ScalarGenerator>> {
        self.generators.get(name.trim()).cloned()
    }

    /// Returns sorted generator names.
    pub fn names(&self) -> Vec<String> {
        self.generators.keys().cloned().collect()
    }
}

fn is_valid_generator_name(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::{GeneratorRegistry, GeneratorRegistryError, ScalarGenerator};
    use crate::service::resolver::{EvalContext, ResolveResult};
    use std::sync::Arc;

    struct FixedGenerator {
        name: String,
        value: String,
    }

    impl ScalarGenerator for FixedGenerator {
        fn name(&self) -> &str {
            &self.name
        }

        fn generate(&self, _ctx: &EvalContext) -> ResolveResult<Option<String>> {
            Ok(Some(self.value.clone()))
        }
    }

    fn fixed(name: &str, value: &str) -> Arc<FixedGenerator> {
        Arc::new(FixedGenerator {
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    #[test]
    fn registers_and_resolves_generator() {
        let mut registry = GeneratorRegistry::new();
        registry
            .register(fixed("member_age", "42"))
            .expect("generator should register");

        let generator = registry.get("member_age").expect("generator present");
        let value = generator
            .generate(&EvalContext::default())
            .expect("generate succeeds");
        assert_eq!(value.as_deref(), Some("42"));
    }

    #[test]
    fn rejects_invalid_or_duplicate_names() {
        let mut registry = GeneratorRegistry::new();
        let invalid = registry.register(fixed("Member Age", "42"));
        assert!(matches!(
            invalid,
            Err(GeneratorRegistryError::InvalidGeneratorName(_))
        ));

        registry
            .register(fixed("member_age", "42"))
            .expect("first registration should succeed");
        let duplicate = registry.register(fixed("member_age", "43"));
        assert!(matches!(
            duplicate,
            Err(GeneratorRegistryError::DuplicateGeneratorName(_))
        ));
    }
}
