use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::debug;

use crate::error::RequestError;

use super::LoadTest;
use super::builtins::register_builtins;

/// Builds a fresh test for one run.
pub type LoadTestFactory = Arc<dyn Fn() -> Arc<dyn LoadTest> + Send + Sync>;

/// Maps the class name carried in Start frames to a test factory.
#[derive(Default)]
pub struct RequestRegistry {
    factories: RwLock<BTreeMap<String, LoadTestFactory>>,
}

impl RequestRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the builtin test types.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        register_builtins(&registry);
        registry
    }

    /// Registers `factory` under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error when `name` is already taken.
    pub fn register(&self, name: &str, factory: LoadTestFactory) -> Result<(), RequestError> {
        let mut factories = self
            .factories
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if factories.contains_key(name) {
            return Err(RequestError::DuplicateType {
                name: name.to_owned(),
            });
        }
        debug!("Registered request type {}", name);
        factories.insert(name.to_owned(), factory);
        Ok(())
    }

    /// Builds a new test of type `name`, if one is registered.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn LoadTest>> {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name.trim())
            .cloned()?;
        Some(factory())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(name.trim())
    }

    /// Registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.factories
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for RequestRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Process-wide registry, seeded with the builtin test types.
pub fn request_registry() -> &'static Arc<RequestRegistry> {
    static REGISTRY: OnceLock<Arc<RequestRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Arc::new(RequestRegistry::with_builtins()))
}
