//! Engine bindings by scope name.

use crate::error::{Error, Result};
use crate::record::Record;
use sqlmodel_plus_core::Engine;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// Scope used by record types that do not declare one.
pub const DEFAULT_SCOPE: &str = "default";

/// Maps scope names to the engines record types in that scope use.
///
/// The registry is owned by the caller and passed to every facade
/// operation. It is internally synchronized, so a single registry can be
/// shared by reference across threads. Binding a scope again replaces the
/// previous engine.
///
/// # Example
///
/// ```ignore
/// let registry = EngineRegistry::new();
/// registry.set_engine(DEFAULT_SCOPE, create_engine("sqlite://")?)?;
/// Hero::create_tables(&registry, &CreateOptions::default())?;
/// ```
#[derive(Default)]
pub struct EngineRegistry {
    engines: RwLock<HashMap<String, Engine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `engine` to `scope`, replacing any earlier binding.
    pub fn set_engine(&self, scope: impl Into<String>, engine: Engine) -> Result<()> {
        let scope = scope.into();
        tracing::info!(scope = %scope, url = engine.url(), "engine bound");
        self.engines
            .write()
            .map_err(|_| Error::RegistryPoisoned)?
            .insert(scope, engine);
        Ok(())
    }

    /// Bind `engine` to the scope of record type `M`.
    pub fn bind<M: Record>(&self, engine: Engine) -> Result<()> {
        self.set_engine(M::scope(), engine)
    }

    /// The engine bound to `scope`.
    pub fn engine(&self, scope: &str) -> Result<Engine> {
        self.engines
            .read()
            .map_err(|_| Error::RegistryPoisoned)?
            .get(scope)
            .cloned()
            .ok_or_else(|| Error::EngineNotSet {
                scope: scope.to_string(),
            })
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.engines
            .read()
            .is_ok_and(|engines| engines.contains_key(scope))
    }

    /// Remove the binding for `scope`, returning its engine.
    pub fn unbind(&self, scope: &str) -> Result<Option<Engine>> {
        let removed = self
            .engines
            .write()
            .map_err(|_| Error::RegistryPoisoned)?
            .remove(scope);
        if removed.is_some() {
            tracing::debug!(scope, "engine unbound");
        }
        Ok(removed)
    }

    /// Remove every binding.
    pub fn clear(&self) -> Result<()> {
        self.engines
            .write()
            .map_err(|_| Error::RegistryPoisoned)?
            .clear();
        Ok(())
    }

    /// Bound scope names, sorted.
    pub fn scopes(&self) -> Result<Vec<String>> {
        let mut scopes: Vec<String> = self
            .engines
            .read()
            .map_err(|_| Error::RegistryPoisoned)?
            .keys()
            .cloned()
            .collect();
        scopes.sort();
        Ok(scopes)
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("scopes", &self.scopes().unwrap_or_default())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlmodel_plus_sqlite::create_engine;

    #[test]
    fn test_missing_scope_is_engine_not_set() {
        let registry = EngineRegistry::new();
        let err = registry.engine(DEFAULT_SCOPE).unwrap_err();
        assert!(matches!(err, Error::EngineNotSet { ref scope } if scope == "default"));
        assert!(!registry.contains(DEFAULT_SCOPE));
    }

    #[test]
    fn test_last_binding_wins() {
        let registry = EngineRegistry::new();
        let first = create_engine("sqlite://").unwrap();
        let second = create_engine("sqlite:///:memory:").unwrap();
        registry.set_engine("main", first.clone()).unwrap();
        registry.set_engine("main", second.clone()).unwrap();

        let bound = registry.engine("main").unwrap();
        assert!(bound.same_backend(&second));
        assert!(!bound.same_backend(&first));
        assert_eq!(registry.scopes().unwrap(), vec!["main".to_string()]);
    }

    #[test]
    fn test_unbind_and_clear() {
        let registry = EngineRegistry::new();
        registry
            .set_engine("a", create_engine("sqlite://").unwrap())
            .unwrap();
        registry
            .set_engine("b", create_engine("sqlite://").unwrap())
            .unwrap();
        assert_eq!(registry.scopes().unwrap(), vec!["a", "b"]);

        assert!(registry.unbind("a").unwrap().is_some());
        assert!(registry.unbind("a").unwrap().is_none());
        assert!(registry.contains("b"));

        registry.clear().unwrap();
        assert!(registry.scopes().unwrap().is_empty());
        assert!(format!("{registry:?}").contains("EngineRegistry"));
    }
}
