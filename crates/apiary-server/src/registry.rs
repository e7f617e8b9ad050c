//! The service registry: write-once at startup, read-many after.
//!
//! The loader builds a [`Registry`] and the process wraps it in an `Arc`
//! shared with the dispatcher and the transport adapters. Nothing can be
//! added, removed or replaced after construction; there is no hot reload.

use std::collections::HashMap;
use std::sync::Arc;

/// One loaded service: its name, cached source and method table.
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    name: String,
    source: Arc<str>,
    methods: Vec<String>,
}

impl ServiceDefinition {
    pub(crate) fn new(name: String, source: Arc<str>, methods: Vec<String>) -> Self {
        ServiceDefinition { name, source, methods }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }

    /// The cached module source, re-instantiated per invocation.
    pub(crate) fn source(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }
}

/// Immutable mapping from service name to definition.
#[derive(Debug, Default)]
pub struct Registry {
    services: HashMap<String, ServiceDefinition>,
}

impl Registry {
    pub fn from_definitions(definitions: Vec<ServiceDefinition>) -> Self {
        let services = definitions
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();
        Registry { services }
    }

    pub fn get(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.get(name)
    }

    /// Service names, sorted for stable logs.
    pub fn service_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(name: &str, methods: &[&str]) -> ServiceDefinition {
        ServiceDefinition::new(
            name.to_string(),
            Arc::from("({})"),
            methods.iter().map(|m| m.to_string()).collect(),
        )
    }

    #[test]
    fn lookup_by_name_and_method() {
        let registry = Registry::from_definitions(vec![
            definition("user", &["read", "create"]),
            definition("country", &["read"]),
        ]);

        assert_eq!(registry.len(), 2);
        assert!(registry.get("user").unwrap().has_method("create"));
        assert!(!registry.get("user").unwrap().has_method("delete"));
        assert!(registry.get("city").is_none());
    }

    #[test]
    fn names_are_sorted() {
        let registry = Registry::from_definitions(vec![
            definition("user", &[]),
            definition("country", &[]),
        ]);

        assert_eq!(registry.service_names(), vec!["country", "user"]);
    }
}
