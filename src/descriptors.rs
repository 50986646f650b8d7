//! Service descriptors for introspection and diagnostics.

use crate::key::ServiceKey;
use crate::lifetime::Lifetime;

/// Snapshot of one registration and the state of its compiled factory.
///
/// With the `diagnostics` feature descriptors implement `serde::Serialize`,
/// so a container's configuration can be dumped as JSON for inspection.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Constructor, Injectable, IocContainer, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct Database;
/// impl Injectable for Database {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new(|| Database)]
///     }
/// }
///
/// let container = IocContainer::new();
/// container.register_singleton::<Database, Database>().unwrap();
/// container.register_named_instance(Arc::new(5432u32), "database_port").unwrap();
///
/// let descriptors = container.service_descriptors();
/// assert_eq!(descriptors.len(), 2);
///
/// let db = &descriptors[0];
/// assert!(db.type_name().contains("Database"));
/// assert_eq!(db.lifetime, Lifetime::Singleton);
/// assert!(!db.compiled);
///
/// container.get_instance::<Database>().unwrap();
/// assert!(container.service_descriptors()[0].compiled);
///
/// let port = &descriptors[1];
/// assert_eq!(port.service_name(), Some("database_port"));
/// assert_eq!(port.implementation, None);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize))]
pub struct ServiceDescriptor {
    /// Service type name
    pub service: &'static str,
    /// Registration name for named services
    pub name: Option<String>,
    /// Service lifetime
    pub lifetime: Lifetime,
    /// Implementation type name, `None` for delegate registrations
    pub implementation: Option<&'static str>,
    /// Whether a compiled routine or a cached delegate result currently exists
    pub compiled: bool,
    /// Constructor parameters skipped by the current factory because they were
    /// not registered
    pub skipped_parameters: Vec<&'static str>,
    #[cfg_attr(feature = "diagnostics", serde(skip))]
    pub(crate) key: ServiceKey,
}

impl ServiceDescriptor {
    /// Get the service name for named services, or None for unnamed services
    pub fn service_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Get the service type name
    pub fn type_name(&self) -> &'static str {
        self.service
    }

    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    /// The key the registration is stored under.
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }
}

#[cfg(all(test, feature = "diagnostics"))]
mod tests {
    use crate::{IocContainer, Lifetime};
    use std::sync::Arc;

    #[test]
    fn descriptors_serialize_to_json() {
        let container = IocContainer::new();
        container
            .register_named_factory::<u64, _>(Lifetime::Transient, "ticks", |_| Ok(Arc::new(7u64)))
            .unwrap();

        let json = serde_json::to_value(container.service_descriptors()).unwrap();
        let descriptor = &json[0];
        assert_eq!(descriptor["service"], "u64");
        assert_eq!(descriptor["name"], "ticks");
        assert_eq!(descriptor["lifetime"], "Transient");
        assert_eq!(descriptor["compiled"], false);
        assert!(descriptor["implementation"].is_null());
        assert!(descriptor.get("key").is_none());
    }
}
