//! Resolver context for factory delegates.

use crate::constructor::InstanceArguments;
use crate::error::DiResult;
use crate::key::{ServiceKey, ServiceType};
use crate::registration::AnyArc;
use crate::traits::ResolverCore;

/// Context passed to factory delegates for resolving dependencies.
///
/// Every resolution made through the context is a new top-level resolution.
/// A delegate that, directly or indirectly, resolves the service it is
/// producing gets a circular dependency error.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{IocContainer, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let container = IocContainer::new();
/// container
///     .register_instance(Arc::new(Database { url: "postgres://localhost".to_string() }))
///     .unwrap();
/// container
///     .register_factory::<UserService, _>(Lifetime::Transient, |resolver| {
///         Ok(Arc::new(UserService { db: resolver.get_instance::<Database>()? }))
///     })
///     .unwrap();
///
/// let users = container.get_instance::<UserService>().unwrap();
/// assert_eq!(users.db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    resolver: &'a dyn ResolverCore,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(resolver: &'a dyn ResolverCore) -> Self {
        Self { resolver }
    }
}

impl ResolverCore for ResolverContext<'_> {
    fn resolve_any(&self, key: &ServiceKey) -> DiResult<AnyArc> {
        self.resolver.resolve_any(key)
    }

    fn resolve_any_with(&self, key: &ServiceKey, args: &InstanceArguments) -> DiResult<AnyArc> {
        self.resolver.resolve_any_with(key, args)
    }

    fn resolve_all(&self, service_type: &ServiceType) -> DiResult<Vec<AnyArc>> {
        self.resolver.resolve_all(service_type)
    }

    fn contains(&self, key: &ServiceKey) -> bool {
        self.resolver.contains(key)
    }
}
