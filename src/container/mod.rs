//! The public container.
//!
//! [`IocContainer`] is both the registration surface and a [`Resolver`]. It
//! can be shared across threads; registrations may be added or replaced at
//! any time, and replacing a registration invalidates every factory compiled
//! on top of the old one.
//!
//! [`Resolver`]: crate::Resolver

use std::fmt;
use std::sync::Arc;

use crate::constructor::{ConstructorChooser, Implements, Injectable, InstanceArguments, MostResolvableConstructorChooser};
use crate::context::ResolverContext;
use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::key::{ServiceKey, ServiceType};
use crate::lifetime::Lifetime;
use crate::observer::{DiObserver, Observers};
use crate::registration::{AnyArc, ServiceRegistration};
use crate::registry::{ServiceRegistrationManager, ServiceRegistry};
use crate::traits::ResolverCore;

/// Dependency injection container.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Constructor, Injectable, IocContainer, Resolver};
/// use std::sync::Arc;
///
/// struct Config { url: String }
/// struct Repository { config: Arc<Config> }
///
/// impl Injectable for Repository {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new(|config: Arc<Config>| Repository { config })]
///     }
/// }
///
/// let container = IocContainer::new();
/// container.register_instance(Arc::new(Config { url: "postgres://localhost".into() })).unwrap();
/// container.register_singleton::<Repository, Repository>().unwrap();
///
/// let repo = container.get_instance::<Repository>().unwrap();
/// assert_eq!(repo.config.url, "postgres://localhost");
/// assert!(Arc::ptr_eq(&repo, &container.get_instance::<Repository>().unwrap()));
/// ```
#[derive(Clone)]
pub struct IocContainer {
    manager: Arc<ServiceRegistrationManager>,
}

impl IocContainer {
    /// Creates a container with the default constructor chooser and no observers.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> IocContainerBuilder {
        IocContainerBuilder::new()
    }

    // ----- Implementation type registrations -----

    /// Registers implementation `I` as service `S` with the given lifetime.
    pub fn register_type<S, I>(&self, lifetime: Lifetime) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        self.register(ServiceRegistration::for_type::<S, I>(lifetime, None)?);
        Ok(())
    }

    /// Registers implementation `I` as service `S` under `name`.
    pub fn register_named_type<S, I>(&self, lifetime: Lifetime, name: &str) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        self.register(ServiceRegistration::for_type::<S, I>(lifetime, Some(name))?);
        Ok(())
    }

    pub fn register_singleton<S, I>(&self) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        self.register_type::<S, I>(Lifetime::Singleton)
    }

    pub fn register_transient<S, I>(&self) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        self.register_type::<S, I>(Lifetime::Transient)
    }

    // ----- Delegate registrations -----

    /// Registers a factory delegate for service `S`.
    ///
    /// Singleton delegates are called once, on first resolution. Transient
    /// delegates are called for every resolution. The delegate receives a
    /// [`ResolverContext`] for resolving its own dependencies.
    pub fn register_factory<S, F>(&self, lifetime: Lifetime, factory: F) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<S>> + Send + Sync + 'static,
    {
        self.register_delegate::<S, F>(lifetime, None, factory)
    }

    pub fn register_named_factory<S, F>(&self, lifetime: Lifetime, name: &str, factory: F) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<S>> + Send + Sync + 'static,
    {
        self.register_delegate::<S, F>(lifetime, Some(name), factory)
    }

    /// Registers an already constructed singleton.
    pub fn register_instance<S>(&self, instance: Arc<S>) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.register_factory::<S, _>(Lifetime::Singleton, move |_| Ok(instance.clone()))
    }

    pub fn register_named_instance<S>(&self, instance: Arc<S>, name: &str) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.register_named_factory::<S, _>(Lifetime::Singleton, name, move |_| Ok(instance.clone()))
    }

    fn register_delegate<S, F>(&self, lifetime: Lifetime, name: Option<&str>, factory: F) -> DiResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<S>> + Send + Sync + 'static,
    {
        // Weak, so registrations stored in the manager do not keep it alive.
        let manager = Arc::downgrade(&self.manager);
        let delegate = Arc::new(move || -> DiResult<AnyArc> {
            let manager = manager.upgrade().ok_or(DiError::ContainerDropped)?;
            let context = ResolverContext::new(&*manager);
            let service = factory(&context)?;
            Ok(Arc::new(service) as AnyArc)
        });

        self.register(ServiceRegistration::for_delegate(
            ServiceType::of::<S>(),
            delegate,
            lifetime,
            name,
        )?);
        Ok(())
    }

    /// Stores a prepared registration, replacing any registration with the
    /// same key.
    pub fn register(&self, registration: ServiceRegistration) {
        self.manager.register(registration);
    }

    // ----- Introspection and invalidation -----

    /// Invalidates the compiled factory of the unnamed registration of `S`
    /// and every factory compiled on top of it. The next resolution
    /// recompiles; singletons are constructed again.
    ///
    /// Returns `false` if `S` is not registered.
    pub fn invalidate<S: ?Sized + 'static>(&self) -> bool {
        self.manager.invalidate(&ServiceKey::of::<S>())
    }

    pub fn invalidate_by_name<S: ?Sized + 'static>(&self, name: &str) -> bool {
        self.manager.invalidate(&ServiceKey::named::<S>(name))
    }

    /// Descriptors of every registration, in registration order.
    pub fn service_descriptors(&self) -> Vec<ServiceDescriptor> {
        self.manager
            .registrations()
            .into_iter()
            .map(|registration| {
                let key = registration.key();
                let factory = self
                    .manager
                    .get_instance_creator(&key)
                    .and_then(|creator| creator.current_factory());
                ServiceDescriptor {
                    service: registration.service_type().name(),
                    name: registration.name().map(str::to_owned),
                    lifetime: registration.lifetime(),
                    implementation: registration.implementation_type().map(|t| t.name()),
                    compiled: factory.as_ref().map_or(false, |f| f.is_compiled()),
                    skipped_parameters: factory
                        .as_ref()
                        .map(|f| f.skipped_parameters().iter().map(ServiceType::name).collect())
                        .unwrap_or_default(),
                    key,
                }
            })
            .collect()
    }

    /// The registry backing this container.
    pub fn registry(&self) -> &dyn ServiceRegistry {
        &*self.manager
    }
}

impl Default for IocContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverCore for IocContainer {
    fn resolve_any(&self, key: &ServiceKey) -> DiResult<AnyArc> {
        self.manager.resolve_any(key)
    }

    fn resolve_any_with(&self, key: &ServiceKey, args: &InstanceArguments) -> DiResult<AnyArc> {
        self.manager.resolve_any_with(key, args)
    }

    fn resolve_all(&self, service_type: &ServiceType) -> DiResult<Vec<AnyArc>> {
        self.manager.resolve_all(service_type)
    }

    fn contains(&self, key: &ServiceKey) -> bool {
        self.manager.contains(key)
    }
}

impl fmt::Debug for IocContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IocContainer").field("manager", &self.manager).finish()
    }
}

/// Configures an [`IocContainer`].
///
/// ```rust
/// use ferrous_ioc::{IocContainer, LoggingObserver, MostResolvableConstructorChooser};
/// use std::sync::Arc;
///
/// let container = IocContainer::builder()
///     .constructor_chooser(Arc::new(MostResolvableConstructorChooser))
///     .observer(Arc::new(LoggingObserver::new()))
///     .build();
/// # let _ = container;
/// ```
pub struct IocContainerBuilder {
    chooser: Arc<dyn ConstructorChooser>,
    observers: Observers,
}

impl IocContainerBuilder {
    pub fn new() -> Self {
        Self {
            chooser: Arc::new(MostResolvableConstructorChooser),
            observers: Observers::new(),
        }
    }

    /// Replaces the rule used to pick among an implementation's constructors.
    pub fn constructor_chooser(mut self, chooser: Arc<dyn ConstructorChooser>) -> Self {
        self.chooser = chooser;
        self
    }

    /// Adds an observer for factory builds and invalidations.
    pub fn observer(mut self, observer: Arc<dyn DiObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn build(self) -> IocContainer {
        IocContainer {
            manager: ServiceRegistrationManager::new(self.chooser, self.observers),
        }
    }
}

impl Default for IocContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
