//! Per-registration owner of the compiled factory.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use crate::constructor::InstanceArguments;
use crate::error::{DiError, DiResult};
use crate::factory::builder::ServiceFactoryBuilder;
use crate::factory::ServiceFactory;
use crate::internal::{BuildLock, CircularDependencyValidator, ConstructionGuard};
use crate::registration::{AnyArc, ServiceRegistration};
use crate::registry::{InvalidationListener, ServiceRegistry};

// Attempts at producing an instance when the factory keeps getting
// invalidated between lookup and use.
pub(crate) const REBUILD_ATTEMPTS: usize = 3;

/// Owns the current compiled factory of one registration and rebuilds it
/// on demand.
///
/// Builds are serialized per registration by a reentrant lock: concurrent
/// first resolutions compile the factory once, and a thread that re-enters its
/// own build (a dependency cycle) gets the cycle reported by the validator
/// instead of blocking. Threads building the two ends of a cycle at the same
/// time get it reported by the lock itself.
pub struct ServiceInstanceCreator {
    registration: Arc<ServiceRegistration>,
    builder: Arc<ServiceFactoryBuilder>,
    listener: Option<Weak<dyn InvalidationListener>>,
    factory: RwLock<Option<Arc<ServiceFactory>>>,
    build_lock: BuildLock,
    retired: AtomicBool,
}

impl ServiceInstanceCreator {
    pub(crate) fn new(
        registration: Arc<ServiceRegistration>,
        builder: Arc<ServiceFactoryBuilder>,
        listener: Option<Weak<dyn InvalidationListener>>,
    ) -> Self {
        let build_lock = BuildLock::new(registration.service_type());
        Self {
            registration,
            builder,
            listener,
            factory: RwLock::new(None),
            build_lock,
            retired: AtomicBool::new(false),
        }
    }

    pub fn registration(&self) -> &Arc<ServiceRegistration> {
        &self.registration
    }

    /// Current factory if it has not been invalidated.
    fn compiled_factory(&self) -> Option<Arc<ServiceFactory>> {
        self.factory.read().as_ref().filter(|f| f.is_valid()).cloned()
    }

    /// Last factory built for this registration, valid or not.
    pub fn current_factory(&self) -> Option<Arc<ServiceFactory>> {
        self.factory.read().clone()
    }

    /// Returns the compiled factory, building it as a new top-level
    /// resolution if needed.
    pub fn get_factory(&self, registry: &dyn ServiceRegistry) -> DiResult<Arc<ServiceFactory>> {
        if let Some(factory) = self.compiled_factory() {
            return Ok(factory);
        }

        let _active = ConstructionGuard::enter(self.registration.service_type())?;
        let _lock = self.build_lock.lock()?;
        if let Some(factory) = self.compiled_factory() {
            return Ok(factory);
        }

        let validator = CircularDependencyValidator::new();
        self.build(registry, &validator)
    }

    /// Returns the compiled factory, building it as part of an enclosing build
    /// that owns `validator`.
    pub(crate) fn get_factory_within(
        &self,
        registry: &dyn ServiceRegistry,
        validator: &CircularDependencyValidator,
    ) -> DiResult<Arc<ServiceFactory>> {
        if let Some(factory) = self.compiled_factory() {
            return Ok(factory);
        }

        let _lock = self.build_lock.lock()?;
        if let Some(factory) = self.compiled_factory() {
            return Ok(factory);
        }

        self.build(registry, validator)
    }

    fn build(&self, registry: &dyn ServiceRegistry, validator: &CircularDependencyValidator) -> DiResult<Arc<ServiceFactory>> {
        let factory = self
            .builder
            .build(registry, &self.registration, validator, self.listener.clone())?;
        *self.factory.write() = Some(factory.clone());
        // Raced with a replacement of the registration.
        if self.retired.load(Ordering::SeqCst) {
            factory.invalidate();
        }
        Ok(factory)
    }

    pub fn get_instance(&self, registry: &dyn ServiceRegistry) -> DiResult<AnyArc> {
        self.with_rebuild(registry, |factory| factory.get_instance())
    }

    pub fn get_instance_with(&self, registry: &dyn ServiceRegistry, args: &InstanceArguments) -> DiResult<AnyArc> {
        self.with_rebuild(registry, |factory| factory.get_instance_with(args))
    }

    fn with_rebuild<F>(&self, registry: &dyn ServiceRegistry, produce: F) -> DiResult<AnyArc>
    where
        F: Fn(&ServiceFactory) -> DiResult<AnyArc>,
    {
        let mut attempt = 1;
        loop {
            match self.get_factory(registry).and_then(|factory| produce(&factory)) {
                Err(DiError::FactoryInvalidated(_)) if !self.is_retired() && attempt < REBUILD_ATTEMPTS => {
                    debug!(
                        service = %self.registration.key(),
                        attempt,
                        "factory invalidated during resolution, rebuilding"
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Invalidates and drops the current factory.
    pub fn invalidate(&self) {
        let current = self.factory.write().take();
        if let Some(factory) = current {
            factory.invalidate();
        }
    }

    /// Marks the registration as replaced. Factories built from now on are
    /// invalidated as soon as they are stored.
    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
        self.invalidate();
    }

    /// Whether the registration was replaced by a newer one.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ServiceInstanceCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstanceCreator")
            .field("registration", &self.registration)
            .field("compiled", &self.compiled_factory().is_some())
            .field("retired", &self.is_retired())
            .finish()
    }
}
