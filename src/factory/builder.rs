//! Builds service factories by walking a registration's dependency graph.

use std::sync::{Arc, Weak};
use std::time::Instant;

use tracing::{trace, warn};

use crate::constructor::ConstructorChooser;
use crate::error::{DiResult, RegistrationError};
use crate::factory::compiler::{
    Dependency, ServiceFactoryCompiler, SingletonServiceFactoryCompiler, TransientServiceFactoryCompiler,
};
use crate::factory::{invoker, ServiceFactory};
use crate::internal::CircularDependencyValidator;
use crate::key::ServiceKey;
use crate::lifetime::Lifetime;
use crate::observer::Observers;
use crate::registration::{Activator, ServiceRegistration};
use crate::registry::{InvalidationListener, ServiceRegistry};

/// Produces a [`ServiceFactory`] for a registration, recursively obtaining the
/// factories of its constructor dependencies.
pub(crate) struct ServiceFactoryBuilder {
    chooser: Arc<dyn ConstructorChooser>,
    observers: Observers,
}

impl ServiceFactoryBuilder {
    pub(crate) fn new(chooser: Arc<dyn ConstructorChooser>, observers: Observers) -> Self {
        Self { chooser, observers }
    }

    pub(crate) fn chooser(&self) -> Arc<dyn ConstructorChooser> {
        self.chooser.clone()
    }

    pub(crate) fn build(
        &self,
        registry: &dyn ServiceRegistry,
        registration: &ServiceRegistration,
        validator: &CircularDependencyValidator,
        listener: Option<Weak<dyn InvalidationListener>>,
    ) -> DiResult<Arc<ServiceFactory>> {
        if !self.observers.has_observers() {
            return self.build_factory(registry, registration, validator, listener);
        }

        let key = registration.key();
        self.observers.building(&key);
        let started = Instant::now();
        let result = self.build_factory(registry, registration, validator, listener);
        match &result {
            Ok(_) => self.observers.built(&key, started.elapsed()),
            Err(err) => self.observers.build_failed(&key, err),
        }
        result
    }

    fn build_factory(
        &self,
        registry: &dyn ServiceRegistry,
        registration: &ServiceRegistration,
        validator: &CircularDependencyValidator,
        listener: Option<Weak<dyn InvalidationListener>>,
    ) -> DiResult<Arc<ServiceFactory>> {
        let service_type = registration.service_type();
        let scope = validator.enter(service_type)?;

        match registration.activator() {
            Activator::Constructors(constructors) => {
                let implementation = registration.implementation_type().unwrap_or(service_type);
                let constructor = self
                    .chooser
                    .choose_constructor(implementation, constructors, registry)
                    .ok_or(RegistrationError::NoUsableConstructor(implementation.name()))?
                    .clone();

                trace!(
                    service = service_type.name(),
                    implementation = implementation.name(),
                    constructor = constructor.index(),
                    depth = validator.depth(),
                    "building constructor factory"
                );

                let mut dependencies = Vec::with_capacity(constructor.parameters().len());
                let mut skipped = Vec::new();
                for (index, parameter) in constructor.parameters().iter().enumerate() {
                    match registry.get_instance_creator(&ServiceKey::new(*parameter, None)) {
                        Some(creator) => dependencies.push(Dependency {
                            index,
                            factory: creator.get_factory_within(registry, validator)?,
                        }),
                        None => {
                            warn!(
                                implementation = implementation.name(),
                                parameter = parameter.name(),
                                "constructor parameter is not registered and will be skipped"
                            );
                            skipped.push(*parameter);
                        }
                    }
                }

                let compiler: Arc<dyn ServiceFactoryCompiler> = match registration.lifetime() {
                    Lifetime::Transient => Arc::new(TransientServiceFactoryCompiler::new(constructor, dependencies.clone())),
                    Lifetime::Singleton => Arc::new(SingletonServiceFactoryCompiler::new(constructor, dependencies.clone())),
                };

                drop(scope);
                let factory = ServiceFactory::compiled(registration, compiler, skipped, listener)?;
                for dependency in &dependencies {
                    dependency.factory.add_parent(&factory);
                }
                Ok(factory)
            }
            Activator::Delegate(delegate) => {
                let invoker = invoker::for_lifetime(service_type, delegate.clone(), registration.lifetime());
                drop(scope);
                Ok(ServiceFactory::delegate(registration, invoker, listener))
            }
        }
    }
}
