//! Registration storage and the resolution entry point.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::constructor::{ConstructorChooser, InstanceArguments};
use crate::creator::{ServiceInstanceCreator, REBUILD_ATTEMPTS};
use crate::error::{DiError, DiResult};
use crate::factory::builder::ServiceFactoryBuilder;
use crate::factory::ServiceFactory;
use crate::internal::FastMap;
use crate::key::{ServiceKey, ServiceType};
use crate::observer::Observers;
use crate::registration::{AnyArc, ServiceRegistration};
use crate::traits::ResolverCore;

/// Read access to registrations, used while building factories.
pub trait ServiceRegistry: Send + Sync {
    fn is_registered(&self, key: &ServiceKey) -> bool;

    fn get_instance_creator(&self, key: &ServiceKey) -> Option<Arc<ServiceInstanceCreator>>;

    /// Creators for every registration of `service_type`, named or not, in
    /// registration order.
    fn get_all_instance_creators(&self, service_type: &ServiceType) -> Vec<Arc<ServiceInstanceCreator>>;

    fn constructor_chooser(&self) -> Arc<dyn ConstructorChooser>;
}

/// Notified when a compiled factory is invalidated.
pub trait InvalidationListener: Send + Sync {
    fn on_invalidated(&self, service_type: &ServiceType);
}

struct Entry {
    creator: Arc<ServiceInstanceCreator>,
    sequence: u64,
}

/// Owns every registration and the creators compiled from them.
pub struct ServiceRegistrationManager {
    this: Weak<ServiceRegistrationManager>,
    registrations: RwLock<FastMap<ServiceKey, Entry>>,
    next_sequence: AtomicU64,
    // Hot path cache of compiled factories for unnamed lookups.
    factories: RwLock<FastMap<ServiceType, Arc<ServiceFactory>>>,
    builder: Arc<ServiceFactoryBuilder>,
    observers: Observers,
}

impl ServiceRegistrationManager {
    pub(crate) fn new(chooser: Arc<dyn ConstructorChooser>, observers: Observers) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            registrations: RwLock::new(FastMap::default()),
            next_sequence: AtomicU64::new(0),
            factories: RwLock::new(FastMap::default()),
            builder: Arc::new(ServiceFactoryBuilder::new(chooser, observers.clone())),
            observers,
        })
    }

    /// Stores `registration`, replacing and invalidating any registration with
    /// the same key.
    pub fn register(&self, registration: ServiceRegistration) {
        let registration = Arc::new(registration);
        let key = registration.key();
        let listener: Weak<dyn InvalidationListener> = self.this.clone();
        let creator = Arc::new(ServiceInstanceCreator::new(
            registration,
            self.builder.clone(),
            Some(listener),
        ));

        let previous = {
            let mut registrations = self.registrations.write();
            let sequence = match registrations.get(&key) {
                Some(existing) => existing.sequence,
                None => self.next_sequence.fetch_add(1, Ordering::Relaxed),
            };
            registrations.insert(key.clone(), Entry { creator, sequence })
        };

        debug!(service = %key, replaced = previous.is_some(), "registered service");

        match previous {
            Some(previous) => previous.creator.retire(),
            None if !key.is_named() => self.invalidate_skipping(key.service_type()),
            None => {}
        }
        self.factories.write().remove(&key.service_type());
    }

    /// Invalidates factories that were compiled without `service_type`
    /// because it was not registered at the time.
    fn invalidate_skipping(&self, service_type: ServiceType) {
        let stale: Vec<_> = self
            .registrations
            .read()
            .values()
            .filter(|entry| {
                entry
                    .creator
                    .current_factory()
                    .map_or(false, |f| f.skipped_parameters().contains(&service_type))
            })
            .map(|entry| entry.creator.clone())
            .collect();

        for creator in stale {
            trace!(
                service = %creator.registration().key(),
                parameter = service_type.name(),
                "parameter became available, invalidating factory"
            );
            creator.invalidate();
        }
    }

    /// Invalidates the compiled factory of the registration under `key`.
    /// Returns `false` if nothing is registered under it.
    pub fn invalidate(&self, key: &ServiceKey) -> bool {
        let creator = self.get_instance_creator(key);
        match creator {
            Some(creator) => {
                creator.invalidate();
                true
            }
            None => false,
        }
    }

    /// Registrations in registration order.
    pub fn registrations(&self) -> Vec<Arc<ServiceRegistration>> {
        let registrations = self.registrations.read();
        let mut entries: Vec<_> = registrations.values().collect();
        entries.sort_by_key(|entry| entry.sequence);
        entries
            .into_iter()
            .map(|entry| entry.creator.registration().clone())
            .collect()
    }

    fn not_registered(key: &ServiceKey) -> DiError {
        DiError::NotRegistered {
            service: key.service_type().name(),
            name: key.name().map(str::to_owned),
        }
    }

    /// Runs `produce` against the current creator of `key`, looking the
    /// creator up again if it was replaced while producing.
    fn with_creator<F>(&self, key: &ServiceKey, produce: F) -> DiResult<(Arc<ServiceInstanceCreator>, AnyArc)>
    where
        F: Fn(&ServiceInstanceCreator) -> DiResult<AnyArc>,
    {
        let mut attempt = 1;
        loop {
            let creator = self
                .get_instance_creator(key)
                .ok_or_else(|| Self::not_registered(key))?;
            match produce(&creator) {
                Err(DiError::FactoryInvalidated(_)) if creator.is_retired() && attempt < REBUILD_ATTEMPTS => {
                    trace!(service = %key, attempt, "registration replaced during resolution, retrying");
                    attempt += 1;
                }
                result => return result.map(|instance| (creator, instance)),
            }
        }
    }

    fn resolve_unnamed(&self, key: &ServiceKey) -> DiResult<AnyArc> {
        let cached = self.factories.read().get(&key.service_type()).cloned();
        if let Some(factory) = cached {
            match factory.get_instance() {
                Err(DiError::FactoryInvalidated(_)) => {}
                result => return result,
            }
        }

        let (creator, instance) = self.with_creator(key, |creator| creator.get_instance(self))?;
        if let Some(factory) = creator.current_factory().filter(|f| f.is_valid()) {
            self.factories.write().insert(key.service_type(), factory);
        }
        Ok(instance)
    }
}

impl ServiceRegistry for ServiceRegistrationManager {
    fn is_registered(&self, key: &ServiceKey) -> bool {
        self.registrations.read().contains_key(key)
    }

    fn get_instance_creator(&self, key: &ServiceKey) -> Option<Arc<ServiceInstanceCreator>> {
        self.registrations.read().get(key).map(|entry| entry.creator.clone())
    }

    fn get_all_instance_creators(&self, service_type: &ServiceType) -> Vec<Arc<ServiceInstanceCreator>> {
        let registrations = self.registrations.read();
        let mut entries: Vec<_> = registrations
            .iter()
            .filter(|(key, _)| key.service_type() == *service_type)
            .map(|(_, entry)| (entry.sequence, entry.creator.clone()))
            .collect();
        entries.sort_by_key(|(sequence, _)| *sequence);
        entries.into_iter().map(|(_, creator)| creator).collect()
    }

    fn constructor_chooser(&self) -> Arc<dyn ConstructorChooser> {
        self.builder.chooser()
    }
}

impl InvalidationListener for ServiceRegistrationManager {
    fn on_invalidated(&self, service_type: &ServiceType) {
        self.factories.write().remove(service_type);
        self.observers.invalidated(service_type);
    }
}

impl ResolverCore for ServiceRegistrationManager {
    fn resolve_any(&self, key: &ServiceKey) -> DiResult<AnyArc> {
        if !key.is_named() {
            return self.resolve_unnamed(key);
        }
        self.with_creator(key, |creator| creator.get_instance(self))
            .map(|(_, instance)| instance)
    }

    fn resolve_any_with(&self, key: &ServiceKey, args: &InstanceArguments) -> DiResult<AnyArc> {
        self.with_creator(key, |creator| creator.get_instance_with(self, args))
            .map(|(_, instance)| instance)
    }

    fn resolve_all(&self, service_type: &ServiceType) -> DiResult<Vec<AnyArc>> {
        self.get_all_instance_creators(service_type)
            .iter()
            .map(|creator| self.resolve_any(&creator.registration().key()))
            .collect()
    }

    fn contains(&self, key: &ServiceKey) -> bool {
        self.is_registered(key)
    }
}

impl fmt::Debug for ServiceRegistrationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistrationManager")
            .field("registrations", &self.registrations.read().len())
            .field("cached_factories", &self.factories.read().len())
            .finish()
    }
}
